use thiserror::Error;

/// Errors that can be retried are transient; everything else aborts the retry loop.
pub trait Transience {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no hosts configured")]
    NoHosts,
    #[error("no series configured")]
    NoSeries,
    #[error("unknown series: {0}")]
    UnknownSeries(String),
    #[error("host `{host}` used by series `{series}` is not configured")]
    UnknownHost { series: String, host: String },
    #[error("unsupported host kind: {0}")]
    UnsupportedHost(String),
    #[error("duplicate series abbreviation: {0}")]
    DuplicateSeries(String),
    #[error("invalid base url for host `{host}`: {reason}")]
    InvalidBaseUrl { host: String, reason: String },
    #[error("translator engine `{engine}` is missing {what}")]
    MissingTranslatorSetting { engine: &'static str, what: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chapter {ordinal} is out of range (known chapters: {len})")]
pub struct OutOfRangeError {
    pub ordinal: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("expected exactly one {what}, found {found}")]
    MarkerCount { what: &'static str, found: usize },
    #[error("no {what} found")]
    Empty { what: &'static str },
    #[error("invalid chapter link `{href}`")]
    BadLink { href: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
}

impl Transience for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    /// Connection trouble, rate limiting or a response we could not read.
    #[error("translator unavailable: {0}")]
    Transient(String),
    /// The service refused the request itself; retrying cannot help.
    #[error("translator rejected request: {0}")]
    Rejected(String),
}

impl Transience for TranslateError {
    fn is_transient(&self) -> bool {
        matches!(self, TranslateError::Transient(_))
    }
}

/// Terminal error of a remote call after the retry policy gave up.
#[derive(Debug, Error)]
pub enum RetryFailure<E> {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: E },
    #[error(transparent)]
    Aborted(E),
}

impl<E> RetryFailure<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryFailure::Exhausted { .. })
    }
}

/// Why a single chapter ended in Failure.
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),
    #[error("fetch chapter: {0}")]
    Fetch(#[from] RetryFailure<FetchError>),
    #[error("extract chapter: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("translate line {line}: {source}")]
    Translation {
        line: usize,
        #[source]
        source: RetryFailure<TranslateError>,
    },
    #[error("{failed} line(s) could not be translated")]
    FailedLines { failed: usize },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_status_classification() {
        let status = |status| FetchError::Status {
            url: "http://example.com".to_owned(),
            status,
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
    }

    #[test]
    fn rejected_translation_is_not_transient() {
        assert!(TranslateError::Transient("timeout".to_owned()).is_transient());
        assert!(!TranslateError::Rejected("too long".to_owned()).is_transient());
    }
}
