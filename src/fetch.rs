use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::config::Language;
use crate::error::{FetchError, RetryFailure};
use crate::retry::RetryPolicy;

// Some hosts refuse requests without a browser-like agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// One HTTP GET returning the decoded page body.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &Url, lang: Language) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url, lang: Language) -> Result<String, FetchError> {
        let transport = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(transport)?;
        Ok(decode_body(&bytes, lang))
    }
}

/// Decodes a page body with the encoding the series' language is published in.
pub fn decode_body(bytes: &[u8], lang: Language) -> String {
    let (text, encoding, had_errors) = lang.encoding().decode(bytes);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "page contained undecodable bytes");
    }
    text.into_owned()
}

/// [`Fetch`] with the retry policy applied.
#[derive(Clone)]
pub struct RemoteFetcher {
    inner: Arc<dyn Fetch>,
    policy: RetryPolicy,
}

impl RemoteFetcher {
    pub fn new(inner: Arc<dyn Fetch>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn fetch(&self, url: &Url, lang: Language) -> Result<String, RetryFailure<FetchError>> {
        let out = self
            .policy
            .run(url.as_str(), |_| self.inner.fetch(url, lang))?;
        if out.retries > 0 {
            tracing::info!(url = %url, retries = out.retries, "fetched after retries");
        }
        Ok(out.value)
    }
}
