//! Per-host chapter extraction.
//!
//! Every supported site gets one [`ContentParser`] implementation. The set is
//! closed: [`HostKind`] names the variants and hands out the parser for a
//! configured host name.

use std::str::FromStr;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{ConfigError, ExtractionError};
use crate::page_table::ChapterAddress;

pub mod biquyun;
pub mod shu69;
pub mod syosetu;

pub trait ContentParser: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Whether chapter URLs use opaque codes taken from the table of contents.
    fn needs_page_table(&self) -> bool;

    fn parse_title(&self, html: &str) -> Result<String, ExtractionError>;

    /// One entry per paragraph; break-only paragraphs come back as `""`.
    fn parse_content(&self, html: &str) -> Result<Vec<String>, ExtractionError>;

    /// Chapter codes in reading order, or `None` when the host does not need them.
    fn parse_page_table(&self, html: &str) -> Result<Option<Vec<String>>, ExtractionError>;

    /// Number of chapters listed on the table of contents page.
    fn latest_chapter(&self, html: &str) -> Result<usize, ExtractionError> {
        match self.parse_page_table(html)? {
            Some(table) => Ok(table.len()),
            None => Err(ExtractionError::Empty {
                what: "chapter list",
            }),
        }
    }

    fn chapter_url(&self, series_url: &Url, address: &ChapterAddress) -> anyhow::Result<Url>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Syosetu,
    Biquyun,
    Shu69,
}

impl HostKind {
    pub fn parser(self) -> &'static dyn ContentParser {
        match self {
            HostKind::Syosetu => &syosetu::SyosetuParser,
            HostKind::Biquyun => &biquyun::BiquyunParser,
            HostKind::Shu69 => &shu69::Shu69Parser,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HostKind::Syosetu => "Syosetu",
            HostKind::Biquyun => "Biquyun",
            HostKind::Shu69 => "69shu",
        }
    }
}

impl FromStr for HostKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syosetu" => Ok(HostKind::Syosetu),
            "biquyun" => Ok(HostKind::Biquyun),
            "69shu" | "shu69" => Ok(HostKind::Shu69),
            _ => Err(ConfigError::UnsupportedHost(s.to_owned())),
        }
    }
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The single element matching `sel`; zero or several matches is an error.
pub(crate) fn exactly_one<'a>(
    doc: &'a Html,
    sel: &Selector,
    what: &'static str,
) -> Result<ElementRef<'a>, ExtractionError> {
    let mut matches = doc.select(sel);
    let first = matches.next();
    let rest = matches.count();
    match first {
        Some(element) if rest == 0 => Ok(element),
        _ => Err(ExtractionError::MarkerCount {
            what,
            found: first.map_or(0, |_| 1 + rest),
        }),
    }
}

/// Text of an element with ruby readings (`<rt>`, `<rp>`) dropped.
pub(crate) fn base_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_base_text(element, &mut out);
    out
}

fn push_base_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            match child.value().name() {
                "rt" | "rp" => {}
                _ => push_base_text(child, out),
            }
        }
    }
}

// Four `&nbsp;` start every paragraph on the Chinese hosts.
const INDENT: &str = "\u{a0}\u{a0}\u{a0}\u{a0}";

/// Paragraphs of a container that marks them with a four `&nbsp;` indent and
/// `<br>` separators. Text before the first indent of a run (site watermarks,
/// ads) is not content.
pub(crate) fn indented_lines(container: ElementRef<'_>) -> Vec<String> {
    container
        .children()
        .filter_map(|child| child.value().as_text())
        .flat_map(|text| text.split(INDENT).skip(1))
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect()
}

pub(crate) fn clean_line(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{3000}')
        .to_owned()
}
