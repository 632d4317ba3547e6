use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::{ContentParser, HostKind, base_text, exactly_one};
use crate::error::ExtractionError;
use crate::page_table::ChapterAddress;

// Both the legacy and the current ncode.syosetu.com layouts are recognized.
static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p.novel_subtitle, h1.p-novel__title").expect("title selector")
});
// Preface (`Lp*`), body (`L1`, ...) and afterword (`La*`) paragraphs.
static LINES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p[id^=\"L\"]").expect("line selector"));
static TOC_ENTRIES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("dl.novel_sublist2, div.p-eplist__sublist").expect("toc selector")
});

/// ncode.syosetu.com: chapter `n` lives at `<series>/<n>/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyosetuParser;

impl ContentParser for SyosetuParser {
    fn kind(&self) -> HostKind {
        HostKind::Syosetu
    }

    fn needs_page_table(&self) -> bool {
        false
    }

    fn parse_title(&self, html: &str) -> Result<String, ExtractionError> {
        let doc = Html::parse_document(html);
        let title = exactly_one(&doc, &TITLE, "chapter title")?;
        Ok(base_text(title).trim().to_owned())
    }

    fn parse_content(&self, html: &str) -> Result<Vec<String>, ExtractionError> {
        let doc = Html::parse_document(html);
        let lines = doc
            .select(&LINES)
            .map(|p| {
                let text = base_text(p);
                if text.trim().is_empty() {
                    String::new()
                } else {
                    text
                }
            })
            .collect::<Vec<_>>();

        if lines.is_empty() {
            return Err(ExtractionError::Empty {
                what: "chapter body lines",
            });
        }
        Ok(lines)
    }

    fn parse_page_table(&self, _html: &str) -> Result<Option<Vec<String>>, ExtractionError> {
        Ok(None)
    }

    fn latest_chapter(&self, html: &str) -> Result<usize, ExtractionError> {
        let doc = Html::parse_document(html);
        match doc.select(&TOC_ENTRIES).count() {
            0 => Err(ExtractionError::Empty {
                what: "chapter list",
            }),
            n => Ok(n),
        }
    }

    fn chapter_url(&self, series_url: &Url, address: &ChapterAddress) -> anyhow::Result<Url> {
        let ChapterAddress::Ordinal(n) = address else {
            anyhow::bail!("syosetu chapters are addressed by number, got {address}");
        };
        Ok(series_url.join(&format!("{n}/"))?)
    }
}
