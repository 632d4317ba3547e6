use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::{ContentParser, HostKind, clean_line, exactly_one, indented_lines};
use crate::error::ExtractionError;
use crate::page_table::ChapterAddress;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.bookname > h1").expect("title selector"));
static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#content").expect("content selector"));
static TOC_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#list dt, #list dd a[href]").expect("toc selector"));

/// biquyun.com: chapter codes are erratic, so a page table is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquyunParser;

impl ContentParser for BiquyunParser {
    fn kind(&self) -> HostKind {
        HostKind::Biquyun
    }

    fn needs_page_table(&self) -> bool {
        true
    }

    fn parse_title(&self, html: &str) -> Result<String, ExtractionError> {
        let doc = Html::parse_document(html);
        let title = exactly_one(&doc, &TITLE, "chapter title")?;
        Ok(clean_line(&title.text().collect::<String>()))
    }

    fn parse_content(&self, html: &str) -> Result<Vec<String>, ExtractionError> {
        let doc = Html::parse_document(html);
        let content = exactly_one(&doc, &CONTENT, "content block")?;
        let lines = indented_lines(content);
        if lines.is_empty() {
            return Err(ExtractionError::Empty {
                what: "content lines",
            });
        }
        Ok(lines)
    }

    fn parse_page_table(&self, html: &str) -> Result<Option<Vec<String>>, ExtractionError> {
        let doc = Html::parse_document(html);
        let mut codes = Vec::new();

        for item in doc.select(&TOC_ITEMS) {
            if item.value().name() == "dt" {
                // The "latest chapters" block precedes the full listing under 正文.
                if item.text().any(|t| t.contains("正文")) {
                    codes.clear();
                }
                continue;
            }
            let href = item.value().attr("href").unwrap_or_default();
            codes.push(chapter_code(href)?);
        }

        if codes.is_empty() {
            return Err(ExtractionError::Empty {
                what: "table of contents entries",
            });
        }
        Ok(Some(codes))
    }

    fn chapter_url(&self, series_url: &Url, address: &ChapterAddress) -> anyhow::Result<Url> {
        let ChapterAddress::Code(code) = address else {
            anyhow::bail!("biquyun chapters are addressed by page table code, got {address}");
        };
        Ok(series_url.join(&format!("{code}.html"))?)
    }
}

/// `/14_14055/9194140.html` -> `9194140`
fn chapter_code(href: &str) -> Result<String, ExtractionError> {
    let bad = || ExtractionError::BadLink {
        href: href.to_owned(),
    };
    let file = href.rsplit('/').next().ok_or_else(bad)?;
    let code = file.strip_suffix(".html").ok_or_else(bad)?;
    if code.is_empty() {
        return Err(bad());
    }
    Ok(code.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = "<html><body>\
<div class=\"bookname\">\r\n\t\t\t\t\t<h1>第一章 少年</h1></div>\
<div id=\"content\">一秒记住【笔趣云】<br />&nbsp;&nbsp;&nbsp;&nbsp;第一行。<br /><br />&nbsp;&nbsp;&nbsp;&nbsp;第二行。<br /><br /></div>\
</body></html>";

    const TOC: &str = r#"<html><body><div id="list"><dl>
<dt>《武道》最新章节</dt>
<dd><a href="/14_14055/9999.html">最新</a></dd>
<dt>《武道》正文</dt>
<dd><a href="/14_14055/9194140.html">第一章</a></dd>
<dd><a href="/14_14055/9194141.html">第二章</a></dd>
<dd><a href="/14_14055/9194150.html">第三章</a></dd>
</dl></div></body></html>"#;

    #[test]
    fn parses_title_and_lines() {
        assert_eq!(BiquyunParser.parse_title(CHAPTER).unwrap(), "第一章 少年");
        assert_eq!(
            BiquyunParser.parse_content(CHAPTER).unwrap(),
            vec!["第一行。", "第二行。"]
        );
    }

    #[test]
    fn page_table_skips_latest_block() {
        let table = BiquyunParser.parse_page_table(TOC).unwrap().unwrap();
        assert_eq!(table, vec!["9194140", "9194141", "9194150"]);
        assert_eq!(BiquyunParser.latest_chapter(TOC).unwrap(), 3);
    }

    #[test]
    fn empty_toc_is_error() {
        assert!(BiquyunParser.parse_page_table("<html></html>").is_err());
    }

    #[test]
    fn chapter_url_from_code() {
        let series = Url::parse("https://www.biquyun.com/14_14055/").unwrap();
        let url = BiquyunParser
            .chapter_url(&series, &ChapterAddress::Code("9194141".to_owned()))
            .unwrap();
        assert_eq!(url.as_str(), "https://www.biquyun.com/14_14055/9194141.html");
    }

    #[test]
    fn missing_content_block_fails() {
        let html = "<div class=\"bookname\"><h1>t</h1></div>";
        assert!(matches!(
            BiquyunParser.parse_content(html),
            Err(ExtractionError::MarkerCount { found: 0, .. })
        ));
    }
}
