use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{ContentParser, HostKind, clean_line, exactly_one, indented_lines};
use crate::error::ExtractionError;
use crate::page_table::ChapterAddress;

/// Placeholder for chapters published without a heading.
pub const NO_TITLE: &str = "NOTITLE";

static TITLE_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.h1title").expect("title selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("heading selector"));
static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.yd_text2, div#content").expect("content selector"));
static CHAPTER_LIST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.chapterlist").expect("chapter list selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

#[derive(Debug, Clone, Copy, Default)]
pub struct Shu69Parser;

impl ContentParser for Shu69Parser {
    fn kind(&self) -> HostKind {
        HostKind::Shu69
    }

    fn needs_page_table(&self) -> bool {
        true
    }

    fn parse_title(&self, html: &str) -> Result<String, ExtractionError> {
        let doc = Html::parse_document(html);
        let block = exactly_one(&doc, &TITLE_BLOCK, "title block")?;
        let title = block
            .select(&HEADING)
            .next()
            .map(|h1| clean_line(&h1.text().collect::<String>()))
            .filter(|t| !t.is_empty());
        Ok(title.unwrap_or_else(|| NO_TITLE.to_owned()))
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
        let list = doc
            .select(&CHAPTER_LIST)
            .next()
            .ok_or(ExtractionError::MarkerCount {
                what: "chapter list",
                found: 0,
            })?;

        let mut codes = Vec::new();
        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" || !is_plain_entry(item) {
                continue;
            }
            if let Some(link) = item.select(&LINK).next() {
                let href = link.value().attr("href").unwrap_or_default().trim();
                if href.is_empty() {
                    return Err(ExtractionError::BadLink {
                        href: href.to_owned(),
                    });
                }
                codes.push(href.to_owned());
            }
        }

        if codes.is_empty() {
            return Err(ExtractionError::Empty {
                what: "chapter list entries",
            });
        }
        Ok(Some(codes))
    }

    fn chapter_url(&self, series_url: &Url, address: &ChapterAddress) -> anyhow::Result<Url> {
        let ChapterAddress::Code(code) = address else {
            anyhow::bail!("69shu chapters are addressed by page table code, got {address}");
        };
        Ok(series_url.join(code)?)
    }
}

// Classed entries are volume headers and ads.
fn is_plain_entry(item: ElementRef<'_>) -> bool {
    item.value()
        .attr("class")
        .is_none_or(|class| class.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOC: &str = r#"<html><body>
<ul class="chapterlist">
<li class="volume">第一卷</li>
<li><a href="/txt/1234/5551">第一章</a></li>
<li><a href="/txt/1234/5552">第二章</a></li>
<li class=""><a href="/txt/1234/5560">第三章</a></li>
</ul>
<ul class="chapterlist"><li><a href="/other/1">ignored</a></li></ul>
</body></html>"#;

    #[test]
    fn page_table_reads_first_list_only() {
        let table = Shu69Parser.parse_page_table(TOC).unwrap().unwrap();
        assert_eq!(
            table,
            vec!["/txt/1234/5551", "/txt/1234/5552", "/txt/1234/5560"]
        );
    }

    #[test]
    fn missing_heading_uses_placeholder() {
        let html = r#"<div class="h1title"></div><div class="yd_text2">69书吧<br/>&nbsp;&nbsp;&nbsp;&nbsp;一<br/>&nbsp;&nbsp;&nbsp;&nbsp;二</div>"#;
        assert_eq!(Shu69Parser.parse_title(html).unwrap(), NO_TITLE);
        assert_eq!(Shu69Parser.parse_content(html).unwrap(), vec!["一", "二"]);
    }

    #[test]
    fn heading_is_trimmed() {
        let html = r#"<div class="h1title"><h1> 第二章 </h1></div>"#;
        assert_eq!(Shu69Parser.parse_title(html).unwrap(), "第二章");
    }

    #[test]
    fn missing_title_block_fails() {
        assert!(Shu69Parser.parse_title("<html></html>").is_err());
    }

    #[test]
    fn chapter_url_joins_code() {
        let series = Url::parse("https://www.69shu.com/txt/1234/").unwrap();
        let url = Shu69Parser
            .chapter_url(&series, &ChapterAddress::Code("/txt/1234/5552".to_owned()))
            .unwrap();
        assert_eq!(url.as_str(), "https://www.69shu.com/txt/1234/5552");
    }
}
