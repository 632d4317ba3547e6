use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chapter text as extracted from the host, before translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChapter {
    pub title: String,
    pub lines: Vec<String>,
}

impl RawChapter {
    /// Each extracted paragraph is followed by one blank separator line.
    pub fn from_paragraphs(title: String, paragraphs: Vec<String>) -> Self {
        let mut lines = Vec::with_capacity(paragraphs.len() * 2);
        for paragraph in paragraphs {
            lines.push(paragraph);
            lines.push(String::new());
        }
        Self { title, lines }
    }

    pub fn to_text(&self) -> String {
        chapter_text(&self.title, &self.lines)
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let (title, lines) = parse_chapter_text(text)?;
        Some(Self { title, lines })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedChapter {
    pub title: String,
    pub lines: Vec<String>,
}

impl TranslatedChapter {
    pub fn to_text(&self) -> String {
        chapter_text(&self.title, &self.lines)
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let (title, lines) = parse_chapter_text(text)?;
        Some(Self { title, lines })
    }
}

// Title on the first line, then one line per chapter line.
fn chapter_text(title: &str, lines: &[String]) -> String {
    let mut out = title.to_owned();
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    out.push('\n');
    out
}

fn parse_chapter_text(text: &str) -> Option<(String, Vec<String>)> {
    if text.is_empty() {
        return None;
    }
    let mut lines = text.lines().map(str::to_owned);
    let title = lines.next()?;
    Some((title, lines.collect()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Success,
    Failure,
}

impl std::fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChapterStatus::Success => f.write_str("Success"),
            ChapterStatus::Failure => f.write_str("Failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterResult {
    pub ordinal: usize,
    pub status: ChapterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChapterResult {
    pub fn success(ordinal: usize) -> Self {
        Self {
            ordinal,
            status: ChapterStatus::Success,
            detail: None,
        }
    }

    pub fn failure(ordinal: usize, detail: impl Into<String>) -> Self {
        Self {
            ordinal,
            status: ChapterStatus::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ChapterStatus::Success
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub series: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ChapterResult>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(ChapterResult::is_success)
    }
}
