//! Per-series glossary and the per-chapter codec that applies it around translation.
//!
//! In protected mode every occurrence of a glossary term is swapped for an
//! opaque `{{GLS_TOKEN_nnnnnn}}` token before the text reaches the translator,
//! and the token is replaced by the term's target afterwards. Entries are
//! applied in file order, and only text that is not already a token is
//! searched, so a later term can never match inside an earlier substitution.
//! When a chapter already contains text spelled like a token, the codec
//! switches to a numbered prefix (`{{GLS1_TOKEN_nnnnnn}}`, ...) for that chapter.

use std::path::Path;

use anyhow::Context as _;

use crate::config::GlossaryMode;

pub const DELIMITER: &str = " --> ";
const TOKEN_PREFIX: &str = "GLS_TOKEN_";
const TOKEN_DIGITS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
}

/// Ordered `source --> target` entries. Earlier entries take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    entries: Vec<GlossaryEntry>,
}

impl Glossary {
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<GlossaryEntry> = Vec::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.starts_with("//") {
                continue;
            }
            let Some((source, target)) = line.split_once(DELIMITER) else {
                continue;
            };
            if source.is_empty() {
                continue;
            }
            let target = target.trim_end();
            // A repeated source keeps its first position and takes the last target.
            match entries.iter_mut().find(|e| e.source == source) {
                Some(entry) => entry.target = target.to_owned(),
                None => entries.push(GlossaryEntry {
                    source: source.to_owned(),
                    target: target.to_owned(),
                }),
            }
        }
        Self { entries }
    }

    /// Loads the glossary file, writing a commented skeleton first if it is missing or empty.
    pub fn load_or_create(path: &Path, series_url: &str) -> anyhow::Result<Self> {
        if !crate::store::is_computed(path) {
            tracing::info!(path = %path.display(), "no glossary for this series; creating one");
            crate::store::write_atomic(path, &skeleton(series_url))?;
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read glossary: {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn skeleton(series_url: &str) -> String {
    format!(
        "// Series link: {series_url}\n\
         \n\
         // Lines starting with '//' are comments. Entries look like:\n\
         // ナルト{DELIMITER}Naruto\n\
         \n\
         // END OF FILE\n"
    )
}

/// Applies a glossary to the lines of one chapter. Tokens are numbered per chapter.
#[derive(Debug)]
pub struct ChapterCodec<'g> {
    glossary: &'g Glossary,
    mode: GlossaryMode,
    prefix: String,
    issued: Vec<&'g GlossaryEntry>,
}

enum Segment {
    Text(String),
    Token(usize),
}

impl<'g> ChapterCodec<'g> {
    /// `chapter` holds every line that will be encoded. The token prefix is the
    /// first of `GLS_TOKEN_`, `GLS1_TOKEN_`, ... that none of them (and no
    /// glossary target) contains, so tokens never collide with chapter text.
    pub fn new<'a>(
        glossary: &'g Glossary,
        mode: GlossaryMode,
        chapter: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let chapter = chapter.into_iter().collect::<Vec<_>>();
        let prefix = token_prefix(&chapter, glossary);
        Self {
            glossary,
            mode,
            prefix,
            issued: Vec::new(),
        }
    }

    pub fn issued_tokens(&self) -> usize {
        self.issued.len()
    }

    pub fn encode(&mut self, line: &str) -> String {
        match self.mode {
            GlossaryMode::Direct => self
                .glossary
                .entries
                .iter()
                .fold(line.to_owned(), |acc, e| acc.replace(&e.source, &e.target)),
            GlossaryMode::Protected => self.protect(line),
        }
    }

    fn protect(&mut self, line: &str) -> String {
        let glossary = self.glossary;
        let mut segments = vec![Segment::Text(line.to_owned())];

        for entry in &glossary.entries {
            let mut next = Vec::with_capacity(segments.len());
            for segment in segments {
                let Segment::Text(text) = segment else {
                    next.push(segment);
                    continue;
                };
                let mut rest = text.as_str();
                while let Some(pos) = rest.find(entry.source.as_str()) {
                    if pos > 0 {
                        next.push(Segment::Text(rest[..pos].to_owned()));
                    }
                    next.push(Segment::Token(self.issued.len()));
                    self.issued.push(entry);
                    rest = &rest[pos + entry.source.len()..];
                }
                if !rest.is_empty() {
                    next.push(Segment::Text(rest.to_owned()));
                }
            }
            segments = next;
        }

        segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => text,
                Segment::Token(id) => self.token(id),
            })
            .collect()
    }

    /// Replaces issued tokens with target terms, last issued first.
    pub fn decode(&self, line: &str) -> String {
        match self.mode {
            GlossaryMode::Direct => line.to_owned(),
            GlossaryMode::Protected => {
                let mut out = self.normalize(line);
                for (id, entry) in self.issued.iter().enumerate().rev() {
                    out = out.replace(&self.token(id), &entry.target);
                }
                out
            }
        }
    }

    /// Replaces issued tokens with the source text they stand for.
    pub fn restore(&self, line: &str) -> String {
        let mut out = line.to_owned();
        for (id, entry) in self.issued.iter().enumerate().rev() {
            out = out.replace(&self.token(id), &entry.source);
        }
        out
    }

    /// Tokens present in `encoded` that the translator dropped from `translated`.
    pub fn missing_tokens(&self, encoded: &str, translated: &str) -> Vec<String> {
        let translated = self.normalize(translated);
        extract_tokens(encoded, &self.prefix)
            .into_iter()
            .filter(|t| !translated.contains(t.as_str()))
            .collect()
    }

    fn token(&self, id: usize) -> String {
        token(&self.prefix, id + 1)
    }

    fn normalize(&self, line: &str) -> String {
        normalize_tokens(line, &self.prefix, self.issued.len())
    }
}

fn token_prefix(chapter: &[&str], glossary: &Glossary) -> String {
    let taken = |prefix: &str| {
        chapter.iter().any(|line| line.contains(prefix))
            || glossary.entries.iter().any(|e| e.target.contains(prefix))
    };
    (0usize..)
        .map(|n| match n {
            0 => TOKEN_PREFIX.to_owned(),
            n => format!("GLS{n}_TOKEN_"),
        })
        .find(|prefix| !taken(prefix))
        .unwrap_or_else(|| TOKEN_PREFIX.to_owned())
}

fn token(prefix: &str, number: usize) -> String {
    format!("{{{{{prefix}{number:0width$}}}}}", width = TOKEN_DIGITS)
}

fn extract_tokens(input: &str, prefix: &str) -> Vec<String> {
    let open = format!("{{{{{prefix}");
    let mut tokens = Vec::new();
    let mut cursor = 0usize;
    while let Some(rel) = input[cursor..].find(&open) {
        let start = cursor + rel;
        let Some(rel_end) = input[start..].find("}}") else {
            break;
        };
        let end = start + rel_end + 2;
        tokens.push(input[start..end].to_owned());
        cursor = end;
    }
    tokens
}

/// Repairs token spellings translators commonly produce: `{ {GLS_TOKEN_000001} }`,
/// `{GLS_TOKEN_000001}` and bare `GLS_TOKEN_000001`. Only numbers `1..=issued`
/// are touched; anything else is left as written.
fn normalize_tokens(input: &str, prefix: &str, issued: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0usize;

    while let Some(ch) = input[i..].chars().next() {
        let rest = &input[i..];
        let parsed = if ch == '{' {
            parse_double_braced(rest, prefix).or_else(|| parse_single_braced(rest, prefix))
        } else if rest.starts_with(prefix) {
            parse_number(rest, 0, prefix)
        } else {
            None
        };

        match parsed.filter(|&(_, number)| (1..=issued).contains(&number)) {
            Some((consumed, number)) => {
                out.push_str(&token(prefix, number));
                i += consumed;
            }
            None => {
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    out
}

fn parse_double_braced(input: &str, prefix: &str) -> Option<(usize, usize)> {
    let mut i = expect(input, 0, '{')?;
    i = expect(input, skip_ws(input, i), '{')?;
    let (end, number) = parse_number(input, skip_ws(input, i), prefix)?;
    i = expect(input, skip_ws(input, end), '}')?;
    i = expect(input, skip_ws(input, i), '}')?;
    Some((i, number))
}

fn parse_single_braced(input: &str, prefix: &str) -> Option<(usize, usize)> {
    let i = expect(input, 0, '{')?;
    let (end, number) = parse_number(input, skip_ws(input, i), prefix)?;
    let i = expect(input, skip_ws(input, end), '}')?;
    Some((i, number))
}

fn parse_number(input: &str, at: usize, prefix: &str) -> Option<(usize, usize)> {
    if !input.get(at..)?.starts_with(prefix) {
        return None;
    }
    let start = at + prefix.len();
    let digits = input.get(start..start + TOKEN_DIGITS)?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let end = start + TOKEN_DIGITS;
    if input[end..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((end, digits.parse().ok()?))
}

fn expect(input: &str, at: usize, ch: char) -> Option<usize> {
    input.get(at..)?.starts_with(ch).then_some(at + ch.len_utf8())
}

fn skip_ws(input: &str, mut i: usize) -> usize {
    while let Some(ch) = input[i..].chars().next() {
        if !ch.is_whitespace() {
            break;
        }
        i += ch.len_utf8();
    }
    i
}
