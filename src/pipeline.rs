use std::sync::Arc;

use crate::context::SeriesContext;
use crate::error::ChapterError;
use crate::fetch::RemoteFetcher;
use crate::formats::{ChapterResult, RawChapter, TranslatedChapter};
use crate::glossary::ChapterCodec;
use crate::page_table::ChapterAddress;
use crate::store::ArtifactStore;
use crate::translate::RemoteTranslator;

pub const ERROR_LINE_MARKER: &str = "[Error line]";

/// What to do with a line whose translation retries ran out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineFailurePolicy {
    /// Keep the source text behind an error marker and finish the chapter as a Failure.
    #[default]
    Mark,
    /// Stop the chapter without writing a translation.
    Abort,
}

enum LineOutcome {
    Translated(String),
    Failed(String),
}

/// Download, extract and translate one chapter.
#[derive(Clone)]
pub struct ChapterPipeline {
    context: Arc<SeriesContext>,
    store: ArtifactStore,
    fetcher: RemoteFetcher,
    translator: RemoteTranslator,
    line_policy: LineFailurePolicy,
}

impl ChapterPipeline {
    pub fn new(
        context: Arc<SeriesContext>,
        store: ArtifactStore,
        fetcher: RemoteFetcher,
        translator: RemoteTranslator,
        line_policy: LineFailurePolicy,
    ) -> Self {
        Self {
            context,
            store,
            fetcher,
            translator,
            line_policy,
        }
    }

    pub fn context(&self) -> &SeriesContext {
        &self.context
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn run(&self, ordinal: usize) -> ChapterResult {
        let abbr = &self.context.series.abbr;
        match self.process(ordinal) {
            Ok(()) => {
                tracing::info!(series = %abbr, ordinal, "chapter done");
                ChapterResult::success(ordinal)
            }
            Err(err) => {
                let detail = format!("{err:#}");
                tracing::warn!(series = %abbr, ordinal, error = %detail, "chapter failed");
                ChapterResult::failure(ordinal, detail)
            }
        }
    }

    pub fn process(&self, ordinal: usize) -> Result<(), ChapterError> {
        let ctx = &*self.context;
        let abbr = &ctx.series.abbr;

        let address = ctx.address_for(ordinal)?;
        let raw = self.load_or_fetch(ordinal, &address)?;

        let chapter = std::iter::once(raw.title.as_str()).chain(raw.lines.iter().map(String::as_str));
        let mut codec = ChapterCodec::new(&ctx.glossary, ctx.glossary_mode, chapter);
        let mut failed = 0usize;
        let mut finish = |outcome: LineOutcome| match outcome {
            LineOutcome::Translated(line) => line,
            LineOutcome::Failed(line) => {
                failed += 1;
                line
            }
        };

        let title = finish(self.translate_line(&mut codec, &raw.title, 0)?);
        let mut lines = Vec::with_capacity(raw.lines.len());
        for (idx, line) in raw.lines.iter().enumerate() {
            lines.push(finish(self.translate_line(&mut codec, line, idx + 1)?));
        }

        self.store
            .save_translated(abbr, ordinal, &TranslatedChapter { title, lines })?;
        tracing::debug!(
            series = %abbr,
            ordinal,
            tokens = codec.issued_tokens(),
            path = %self.store.translated_path(abbr, ordinal).display(),
            "translation saved"
        );

        if failed > 0 {
            return Err(ChapterError::FailedLines { failed });
        }
        Ok(())
    }

    fn load_or_fetch(
        &self,
        ordinal: usize,
        address: &ChapterAddress,
    ) -> Result<RawChapter, ChapterError> {
        let ctx = &*self.context;
        let abbr = &ctx.series.abbr;

        if let Some(raw) = self.store.load_raw(abbr, ordinal)? {
            tracing::debug!(series = %abbr, ordinal, "using downloaded chapter");
            return Ok(raw);
        }

        let url = ctx.chapter_url(address)?;
        tracing::info!(series = %abbr, ordinal, url = %url, "downloading chapter");
        let html = self.fetcher.fetch(&url, ctx.series.lang)?;

        let parser = ctx.parser();
        let extracted = parser
            .parse_title(&html)
            .and_then(|title| Ok((title, parser.parse_content(&html)?)));
        let (title, paragraphs) = match extracted {
            Ok(parts) => parts,
            Err(err) => {
                let page = self.store.save_page(abbr, ordinal, &html)?;
                tracing::warn!(
                    series = %abbr,
                    ordinal,
                    page = %page.display(),
                    error = %err,
                    "could not extract chapter; page kept"
                );
                return Err(err.into());
            }
        };
        let raw = RawChapter::from_paragraphs(title, paragraphs);
        self.store.save_raw(abbr, ordinal, &raw)?;
        Ok(raw)
    }

    fn translate_line(
        &self,
        codec: &mut ChapterCodec<'_>,
        line: &str,
        line_no: usize,
    ) -> Result<LineOutcome, ChapterError> {
        // Blank lines carry paragraph structure only.
        if line.trim().is_empty() {
            return Ok(LineOutcome::Translated(line.to_owned()));
        }

        let encoded = codec.encode(line);
        match self.translator.translate(&encoded, self.context.series.lang) {
            Ok(translated) => {
                let missing = codec.missing_tokens(&encoded, &translated);
                if !missing.is_empty() {
                    tracing::warn!(
                        series = %self.context.series.abbr,
                        line = line_no,
                        missing = ?missing,
                        "translator dropped glossary tokens"
                    );
                }
                Ok(LineOutcome::Translated(codec.decode(&translated)))
            }
            Err(err) if err.is_exhausted() && self.line_policy == LineFailurePolicy::Mark => {
                tracing::warn!(
                    series = %self.context.series.abbr,
                    line = line_no,
                    error = %err,
                    "line left untranslated"
                );
                Ok(LineOutcome::Failed(format!(
                    "{ERROR_LINE_MARKER} {}",
                    codec.restore(&encoded)
                )))
            }
            Err(source) => Err(ChapterError::Translation {
                line: line_no,
                source,
            }),
        }
    }
}
