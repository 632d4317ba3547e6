use std::sync::Arc;

use anyhow::Context as _;
use url::Url;

use crate::config::{Config, GlossaryMode, Host, Series};
use crate::error::OutOfRangeError;
use crate::fetch::RemoteFetcher;
use crate::glossary::Glossary;
use crate::hosts::ContentParser;
use crate::page_table::{ChapterAddress, PageTable, PageTableResolver, address_for_series};
use crate::store::ArtifactStore;

/// Everything a chapter needs to know about its series, resolved once per run
/// and shared read-only between workers.
#[derive(Debug)]
pub struct SeriesContext {
    pub series: Series,
    pub host: Host,
    pub index_url: Url,
    pub glossary: Glossary,
    pub glossary_mode: GlossaryMode,
    pub page_table: Option<Arc<PageTable>>,
}

impl SeriesContext {
    /// Looks up the series, loads its glossary and resolves its page table.
    pub fn build(
        config: &Config,
        abbr: &str,
        fetcher: &RemoteFetcher,
        store: &ArtifactStore,
        glossary_mode: Option<GlossaryMode>,
    ) -> anyhow::Result<Self> {
        let (series, host) = config.lookup(abbr)?;
        let index_url = series.index_url(host)?;

        let glossary = Glossary::load_or_create(&store.dict_path(&series.abbr), index_url.as_str())
            .with_context(|| format!("load glossary for {abbr}"))?;
        let page_table = PageTableResolver::new(fetcher, store)
            .resolve(series, host)
            .with_context(|| format!("resolve page table for {abbr}"))?;

        tracing::info!(
            series = %series.abbr,
            host = %host.kind,
            glossary_entries = glossary.len(),
            page_table = page_table.as_ref().map(|t| t.len()),
            "series ready"
        );

        Ok(Self {
            series: series.clone(),
            host: host.clone(),
            index_url,
            glossary,
            glossary_mode: glossary_mode.unwrap_or(series.glossary_mode),
            page_table,
        })
    }

    pub fn parser(&self) -> &'static dyn ContentParser {
        self.host.kind.parser()
    }

    pub fn address_for(&self, ordinal: usize) -> Result<ChapterAddress, OutOfRangeError> {
        address_for_series(self.page_table.as_deref(), ordinal)
    }

    pub fn chapter_url(&self, address: &ChapterAddress) -> anyhow::Result<Url> {
        self.parser().chapter_url(&self.index_url, address)
    }
}
