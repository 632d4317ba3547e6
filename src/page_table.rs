//! Chapter ordinal to fetchable address.
//!
//! Hosts whose chapter URLs are not predictable publish a table of contents;
//! the chapter codes scraped from it form the page table, cached on disk and
//! only rebuilt on an explicit refresh.

use std::sync::Arc;

use anyhow::Context as _;

use crate::config::{Host, Series};
use crate::error::OutOfRangeError;
use crate::fetch::RemoteFetcher;
use crate::store::ArtifactStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChapterAddress {
    Ordinal(usize),
    Code(String),
}

impl std::fmt::Display for ChapterAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChapterAddress::Ordinal(n) => write!(f, "#{n}"),
            ChapterAddress::Code(code) => write!(f, "code {code}"),
        }
    }
}

/// Chapter codes in reading order; index is ordinal - 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    codes: Vec<String>,
}

impl PageTable {
    pub fn new(codes: Vec<String>) -> Self {
        Self { codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn address_for(&self, ordinal: usize) -> Result<ChapterAddress, OutOfRangeError> {
        ordinal
            .checked_sub(1)
            .and_then(|idx| self.codes.get(idx))
            .map(|code| ChapterAddress::Code(code.clone()))
            .ok_or(OutOfRangeError {
                ordinal,
                len: self.codes.len(),
            })
    }
}

/// Address of `ordinal`, using the page table when the host has one.
pub fn address_for_series(
    table: Option<&PageTable>,
    ordinal: usize,
) -> Result<ChapterAddress, OutOfRangeError> {
    match table {
        Some(table) => table.address_for(ordinal),
        None if ordinal == 0 => Err(OutOfRangeError { ordinal, len: 0 }),
        None => Ok(ChapterAddress::Ordinal(ordinal)),
    }
}

pub struct PageTableResolver<'a> {
    fetcher: &'a RemoteFetcher,
    store: &'a ArtifactStore,
}

impl<'a> PageTableResolver<'a> {
    pub fn new(fetcher: &'a RemoteFetcher, store: &'a ArtifactStore) -> Self {
        Self { fetcher, store }
    }

    /// Cached table when present, otherwise scraped from the series index and cached.
    pub fn resolve(&self, series: &Series, host: &Host) -> anyhow::Result<Option<Arc<PageTable>>> {
        if !host.kind.parser().needs_page_table() {
            return Ok(None);
        }

        if let Some(codes) = self
            .store
            .load_table(&series.abbr)
            .with_context(|| format!("load page table for {}", series.abbr))?
        {
            tracing::debug!(series = %series.abbr, chapters = codes.len(), "using cached page table");
            return Ok(Some(Arc::new(PageTable::new(codes))));
        }

        self.build(series, host).map(Some)
    }

    /// Re-scrapes the index and overwrites the cached table.
    pub fn force_refresh(&self, series: &Series, host: &Host) -> anyhow::Result<Arc<PageTable>> {
        if !host.kind.parser().needs_page_table() {
            anyhow::bail!(
                "series {} is hosted on {}, which does not use a page table",
                series.abbr,
                host.kind
            );
        }
        self.build(series, host)
    }

    fn build(&self, series: &Series, host: &Host) -> anyhow::Result<Arc<PageTable>> {
        let index_url = series.index_url(host)?;
        tracing::info!(series = %series.abbr, url = %index_url, "building page table");

        let html = self
            .fetcher
            .fetch(&index_url, series.lang)
            .with_context(|| format!("fetch table of contents: {index_url}"))?;
        let codes = host
            .kind
            .parser()
            .parse_page_table(&html)
            .with_context(|| format!("parse table of contents: {index_url}"))?
            .unwrap_or_default();
        if codes.is_empty() {
            anyhow::bail!("table of contents for {} lists no chapters", series.abbr);
        }

        self.store
            .save_table(&series.abbr, &codes)
            .with_context(|| format!("save page table for {}", series.abbr))?;
        tracing::info!(series = %series.abbr, chapters = codes.len(), "page table saved");
        Ok(Arc::new(PageTable::new(codes)))
    }
}
