//! Entry points behind the CLI subcommands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

use crate::batch::BatchOrchestrator;
use crate::cli::{BatchArgs, Cli, Command, OneArgs, SeriesArgs, TranslateArgs};
use crate::config::{Config, GlossaryMode};
use crate::context::SeriesContext;
use crate::fetch::{HttpFetcher, RemoteFetcher};
use crate::formats::{BatchReport, ChapterResult};
use crate::page_table::PageTableResolver;
use crate::pipeline::{ChapterPipeline, LineFailurePolicy};
use crate::retry::RetryPolicy;
use crate::store::{ArtifactStore, CleanSummary};
use crate::translate::{RemoteTranslator, build_translator};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration, workspace and remote adapters for one invocation.
pub struct Session {
    config: Config,
    store: ArtifactStore,
    fetcher: RemoteFetcher,
    translator: RemoteTranslator,
    glossary_mode: Option<GlossaryMode>,
    line_policy: LineFailurePolicy,
    workers: Option<usize>,
}

impl Session {
    pub fn new(
        config: Config,
        store: ArtifactStore,
        fetcher: RemoteFetcher,
        translator: RemoteTranslator,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            translator,
            glossary_mode: None,
            line_policy: LineFailurePolicy::default(),
            workers: None,
        }
    }

    /// Wires the HTTP fetcher and the configured translator with the default retry policy.
    pub fn open(mut config: Config, root: &Path, translate: &TranslateArgs) -> anyhow::Result<Self> {
        if let Some(engine) = translate.engine {
            config.translator.engine = engine;
        }
        let store = ArtifactStore::open(root)?;
        let policy = RetryPolicy::default();
        let fetcher = RemoteFetcher::new(Arc::new(HttpFetcher::new(FETCH_TIMEOUT)?), policy);
        let translator = RemoteTranslator::new(build_translator(&config.translator)?, policy);

        Ok(Self::new(config, store, fetcher, translator)
            .with_glossary_mode(translate.glossary_mode)
            .with_line_policy(if translate.abort_on_failed_line {
                LineFailurePolicy::Abort
            } else {
                LineFailurePolicy::Mark
            }))
    }

    pub fn with_glossary_mode(mut self, mode: Option<GlossaryMode>) -> Self {
        self.glossary_mode = mode;
        self
    }

    pub fn with_line_policy(mut self, policy: LineFailurePolicy) -> Self {
        self.line_policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Builds the series context (glossary and page table) and the pipeline around it.
    pub fn pipeline(&self, abbr: &str) -> anyhow::Result<ChapterPipeline> {
        let context = SeriesContext::build(
            &self.config,
            abbr,
            &self.fetcher,
            &self.store,
            self.glossary_mode,
        )?;
        Ok(ChapterPipeline::new(
            Arc::new(context),
            self.store.clone(),
            self.fetcher.clone(),
            self.translator.clone(),
            self.line_policy,
        ))
    }

    pub fn resolve_one(&self, abbr: &str, ordinal: usize) -> anyhow::Result<ChapterResult> {
        Ok(self.pipeline(abbr)?.run(ordinal))
    }

    pub fn resolve_batch(&self, abbr: &str, ordinals: &[usize]) -> anyhow::Result<BatchReport> {
        let pipeline = self.pipeline(abbr)?;
        let mut orchestrator = BatchOrchestrator::new(pipeline);
        if let Some(workers) = self.workers {
            orchestrator = orchestrator.with_workers(workers);
        }

        let started_at = Utc::now();
        let results = orchestrator.run(ordinals)?;
        Ok(BatchReport {
            series: abbr.to_owned(),
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    /// Returns the number of chapters in the refreshed table.
    pub fn refresh_table(&self, abbr: &str) -> anyhow::Result<usize> {
        let (series, host) = self.config.lookup(abbr)?;
        let table = PageTableResolver::new(&self.fetcher, &self.store).force_refresh(series, host)?;
        Ok(table.len())
    }

    pub fn latest(&self, abbr: &str) -> anyhow::Result<usize> {
        let (series, host) = self.config.lookup(abbr)?;
        let index_url = series.index_url(host)?;
        let html = self
            .fetcher
            .fetch(&index_url, series.lang)
            .with_context(|| format!("fetch table of contents: {index_url}"))?;
        let latest = host
            .kind
            .parser()
            .latest_chapter(&html)
            .with_context(|| format!("read chapter list: {index_url}"))?;
        Ok(latest)
    }

    pub fn clean(&self) -> anyhow::Result<CleanSummary> {
        self.store.clean()
    }
}

/// Runs a parsed command line. `Ok(false)` means some chapter failed.
pub fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Command::Clean => {
            let summary = ArtifactStore::open(&cli.root)?.clean()?;
            if summary.failed == 0 {
                println!("cleaned {} file(s)", summary.removed);
            } else {
                println!(
                    "cleaned {} file(s); {} could not be removed",
                    summary.removed, summary.failed
                );
            }
            Ok(summary.failed == 0)
        }
        Command::One(args) => one(&cli.config, &cli.root, args),
        Command::Batch(args) => batch(&cli.config, &cli.root, args),
        Command::RefreshTable(args) => {
            let session = Session::open(Config::load(&cli.config)?, &cli.root, &no_translate())?;
            let chapters = session
                .refresh_table(&args.series)
                .with_context(|| format!("refresh page table for {}", args.series))?;
            println!("{}: page table refreshed ({chapters} chapters)", args.series);
            Ok(true)
        }
        Command::Latest(SeriesArgs { series }) => {
            let session = Session::open(Config::load(&cli.config)?, &cli.root, &no_translate())?;
            let latest = session.latest(&series)?;
            println!("{series}: latest chapter {latest}");
            Ok(true)
        }
    }
}

// Table and index commands never translate.
fn no_translate() -> TranslateArgs {
    TranslateArgs {
        engine: Some(crate::config::TranslatorEngine::Noop),
        glossary_mode: None,
        abort_on_failed_line: false,
    }
}

fn one(config: &Path, root: &Path, args: OneArgs) -> anyhow::Result<bool> {
    let session = Session::open(Config::load(config)?, root, &args.translate)?;
    let ordinal = usize::try_from(args.chapter).context("chapter number too large")?;
    let result = session.resolve_one(&args.series, ordinal)?;

    print_result(&result);
    if result.is_success() {
        println!(
            "output: {}",
            session
                .store()
                .translated_path(&args.series, ordinal)
                .display()
        );
    }
    Ok(result.is_success())
}

fn batch(config: &Path, root: &Path, args: BatchArgs) -> anyhow::Result<bool> {
    if args.end <= args.start {
        anyhow::bail!(
            "end chapter must be greater than start chapter (start={}, end={})",
            args.start,
            args.end
        );
    }
    let start = usize::try_from(args.start).context("start chapter too large")?;
    let end = usize::try_from(args.end).context("end chapter too large")?;
    let ordinals = (start..=end).collect::<Vec<_>>();

    let session =
        Session::open(Config::load(config)?, root, &args.translate)?.with_workers(args.workers);
    let report = session.resolve_batch(&args.series, &ordinals)?;

    println!("{} report:", report.series);
    for result in &report.results {
        print_result(result);
    }
    let report_path = session
        .store()
        .save_report(&report, args.report.as_deref())?;
    println!("report: {}", report_path.display());
    Ok(report.all_succeeded())
}

fn print_result(result: &ChapterResult) {
    match &result.detail {
        Some(detail) => println!("  chapter {:<5} {}: {detail}", result.ordinal, result.status),
        None => println!("  chapter {:<5} {}", result.ordinal, result.status),
    }
}
