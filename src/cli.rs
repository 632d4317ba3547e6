use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, GlossaryMode, TranslatorEngine};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// User configuration (hosts, series, translator).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Workspace root holding raws/, trans/, tables/, dicts/ and reports/.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download and translate one chapter.
    One(OneArgs),
    /// Download and translate an inclusive range of chapters in parallel.
    Batch(BatchArgs),
    /// Re-scrape the table of contents and overwrite the cached page table.
    RefreshTable(SeriesArgs),
    /// Print the number of the latest chapter listed on the table of contents.
    Latest(SeriesArgs),
    /// Remove downloaded, translated and report files.
    Clean,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Series abbreviation from the configuration.
    pub series: String,
}

#[derive(Debug, Args)]
pub struct OneArgs {
    /// Series abbreviation from the configuration.
    pub series: String,

    /// Chapter number (1-based).
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub chapter: u64,

    #[command(flatten)]
    pub translate: TranslateArgs,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Series abbreviation from the configuration.
    pub series: String,

    /// First chapter (1-based).
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub start: u64,

    /// Last chapter, inclusive; must be greater than START.
    pub end: u64,

    /// Write the JSON batch report here instead of reports/.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Maximum chapters processed at once (defaults to available parallelism).
    #[arg(long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub translate: TranslateArgs,
}

#[derive(Debug, Clone, Args)]
pub struct TranslateArgs {
    /// Translator engine; overrides the configuration file.
    #[arg(long, value_enum)]
    pub engine: Option<TranslatorEngine>,

    /// Glossary strategy; overrides the series setting.
    #[arg(long, value_enum)]
    pub glossary_mode: Option<GlossaryMode>,

    /// Fail a chapter as soon as one line cannot be translated.
    #[arg(long)]
    pub abort_on_failed_line: bool,
}
