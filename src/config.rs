use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::hosts::HostKind;

pub const DEFAULT_CONFIG_PATH: &str = "user_config.json";

/// Source language of a series. Also decides how fetched pages are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "JP", alias = "jp", alias = "ja")]
    Jp,
    #[serde(rename = "CN", alias = "cn", alias = "zh")]
    Cn,
}

impl Language {
    pub fn encoding(self) -> &'static encoding_rs::Encoding {
        match self {
            Language::Jp => encoding_rs::UTF_8,
            Language::Cn => encoding_rs::GBK,
        }
    }

    /// Language code understood by the translate endpoints.
    pub fn code(self) -> &'static str {
        match self {
            Language::Jp => "ja",
            Language::Cn => "zh-CN",
        }
    }

    pub fn english_name(self) -> &'static str {
        match self {
            Language::Jp => "Japanese",
            Language::Cn => "Chinese",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Jp => f.write_str("JP"),
            Language::Cn => f.write_str("CN"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GlossaryMode {
    /// Replace source terms with their targets before translating.
    Direct,
    /// Swap terms for opaque tokens and restore the targets after translating.
    #[default]
    Protected,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorEngine {
    #[default]
    Noop,
    Command,
    Google,
    Openai,
}

impl TranslatorEngine {
    pub fn name(self) -> &'static str {
        match self {
            TranslatorEngine::Noop => "noop",
            TranslatorEngine::Command => "command",
            TranslatorEngine::Google => "google",
            TranslatorEngine::Openai => "openai",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UserConfig {
    #[serde(default)]
    hosts: Vec<HostEntry>,
    #[serde(default)]
    series: Vec<SeriesEntry>,
    #[serde(default)]
    translator: TranslatorSection,
}

#[derive(Debug, Clone, Deserialize)]
struct HostEntry {
    host_name: String,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SeriesEntry {
    name: String,
    #[serde(default)]
    title: Option<String>,
    lang: Language,
    host: String,
    code: String,
    #[serde(default)]
    glossary_mode: GlossaryMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TranslatorSection {
    #[serde(default)]
    engine: TranslatorEngine,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    command_args: Vec<String>,
    #[serde(default)]
    openai_model: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub base_url: Url,
    pub kind: HostKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub abbr: String,
    pub title: String,
    pub lang: Language,
    pub host: String,
    pub code: String,
    pub glossary_mode: GlossaryMode,
}

impl Series {
    /// Table of contents page of the series on its host.
    pub fn index_url(&self, host: &Host) -> anyhow::Result<Url> {
        let code = self.code.trim_matches('/');
        host.base_url
            .join(&format!("{code}/"))
            .with_context(|| format!("build index url for series {}", self.abbr))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorSettings {
    pub engine: TranslatorEngine,
    pub target_lang: String,
    pub command: Option<String>,
    pub command_args: Vec<String>,
    pub google_base_url: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            engine: TranslatorEngine::Noop,
            target_lang: "en".to_owned(),
            command: None,
            command_args: Vec::new(),
            google_base_url: "https://translate.googleapis.com".to_owned(),
            openai_base_url: "https://api.openai.com/v1".to_owned(),
            openai_model: "gpt-4o-mini".to_owned(),
            openai_api_key: None,
            timeout_secs: 60,
        }
    }
}

impl TranslatorSettings {
    fn from_section(section: TranslatorSection) -> Self {
        let defaults = Self::default();
        let mut settings = Self {
            engine: section.engine,
            target_lang: section.target_lang.unwrap_or(defaults.target_lang),
            command: section.command,
            command_args: section.command_args,
            openai_model: section.openai_model.unwrap_or(defaults.openai_model),
            timeout_secs: section.timeout_secs.unwrap_or(defaults.timeout_secs),
            ..defaults
        };
        settings.apply_env();
        settings
    }

    /// Endpoints and secrets may come from the environment.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DOWNTRANS_GOOGLE_BASE_URL") {
            self.google_base_url = url;
        }
        if let Ok(url) = std::env::var("DOWNTRANS_OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Ok(model) = std::env::var("DOWNTRANS_OPENAI_MODEL") {
            self.openai_model = model;
        }
        if let Ok(command) = std::env::var("DOWNTRANS_TRANSLATE_COMMAND") {
            self.command = Some(command);
        }
        self.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    hosts: BTreeMap<String, Host>,
    series: BTreeMap<String, Series>,
    pub translator: TranslatorSettings,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("load config: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let user: UserConfig = serde_json::from_str(raw).context("parse config json")?;
        Ok(Self::validate(user)?)
    }

    fn validate(user: UserConfig) -> Result<Self, ConfigError> {
        if user.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        if user.series.is_empty() {
            return Err(ConfigError::NoSeries);
        }

        let mut hosts = BTreeMap::new();
        for entry in user.hosts {
            let kind: HostKind = entry.host_name.parse()?;
            let mut base = entry.base_url.trim().to_owned();
            if !base.ends_with('/') {
                base.push('/');
            }
            let base_url = Url::parse(&base).map_err(|err| ConfigError::InvalidBaseUrl {
                host: entry.host_name.clone(),
                reason: err.to_string(),
            })?;
            if base_url.scheme() != "http" && base_url.scheme() != "https" {
                return Err(ConfigError::InvalidBaseUrl {
                    host: entry.host_name,
                    reason: "must be http/https".to_owned(),
                });
            }
            tracing::debug!(host = %entry.host_name, base_url = %base_url, "configured host");
            hosts.insert(
                entry.host_name.clone(),
                Host {
                    name: entry.host_name,
                    base_url,
                    kind,
                },
            );
        }

        let mut series = BTreeMap::new();
        for entry in user.series {
            if !hosts.contains_key(&entry.host) {
                return Err(ConfigError::UnknownHost {
                    series: entry.name,
                    host: entry.host,
                });
            }
            if series.contains_key(&entry.name) {
                return Err(ConfigError::DuplicateSeries(entry.name));
            }
            let title = entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| entry.name.clone());
            series.insert(
                entry.name.clone(),
                Series {
                    abbr: entry.name,
                    title,
                    lang: entry.lang,
                    host: entry.host,
                    code: entry.code,
                    glossary_mode: entry.glossary_mode,
                },
            );
        }

        Ok(Self {
            hosts,
            series,
            translator: TranslatorSettings::from_section(user.translator),
        })
    }

    pub fn lookup(&self, abbr: &str) -> Result<(&Series, &Host), ConfigError> {
        let series = self
            .series
            .get(abbr)
            .ok_or_else(|| ConfigError::UnknownSeries(abbr.to_owned()))?;
        let host = self
            .hosts
            .get(&series.host)
            .ok_or_else(|| ConfigError::UnknownHost {
                series: series.abbr.clone(),
                host: series.host.clone(),
            })?;
        Ok((series, host))
    }
}
