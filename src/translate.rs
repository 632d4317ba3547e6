use std::io::Write as _;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::config::{Language, TranslatorEngine, TranslatorSettings};
use crate::error::{ConfigError, RetryFailure, TranslateError};
use crate::openai;
use crate::retry::RetryPolicy;

/// Translates one line of source-language text into the configured target language.
pub trait Translate: Send + Sync {
    fn translate(&self, text: &str, from: Language) -> Result<String, TranslateError>;
}

/// Returns the input unchanged. Useful for download-only runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

impl Translate for NoopTranslator {
    fn translate(&self, text: &str, _from: Language) -> Result<String, TranslateError> {
        Ok(text.to_owned())
    }
}

/// Runs an external program per line: text on stdin, translation on stdout.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
    target_lang: String,
}

impl CommandTranslator {
    pub fn new(program: String, args: Vec<String>, target_lang: String) -> Self {
        Self {
            program,
            args,
            target_lang,
        }
    }
}

impl Translate for CommandTranslator {
    fn translate(&self, text: &str, from: Language) -> Result<String, TranslateError> {
        let program = &self.program;
        let mut child = Command::new(program)
            .args(&self.args)
            .env("DOWNTRANS_SOURCE_LANG", from.code())
            .env("DOWNTRANS_TARGET_LANG", &self.target_lang)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                TranslateError::Rejected(format!("spawn translator command {program}: {err}"))
            })?;

        {
            let Some(mut stdin) = child.stdin.take() else {
                return Err(TranslateError::Transient(
                    "translator stdin unavailable".to_owned(),
                ));
            };
            stdin.write_all(text.as_bytes()).map_err(|err| {
                TranslateError::Transient(format!("write translator stdin: {err}"))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| TranslateError::Transient(format!("wait translator process: {err}")))?;
        if !output.status.success() {
            return Err(TranslateError::Transient(format!(
                "translator command failed: {program} ({})",
                output.status
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| {
            TranslateError::Transient("translator stdout is not valid UTF-8".to_owned())
        })?;
        non_empty(stdout.trim_end_matches(['\r', '\n']).to_owned())
    }
}

/// The keyless `translate_a/single` endpoint of Google Translate.
pub struct GoogleTranslator {
    client: reqwest::blocking::Client,
    endpoint: String,
    target_lang: String,
}

impl GoogleTranslator {
    pub fn new(client: reqwest::blocking::Client, base_url: &str, target_lang: String) -> Self {
        Self {
            client,
            endpoint: format!("{}/translate_a/single", base_url.trim_end_matches('/')),
            target_lang,
        }
    }
}

impl Translate for GoogleTranslator {
    fn translate(&self, text: &str, from: Language) -> Result<String, TranslateError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", from.code()),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .map_err(|err| TranslateError::Transient(format!("GET {}: {err}", self.endpoint)))?;

        let status = response.status();
        let raw = response
            .text()
            .map_err(|err| TranslateError::Transient(format!("read translate response: {err}")))?;
        if !status.is_success() {
            return Err(classify_status(
                status.as_u16(),
                format!("translate endpoint returned {status}"),
            ));
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| TranslateError::Transient(format!("parse translate response: {err}")))?;
        non_empty(google_sentences(&value).ok_or_else(|| {
            TranslateError::Transient("unexpected translate response shape".to_owned())
        })?)
    }
}

/// Joins the translated sentences of a `translate_a/single` response (`[[["..", ".."], ..], ..]`).
fn google_sentences(value: &serde_json::Value) -> Option<String> {
    let sentences = value.get(0)?.as_array()?;
    let mut out = String::new();
    for sentence in sentences {
        if let Some(part) = sentence.get(0).and_then(|v| v.as_str()) {
            out.push_str(part);
        }
    }
    Some(out)
}

pub struct OpenaiTranslator {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    target_lang: String,
}

impl Translate for OpenaiTranslator {
    fn translate(&self, text: &str, from: Language) -> Result<String, TranslateError> {
        let instructions = format!(
            "You are a translation engine.\n\
Task: Translate the input line of a {from} web novel into {to}.\n\
\n\
Hard rules:\n\
- Output ONLY the translation of the line, on a single line.\n\
- Do not summarize and do not add commentary.\n\
- Do not change placeholder tokens of the form {{{{GLS_TOKEN_000000}}}} or {{{{GLS1_TOKEN_000000}}}} (copy them exactly; no spaces; two braces).\n",
            from = from.english_name(),
            to = &self.target_lang,
        );
        let out = openai::responses_text(
            &self.client,
            &self.endpoint,
            &self.api_key,
            &self.model,
            &instructions,
            text,
            0.2,
        )?;
        non_empty(out.trim().to_owned())
    }
}

/// Service refusals and bad requests are final; throttling and server trouble are retried.
pub fn classify_status(status: u16, message: String) -> TranslateError {
    if status == 429 || status >= 500 {
        TranslateError::Transient(message)
    } else {
        TranslateError::Rejected(message)
    }
}

fn non_empty(text: String) -> Result<String, TranslateError> {
    if text.trim().is_empty() {
        return Err(TranslateError::Transient(
            "translation output is empty".to_owned(),
        ));
    }
    Ok(text)
}

pub fn build_translator(settings: &TranslatorSettings) -> anyhow::Result<Arc<dyn Translate>> {
    let engine = settings.engine;
    let http_client = || {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("build http client")
    };

    let translator: Arc<dyn Translate> = match engine {
        TranslatorEngine::Noop => Arc::new(NoopTranslator),
        TranslatorEngine::Command => {
            let program = settings
                .command
                .clone()
                .ok_or(ConfigError::MissingTranslatorSetting {
                    engine: engine.name(),
                    what: "a command (DOWNTRANS_TRANSLATE_COMMAND)",
                })?;
            Arc::new(CommandTranslator::new(
                program,
                settings.command_args.clone(),
                settings.target_lang.clone(),
            ))
        }
        TranslatorEngine::Google => Arc::new(GoogleTranslator::new(
            http_client()?,
            &settings.google_base_url,
            settings.target_lang.clone(),
        )),
        TranslatorEngine::Openai => {
            let api_key =
                settings
                    .openai_api_key
                    .clone()
                    .ok_or(ConfigError::MissingTranslatorSetting {
                        engine: engine.name(),
                        what: "an API key (OPENAI_API_KEY)",
                    })?;
            Arc::new(OpenaiTranslator {
                client: http_client()?,
                endpoint: openai::responses_endpoint(&settings.openai_base_url),
                api_key,
                model: settings.openai_model.clone(),
                target_lang: settings.target_lang.clone(),
            })
        }
    };

    tracing::info!(
        engine = engine.name(),
        target_lang = %settings.target_lang,
        "translator ready"
    );
    Ok(translator)
}

/// [`Translate`] with the retry policy applied.
#[derive(Clone)]
pub struct RemoteTranslator {
    inner: Arc<dyn Translate>,
    policy: RetryPolicy,
}

impl RemoteTranslator {
    pub fn new(inner: Arc<dyn Translate>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn translate(
        &self,
        text: &str,
        from: Language,
    ) -> Result<String, RetryFailure<TranslateError>> {
        let out = self
            .policy
            .run("translate", |_| self.inner.translate(text, from))?;
        if out.retries > 0 {
            tracing::debug!(retries = out.retries, "translated after retries");
        }
        Ok(out.value)
    }
}
