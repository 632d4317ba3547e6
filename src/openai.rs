use crate::error::TranslateError;
use crate::translate::classify_status;

pub fn responses_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/responses")
}

pub fn responses_text(
    client: &reqwest::blocking::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    instructions: &str,
    input: &str,
    temperature: f32,
) -> Result<String, TranslateError> {
    let mut body = serde_json::json!({
        "model": model,
        "instructions": instructions,
        "input": input,
        "text": { "format": { "type": "text" } },
        "store": false,
    });

    // NOTE: Some GPT-5 models reject sampling params like `temperature`.
    if !model.starts_with("gpt-5")
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert("temperature".to_owned(), serde_json::json!(temperature));
    }

    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .map_err(|err| TranslateError::Transient(format!("POST {endpoint}: {err}")))?;

    let status = response.status();
    let raw = response
        .text()
        .map_err(|err| TranslateError::Transient(format!("read OpenAI response body: {err}")))?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or(raw);
        return Err(classify_status(
            status.as_u16(),
            format!("OpenAI API error ({status}): {message}"),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| TranslateError::Transient(format!("parse OpenAI response: {err}")))?;
    extract_output_text(&value).ok_or_else(|| {
        TranslateError::Transient("OpenAI response has no output text".to_owned())
    })
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_output_text(value: &serde_json::Value) -> Option<String> {
    let output = value.get("output")?.as_array()?;

    let mut text = String::new();
    for item in output {
        if item.get("type").and_then(|v| v.as_str()) != Some("message") {
            continue;
        }
        let Some(content) = item.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for part in content {
            if part.get("type").and_then(|v| v.as_str()) != Some("output_text") {
                continue;
            }
            if let Some(part_text) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(part_text);
            }
        }
    }

    (!text.trim().is_empty()).then_some(text)
}
