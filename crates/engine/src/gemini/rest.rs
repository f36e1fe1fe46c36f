use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use common::{Analysis, Analyzer, Error, Frame, Result};

use super::schema::{analysis_schema, PROMPT};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Top-level keys a usable answer must carry. `price` may be absent.
const REQUIRED_FIELDS: [&str; 5] = ["asset", "signal", "confidence", "reasoning", "indicators"];

/// REST client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: BASE_URL.to_string(),
            http,
        })
    }

    /// Point the client at another host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Request payload: prompt, the frame inline, and a JSON response schema.
pub fn request_body(frame: &Frame) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": PROMPT },
                {
                    "inline_data": {
                        "mime_type": frame.mime_type(),
                        "data": frame.data(),
                    }
                }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": analysis_schema(),
        }
    })
}

/// Decode the model's JSON answer into a validated `Analysis`.
pub fn parse_analysis(text: &str) -> Result<Analysis> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| Error::MalformedAnalysis(format!("not JSON: {e}")))?;

    for field in REQUIRED_FIELDS {
        if value.get(field).map_or(true, Value::is_null) {
            return Err(Error::MalformedAnalysis(format!("missing field '{field}'")));
        }
    }

    let analysis: Analysis =
        serde_json::from_value(value).map_err(|e| Error::MalformedAnalysis(e.to_string()))?;
    analysis.validate()
}

#[async_trait]
impl Analyzer for GeminiClient {
    async fn analyze(&self, frame: &Frame) -> Result<Analysis> {
        debug!(model = %self.model, bytes = frame.data().len(), "Requesting chart analysis");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(frame))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Analyzer(format!("Gemini API HTTP {status}: {body}")));
        }

        let resp: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| Error::Analyzer(e.to_string()))?;
        parse_analysis(&resp.text()?)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Result<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::MalformedAnalysis("response contained no text".into()));
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}
