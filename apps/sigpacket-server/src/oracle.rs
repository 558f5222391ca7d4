//! HTTP extraction oracle
//!
//! Sends a rendered signature page to an OpenAI-compatible chat completions
//! endpoint and interprets the reply with [`parse_oracle_payload`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use sigpacket_core::{
    parse_oracle_payload, OracleResponse, RenderedPage, Result, SigPacketError, SignatureOracle,
};

const SYSTEM_PROMPT: &str = "You read signature pages from legal agreements. \
For every signing block on the page, report the party bound by the agreement, \
the individual who signs, and the capacity or title they sign in. \
Reply with JSON only: {\"signatures\": [{\"party_name\": \"...\", \
\"signatory_name\": \"...\", \"capacity\": \"...\"}]}. \
Use an empty string for anything not printed on the page. \
Reply {\"signatures\": []} when there is no signing block.";

/// Connection settings for the oracle endpoint
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Transport-level timeout; the pipeline applies its own on top
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct HttpOracle {
    http_client: reqwest::Client,
    settings: OracleSettings,
}

#[derive(Deserialize)]
struct ChatResponseRaw {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(settings: OracleSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SigPacketError::Oracle(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

/// The page as a chat content part: images inline, PDFs as file data
fn page_content(page: &RenderedPage) -> Value {
    let data_url = format!("data:{};base64,{}", page.mime_type, page.data_base64());
    if page.mime_type.starts_with("image/") {
        json!({ "type": "image_url", "image_url": { "url": data_url } })
    } else {
        json!({
            "type": "file",
            "file": {
                "filename": format!("page-{}.pdf", page.page_number()),
                "file_data": data_url,
            }
        })
    }
}

fn request_body(model: &str, page: &RenderedPage) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": format!("Extract the signing blocks from page {}.", page.page_number()),
                    },
                    page_content(page),
                ]
            }
        ]
    })
}

#[async_trait]
impl SignatureOracle for HttpOracle {
    async fn extract(&self, page: &RenderedPage) -> Result<OracleResponse> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| SigPacketError::Oracle("No oracle API key configured".into()))?;

        let start = Instant::now();
        let response = self
            .http_client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body(&self.settings.model, page))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SigPacketError::Timeout(self.settings.timeout.as_millis() as u64)
                } else {
                    SigPacketError::Oracle(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Oracle API error");
            return Err(SigPacketError::Oracle(format!(
                "Oracle API returned {}: {}",
                status, error_text
            )));
        }

        let raw: ChatResponseRaw = match response.json().await {
            Ok(raw) => raw,
            Err(e) => return Ok(OracleResponse::Malformed(e.to_string())),
        };

        debug!(
            model = %self.settings.model,
            page = page.page_number(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Oracle chat completion"
        );

        match raw.choices.into_iter().next().and_then(|c| c.message.content) {
            Some(content) => Ok(parse_oracle_payload(&content)),
            None => Ok(OracleResponse::Malformed("response had no content".into())),
        }
    }
}
