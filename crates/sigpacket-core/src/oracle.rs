//! Metadata extraction oracle and the adapter that makes its output safe
//!
//! The oracle is an external vision service and is treated as untrusted:
//! whatever it returns, or fails to return, the adapter hands the pipeline a
//! list of fully populated signature blocks and never an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{RenderedPage, DEFAULT_CAPACITY, UNKNOWN_PARTY};

/// One signing block as the oracle reported it; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignatureBlock {
    #[serde(default, alias = "party", alias = "partyName")]
    pub party_name: Option<String>,
    #[serde(default, alias = "signatory", alias = "signatoryName")]
    pub signatory_name: Option<String>,
    #[serde(default, alias = "title", alias = "role")]
    pub capacity: Option<String>,
}

/// Outcome of one oracle call that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleResponse {
    Blocks(Vec<RawSignatureBlock>),
    /// The service answered but the payload could not be understood
    Malformed(String),
}

/// External page-image to signing-block extractor
#[async_trait]
pub trait SignatureOracle: Send + Sync {
    async fn extract(&self, page: &RenderedPage) -> Result<OracleResponse>;
}

/// A validated signing block with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    pub party_name: String,
    pub signatory_name: String,
    pub capacity: String,
}

impl SignatureBlock {
    /// Stand-in for a page that was confirmed procedurally but yielded no blocks
    pub fn placeholder() -> Self {
        Self {
            party_name: UNKNOWN_PARTY.to_string(),
            signatory_name: String::new(),
            capacity: DEFAULT_CAPACITY.to_string(),
        }
    }
}

impl From<RawSignatureBlock> for SignatureBlock {
    fn from(raw: RawSignatureBlock) -> Self {
        fn cleaned(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            party_name: cleaned(raw.party_name).unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
            signatory_name: cleaned(raw.signatory_name).unwrap_or_default(),
            capacity: cleaned(raw.capacity).unwrap_or_else(|| DEFAULT_CAPACITY.to_string()),
        }
    }
}

/// Wraps an oracle with a timeout and output normalization
#[derive(Clone)]
pub struct ExtractorAdapter {
    oracle: Arc<dyn SignatureOracle>,
    timeout: Duration,
}

impl ExtractorAdapter {
    pub fn new(oracle: Arc<dyn SignatureOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Zero or more normalized blocks; every failure mode yields an empty list
    pub async fn extract(&self, page: &RenderedPage) -> Vec<SignatureBlock> {
        let outcome = tokio::time::timeout(self.timeout, self.oracle.extract(page)).await;

        let raw = match outcome {
            Ok(Ok(OracleResponse::Blocks(blocks))) => blocks,
            Ok(Ok(OracleResponse::Malformed(reason))) => {
                warn!(page = page.page_number(), %reason, "Oracle returned malformed output");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(page = page.page_number(), error = %e, "Oracle call failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    page = page.page_number(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Oracle call timed out"
                );
                Vec::new()
            }
        };

        debug!(page = page.page_number(), blocks = raw.len(), "Oracle answered");
        raw.into_iter().map(SignatureBlock::from).collect()
    }
}

/// Interpret model text as a list of signing blocks
///
/// Accepts a bare JSON array, an object holding the array under
/// `signatures`/`blocks`/`signature_blocks`, or either wrapped in a markdown
/// code fence. Anything else is `Malformed`.
pub fn parse_oracle_payload(text: &str) -> OracleResponse {
    let body = strip_code_fence(text);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => return OracleResponse::Malformed(format!("invalid JSON: {}", e)),
    };

    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => {
            let key = ["signatures", "blocks", "signature_blocks"]
                .into_iter()
                .find(|k| map.get(*k).is_some_and(Value::is_array));
            match key.and_then(|k| map.remove(k)) {
                Some(list) => list,
                None => {
                    return OracleResponse::Malformed("object without a block list".to_string())
                }
            }
        }
        other => {
            return OracleResponse::Malformed(format!("unexpected JSON value: {}", other));
        }
    };

    match serde_json::from_value::<Vec<RawSignatureBlock>>(list) {
        Ok(blocks) => OracleResponse::Blocks(blocks),
        Err(e) => OracleResponse::Malformed(format!("invalid block list: {}", e)),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block, Script, ScriptedOracle};
    use pretty_assertions::assert_eq;

    fn page(index: u32) -> RenderedPage {
        RenderedPage {
            page_index: index,
            data: vec![1, 2, 3],
            mime_type: "image/png".into(),
            width: 10,
            height: 10,
        }
    }

    fn adapter(oracle: ScriptedOracle) -> ExtractorAdapter {
        ExtractorAdapter::new(Arc::new(oracle), Duration::from_millis(200))
    }

    #[test]
    fn test_normalize_applies_defaults() {
        let normalized = SignatureBlock::from(RawSignatureBlock {
            party_name: Some("   ".into()),
            signatory_name: None,
            capacity: Some("".into()),
        });
        assert_eq!(normalized, SignatureBlock::placeholder());
    }

    #[test]
    fn test_normalize_trims_values() {
        let normalized = SignatureBlock::from(block(" Acme Corp ", " Jane Smith", "Director "));
        assert_eq!(
            normalized,
            SignatureBlock {
                party_name: "Acme Corp".into(),
                signatory_name: "Jane Smith".into(),
                capacity: "Director".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_adapter_passes_blocks_through() {
        let oracle = ScriptedOracle::new().on(
            0,
            Script::Blocks(vec![
                block("Acme Corp", "Jane Smith", "Director"),
                block("Beta LLC", "", ""),
            ]),
        );
        let blocks = adapter(oracle).extract(&page(0)).await;

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].party_name, "Beta LLC");
        assert_eq!(blocks[1].signatory_name, "");
        assert_eq!(blocks[1].capacity, DEFAULT_CAPACITY);
    }

    #[tokio::test]
    async fn test_adapter_absorbs_failures() {
        let oracle = ScriptedOracle::new()
            .on(0, Script::Fail)
            .on(1, Script::Malformed);
        let adapter = adapter(oracle);

        assert!(adapter.extract(&page(0)).await.is_empty());
        assert!(adapter.extract(&page(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_times_out_to_empty() {
        let oracle = ScriptedOracle::new().on(0, Script::Hang);
        let adapter = ExtractorAdapter::new(Arc::new(oracle), Duration::from_millis(20));

        assert!(adapter.extract(&page(0)).await.is_empty());
    }

    #[test]
    fn test_parse_bare_array() {
        let response = parse_oracle_payload(
            r#"[{"party":"Acme Corp","signatory":"Jane Smith","capacity":"Director"}]"#,
        );
        assert_eq!(
            response,
            OracleResponse::Blocks(vec![block("Acme Corp", "Jane Smith", "Director")])
        );
    }

    #[test]
    fn test_parse_fenced_object() {
        let text = "```json\n{\"signatures\": [{\"partyName\": \"Beta LLC\", \"signatoryName\": null}]}\n```";
        let response = parse_oracle_payload(text);
        assert_eq!(
            response,
            OracleResponse::Blocks(vec![RawSignatureBlock {
                party_name: Some("Beta LLC".into()),
                signatory_name: None,
                capacity: None,
            }])
        );
    }

    #[test]
    fn test_parse_empty_list_is_not_malformed() {
        assert_eq!(
            parse_oracle_payload(r#"{"signatures": []}"#),
            OracleResponse::Blocks(vec![])
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_oracle_payload("I could not find any signatures."),
            OracleResponse::Malformed(_)
        ));
        assert!(matches!(
            parse_oracle_payload(r#"{"answer": 42}"#),
            OracleResponse::Malformed(_)
        ));
        assert!(matches!(
            parse_oracle_payload(r#"[{"party": 7}]"#),
            OracleResponse::Malformed(_)
        ));
    }
}
