//! Wire format of the sync channel.
//!
//! # Client → service
//!
//! ```json
//! { "main": "main.tex",
//!   "files": { "main.tex": "<text>",
//!              "figure.png": "<base64>",
//!              "logo.png": { "type": "hash", "value": "abc123" } } }
//! ```
//!
//! # Service → client (discriminated by `type`)
//!
//! - `compile_success`: `{ pdf: <base64>, compile_time_ms: <number>, blobs?: { <path>: <hash> } }`
//! - `compile_error`: `{ error: <string> }`
//!
//! There is no request id: a result always answers the payload sent last.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use super::{FileEntry, SyncPayload};

impl Serialize for FileEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Inline(text) => serializer.serialize_str(text),
            Self::InlineBinary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            Self::Reference(hash) => {
                let mut s = serializer.serialize_struct("HashRef", 2)?;
                s.serialize_field("type", "hash")?;
                s.serialize_field("value", hash)?;
                s.end()
            }
        }
    }
}

impl Serialize for SyncPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("main", &self.main)?;
        map.serialize_entry("files", &self.files)?;
        map.end()
    }
}

impl SyncPayload {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Outcome of one remote compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult {
    Success {
        artifact: Vec<u8>,
        elapsed_ms: u64,
        /// Relative path → blob id the service now holds.
        confirmed: BTreeMap<String, String>,
    },
    Failure {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    CompileSuccess {
        pdf: String,
        #[serde(default)]
        compile_time_ms: f64,
        #[serde(default)]
        blobs: Option<BTreeMap<String, String>>,
    },
    CompileError {
        error: String,
    },
}

impl ServerMessage {
    fn into_result(self) -> CompileResult {
        match self {
            Self::CompileSuccess {
                pdf,
                compile_time_ms,
                blobs,
            } => match STANDARD.decode(pdf.as_bytes()) {
                Ok(artifact) => CompileResult::Success {
                    artifact,
                    elapsed_ms: compile_time_ms.max(0.0).round() as u64,
                    confirmed: blobs.unwrap_or_default(),
                },
                Err(e) => CompileResult::Failure {
                    message: format!("service returned an undecodable pdf: {e}"),
                },
            },
            Self::CompileError { error } => CompileResult::Failure { message: error },
        }
    }
}

/// Parse an inbound text frame.
///
/// Returns `None` for frames that are not compile results (unknown `type`,
/// not JSON); those are ignored by the caller. A compile result with
/// malformed fields still resolves as a failure so the pending sync is
/// released.
pub fn parse_server_message(text: &str) -> Option<CompileResult> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let kind = value.get("type")?.as_str()?;
    if !matches!(kind, "compile_success" | "compile_error") {
        return None;
    }

    let kind = kind.to_string();
    Some(match serde_json::from_value::<ServerMessage>(value) {
        Ok(msg) => msg.into_result(),
        Err(e) => CompileResult::Failure {
            message: format!("malformed {kind} message: {e}"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_payload_wire_shape() {
        let payload = SyncPayload {
            main: "main.tex".into(),
            files: BTreeMap::from([
                ("main.tex".into(), FileEntry::Inline("\\relax".into())),
                ("figure.png".into(), FileEntry::InlineBinary(vec![1, 2, 3])),
                ("logo.png".into(), FileEntry::Reference("abc123".into())),
            ]),
        };

        let value: Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "main": "main.tex",
                "files": {
                    "main.tex": "\\relax",
                    "figure.png": "AQID",
                    "logo.png": { "type": "hash", "value": "abc123" }
                }
            })
        );
    }

    #[test]
    fn test_parse_success() {
        let text = r#"{"type":"compile_success","pdf":"JVBERg==","compile_time_ms":312.4,"blobs":{"figure.png":"abc123"}}"#;
        let result = parse_server_message(text).unwrap();
        assert_eq!(
            result,
            CompileResult::Success {
                artifact: b"%PDF".to_vec(),
                elapsed_ms: 312,
                confirmed: BTreeMap::from([("figure.png".into(), "abc123".into())]),
            }
        );
    }

    #[test]
    fn test_parse_success_without_blobs() {
        let text = r#"{"type":"compile_success","pdf":"","compile_time_ms":5}"#;
        match parse_server_message(text) {
            Some(CompileResult::Success { confirmed, .. }) => assert!(confirmed.is_empty()),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error() {
        let text = r#"{"type":"compile_error","error":"! Undefined control sequence."}"#;
        assert_eq!(
            parse_server_message(text),
            Some(CompileResult::Failure {
                message: "! Undefined control sequence.".into()
            })
        );
    }

    #[test]
    fn test_unknown_messages_are_ignored() {
        assert_eq!(parse_server_message(r#"{"type":"progress","pct":40}"#), None);
        assert_eq!(parse_server_message(r#"{"pdf":"JVBERg=="}"#), None);
        assert_eq!(parse_server_message("not json"), None);
    }

    #[test]
    fn test_malformed_result_still_resolves() {
        let result = parse_server_message(r#"{"type":"compile_success"}"#);
        assert!(matches!(result, Some(CompileResult::Failure { .. })));

        let result = parse_server_message(r#"{"type":"compile_success","pdf":"@@@"}"#);
        assert!(matches!(result, Some(CompileResult::Failure { .. })));
    }
}
