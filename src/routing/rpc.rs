//! JSON-RPC method sniffing for `/rpc` bodies.
//!
//! The default matcher is a tolerant scan for the first `"method": "<name>"`
//! occurrence in the raw bytes, without parsing the document. It can be
//! fooled by a nested or escaped `"method"` key; the `json` matcher parses
//! the body instead and only looks at top-level request objects.

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static METHOD_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""method"\s*:\s*"([^"]*)""#).expect("method pattern is a valid regex")
});

/// How the RPC method name is extracted from the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodMatch {
    /// First `"method"` string value anywhere in the body.
    #[default]
    Pattern,
    /// Strict parse; single requests and batches of request objects.
    Json,
}

/// Default allow-list of state-mutating RPC methods.
pub fn default_write_methods() -> Vec<String> {
    vec![
        "eth_sendRawTransaction".to_string(),
        "eth_sendRawTransactionConditional".to_string(),
        "eth_sendRawTransactionSync".to_string(),
    ]
}

/// Decides whether an RPC body submits a write.
#[derive(Debug, Clone)]
pub struct RpcMethodSniffer {
    write_methods: HashSet<String>,
    mode: MethodMatch,
}

impl RpcMethodSniffer {
    pub fn new(write_methods: impl IntoIterator<Item = String>, mode: MethodMatch) -> Self {
        Self {
            write_methods: write_methods.into_iter().collect(),
            mode,
        }
    }

    /// True if the body names a method from the write allow-list.
    pub fn is_write(&self, body: &[u8]) -> bool {
        match self.mode {
            MethodMatch::Pattern => extract_method(body)
                .map(|m| self.write_methods.contains(m))
                .unwrap_or(false),
            MethodMatch::Json => self.is_write_json(body),
        }
    }

    fn is_write_json(&self, body: &[u8]) -> bool {
        let method_of = |v: &Value| v.get("method").and_then(Value::as_str).map(str::to_owned);
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Array(batch)) => batch
                .iter()
                .filter_map(method_of)
                .any(|m| self.write_methods.contains(&m)),
            Ok(request @ Value::Object(_)) => method_of(&request)
                .map(|m| self.write_methods.contains(&m))
                .unwrap_or(false),
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(error = %e, "RPC body is not valid JSON");
                false
            }
        }
    }
}

/// First `"method"` string value in the body, if any.
pub fn extract_method(body: &[u8]) -> Option<&str> {
    let captures = METHOD_FIELD.captures(body)?;
    std::str::from_utf8(captures.get(1)?.as_bytes()).ok()
}
