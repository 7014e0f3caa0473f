//! Loading JSON payloads and resolving `${...}` placeholders inside them
//!
//! Supported placeholders (inside any JSON string value):
//! - `${sender}`: the deployer address
//! - `${contract:NAME}`: address recorded for `NAME`
//! - `${code_id:NAME}`: code id recorded for `NAME`
//! - `${env:VAR}`: an environment variable
//! - `${now}`, `${now+N}`, `${now-N}`: unix time in seconds, optionally offset
//!
//! A string that consists of exactly one `code_id` or `now` placeholder becomes a
//! JSON number; everything else is substituted textually.

use crate::error::{DeployError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parses a message argument: inline JSON, or `@path` to read a JSON file.
pub fn load_msg(arg: &str) -> Result<Value> {
    load_msg_relative(arg, Path::new("."))
}

/// Like [`load_msg`], resolving relative `@path` arguments against `base`.
pub fn load_msg_relative(arg: &str, base: &Path) -> Result<Value> {
    let arg = arg.trim();
    match arg.strip_prefix('@') {
        Some(file) => {
            let path = base.join(file);
            let contents = fs::read_to_string(&path).map_err(|e| {
                DeployError::Msg(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&contents).map_err(|e| {
                DeployError::Msg(format!("Invalid JSON in {}: {}", path.display(), e))
            })
        }
        None => serde_json::from_str(arg)
            .map_err(|e| DeployError::Msg(format!("Invalid JSON message: {}", e))),
    }
}

/// Values available to placeholders.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    pub sender: String,
    pub addresses: BTreeMap<String, String>,
    pub code_ids: BTreeMap<String, u64>,
    pub now: i64,
}

impl Placeholders {
    pub fn new(sender: impl Into<String>) -> Self {
        Placeholders {
            sender: sender.into(),
            now: chrono::Utc::now().timestamp(),
            ..Default::default()
        }
    }

    /// Resolves every placeholder in `value`, returning a new JSON value.
    pub fn resolve(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_str(s),
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves placeholders in a plain string, e.g. an admin or contract argument.
    pub fn resolve_string(&self, s: &str) -> Result<String> {
        match self.resolve_str(s)? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    fn resolve_str(&self, s: &str) -> Result<Value> {
        if let Some(token) = whole_placeholder(s) {
            if let Some(number) = self.numeric(token)? {
                return Ok(Value::from(number));
            }
        }

        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| DeployError::Msg(format!("Unterminated placeholder in '{}'", s)))?;
            out.push_str(&self.lookup(&after[..end])?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(Value::String(out))
    }

    fn numeric(&self, token: &str) -> Result<Option<i64>> {
        if let Some(name) = token.strip_prefix("code_id:") {
            return self.code_id(name).map(|id| Some(id as i64));
        }
        if token.starts_with("now") {
            return self.now_with_offset(token).map(Some);
        }
        Ok(None)
    }

    fn lookup(&self, token: &str) -> Result<String> {
        let token = token.trim();
        if token == "sender" {
            return Ok(self.sender.clone());
        }
        if token.starts_with("now") {
            return self.now_with_offset(token).map(|t| t.to_string());
        }
        let (kind, arg) = token
            .split_once(':')
            .ok_or_else(|| DeployError::Msg(format!("Unknown placeholder '${{{}}}'", token)))?;
        match kind {
            "contract" => self.addresses.get(arg).cloned().ok_or_else(|| {
                DeployError::Msg(format!("No address recorded for contract '{}'", arg))
            }),
            "code_id" => self.code_id(arg).map(|id| id.to_string()),
            "env" => std::env::var(arg).map_err(|_| {
                DeployError::Msg(format!("Environment variable {} is not set", arg))
            }),
            other => Err(DeployError::Msg(format!(
                "Unknown placeholder kind '{}'",
                other
            ))),
        }
    }

    fn code_id(&self, name: &str) -> Result<u64> {
        self.code_ids
            .get(name)
            .copied()
            .ok_or_else(|| DeployError::Msg(format!("No code id recorded for contract '{}'", name)))
    }

    fn now_with_offset(&self, token: &str) -> Result<i64> {
        let rest = token["now".len()..].trim();
        if rest.is_empty() {
            return Ok(self.now);
        }
        let invalid = || DeployError::Msg(format!("Invalid time offset in '${{{}}}'", token));
        let parse = |digits: &str| {
            digits
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|n| i64::try_from(n).ok())
                .ok_or_else(invalid)
        };
        let shifted = if let Some(digits) = rest.strip_prefix('+') {
            self.now.checked_add(parse(digits)?)
        } else if let Some(digits) = rest.strip_prefix('-') {
            self.now.checked_sub(parse(digits)?)
        } else {
            return Err(DeployError::Msg(format!("Unknown placeholder '${{{}}}'", token)));
        };
        shifted.ok_or_else(invalid)
    }
}

fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains('}') || inner.contains("${") {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn ctx() -> Placeholders {
        let mut p = Placeholders::new("terra1deployer");
        p.now = 1_700_000_000;
        p.addresses.insert("token".into(), "terra1token".into());
        p.code_ids.insert("pair".into(), 12);
        p
    }

    #[test]
    fn test_load_inline_and_file() {
        assert_eq!(load_msg(r#"{"pool":{}}"#).unwrap(), json!({"pool": {}}));

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("init.json"), r#"{"count": 1}"#).unwrap();
        let msg = load_msg_relative("@init.json", dir.path()).unwrap();
        assert_eq!(msg, json!({"count": 1}));

        assert!(load_msg("{broken").is_err());
        assert!(load_msg_relative("@missing.json", dir.path()).is_err());
    }

    #[test]
    fn test_resolve_nested() {
        let msg = json!({
            "register_contracts": {
                "owner": "${sender}",
                "contracts": [["token", "${contract:token}"]],
                "pair_code_id": "${code_id:pair}",
                "memo": "code ${code_id:pair} by ${sender}"
            }
        });
        let resolved = ctx().resolve(&msg).unwrap();
        assert_eq!(
            resolved,
            json!({
                "register_contracts": {
                    "owner": "terra1deployer",
                    "contracts": [["token", "terra1token"]],
                    "pair_code_id": 12,
                    "memo": "code 12 by terra1deployer"
                }
            })
        );
    }

    #[test]
    fn test_time_placeholders() {
        let msg = json!({"from": "${now}", "till": "${now+2592000}", "before": "${now-10}"});
        let resolved = ctx().resolve(&msg).unwrap();
        assert_eq!(
            resolved,
            json!({"from": 1_700_000_000i64, "till": 1_702_592_000i64, "before": 1_699_999_990i64})
        );
    }

    #[test]
    fn test_non_string_values_untouched() {
        let msg = json!({"amount": "1000", "decimals": 6, "mint": null, "flag": true});
        assert_eq!(ctx().resolve(&msg).unwrap(), msg);
    }

    #[test]
    fn test_unknown_and_unresolved_are_errors() {
        let p = ctx();
        assert!(p.resolve(&json!("${contract:nope}")).is_err());
        assert!(p.resolve(&json!("${code_id:nope}")).is_err());
        assert!(p.resolve(&json!("${wat:x}")).is_err());
        assert!(p.resolve(&json!("${sender")).is_err());
        assert!(p.resolve(&json!("${nowish}")).is_err());
    }

    #[test]
    fn test_malformed_time_offsets_are_errors() {
        let p = ctx();
        assert!(matches!(p.resolve(&json!("${now€5}")), Err(DeployError::Msg(_))));
        assert!(matches!(p.resolve(&json!("at ${now€5}")), Err(DeployError::Msg(_))));
        assert!(matches!(
            p.resolve(&json!("${now+9223372036854775807}")),
            Err(DeployError::Msg(_))
        ));
        let mut early = ctx();
        early.now = i64::MIN + 1;
        assert!(matches!(early.resolve(&json!("${now-2}")), Err(DeployError::Msg(_))));
        assert!(p.resolve(&json!("${now+}")).is_err());
        assert!(p.resolve(&json!("${now+-5}")).is_err());
    }

    #[test]
    fn test_env_placeholder() {
        std::env::set_var("WASM_DEPLOYER_TEST_ROUTER", "terra1router");
        let resolved = ctx()
            .resolve(&json!({"router": "${env:WASM_DEPLOYER_TEST_ROUTER}"}))
            .unwrap();
        assert_eq!(resolved, json!({"router": "terra1router"}));
    }

    #[test]
    fn test_resolve_string() {
        assert_eq!(ctx().resolve_string("${sender}").unwrap(), "terra1deployer");
        assert_eq!(ctx().resolve_string("${code_id:pair}").unwrap(), "12");
        assert_eq!(ctx().resolve_string("plain").unwrap(), "plain");
    }
}
