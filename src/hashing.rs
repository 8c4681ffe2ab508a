//! Canonical serialization and content hashing.
//!
//! Every event is reduced to a JSON document with sorted keys, no
//! whitespace, integer epoch-millis timestamps and upper-case enum names,
//! prefixed with a per-kind domain tag. The SHA3-256 of those bytes is the
//! event's identity on both ledgers.

use crate::core::{to_millis, ContentHash, Error, Result};
use crate::crypto::sha3_256_multi;
use crate::events::{AccessDecision, AuditEvent, ComplianceEvent, PolicyChange};
use serde_json::{Map, Number, Value};

const DOMAIN_PREFIX: &str = "dual-ledger-audit/v1/";

/// Deterministic event hasher.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalHasher;

impl CanonicalHasher {
    /// Compute the content hash of an event.
    pub fn hash(event: &AuditEvent) -> Result<ContentHash> {
        let bytes = Self::canonical_bytes(event)?;
        Ok(sha3_256_multi(&[bytes.as_slice()]))
    }

    /// Canonical byte form of an event. This is also the ledger payload.
    pub fn canonical_bytes(event: &AuditEvent) -> Result<Vec<u8>> {
        let value = match event {
            AuditEvent::AccessDecision(e) => access_value(e)?,
            AuditEvent::PolicyChange(e) => policy_value(e),
            AuditEvent::ComplianceEvent(e) => compliance_value(e),
        };

        let mut out = format!("{}{}\n", DOMAIN_PREFIX, event.kind());
        write_canonical(&value, &mut out)?;
        Ok(out.into_bytes())
    }

    /// Hash arbitrary JSON content (policy bodies, structured evidence).
    pub fn hash_value(value: &Value) -> Result<ContentHash> {
        let mut out = format!("{}content\n", DOMAIN_PREFIX);
        write_canonical(value, &mut out)?;
        Ok(sha3_256_multi(&[out.as_bytes()]))
    }
}

fn finite_number(field: &str, value: f64) -> Result<Value> {
    // -0.0 and 0.0 are the same score
    let value = if value == 0.0 { 0.0 } else { value };
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| Error::Encoding(format!("{} is not a finite number: {}", field, value)))
}

fn access_value(e: &AccessDecision) -> Result<Value> {
    let mut map = Map::new();
    map.insert("subject_id".into(), Value::String(e.subject_id.clone()));
    map.insert("resource_id".into(), Value::String(e.resource_id.clone()));
    map.insert("action".into(), Value::String(e.action.clone()));
    map.insert(
        "decision".into(),
        e.decision
            .map(|d| Value::String(d.as_str().into()))
            .unwrap_or(Value::Null),
    );
    map.insert("risk_score".into(), finite_number("risk_score", e.risk_score)?);
    map.insert(
        "context".into(),
        Value::Object(e.context.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
    );
    map.insert("timestamp".into(), Value::from(to_millis(&e.timestamp)));
    Ok(Value::Object(map))
}

fn policy_value(e: &PolicyChange) -> Value {
    let mut map = Map::new();
    map.insert("policy_id".into(), Value::String(e.policy_id.clone()));
    map.insert("version".into(), Value::from(e.version));
    map.insert("change_type".into(), Value::String(e.change_type.as_str().into()));
    map.insert("author_id".into(), Value::String(e.author_id.clone()));
    map.insert(
        "previous_hash".into(),
        e.previous_hash
            .as_ref()
            .map(|h| Value::String(h.to_hex()))
            .unwrap_or(Value::Null),
    );
    map.insert("new_hash".into(), Value::String(e.new_hash().to_hex()));
    map.insert("timestamp".into(), Value::from(to_millis(&e.timestamp)));
    Value::Object(map)
}

fn compliance_value(e: &ComplianceEvent) -> Value {
    let mut map = Map::new();
    map.insert("event_type".into(), Value::String(e.event_type.clone()));
    map.insert("regulation".into(), Value::String(e.regulation.as_str().into()));
    map.insert("entity_id".into(), Value::String(e.entity_id.clone()));
    map.insert("compliant".into(), Value::Bool(e.compliant));
    map.insert("evidence_hash".into(), Value::String(e.evidence_hash().to_hex()));
    map.insert("timestamp".into(), Value::from(to_millis(&e.timestamp)));
    Value::Object(map)
}

/// Write a value with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(Error::Encoding(format!("non-finite number {}", n)));
                }
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}
