//! Content hashing that does not depend on field or map ordering.

use std::collections::BTreeMap;
use std::hash::Hasher;

use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// FNV-1a 64 over the canonical JSON form of `value`, as 16 hex digits
pub fn hash(value: &impl Serialize) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;

    let mut hasher = fnv::FnvHasher::default();
    hasher.write(canonical.as_bytes());
    Ok(format!("{:016x}", hasher.finish()))
}

/// Hash of the parts of a workload that matter: the spec and the labels.
/// Annotations are left out, so change-cause and correlation ids never count as changes.
pub fn spec_hash(spec: &impl Serialize, labels: &BTreeMap<String, String>) -> Result<String> {
    #[derive(Serialize)]
    struct Projection<'a, S> {
        spec: &'a S,
        labels: &'a BTreeMap<String, String>,
    }
    hash(&Projection { spec, labels })
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(value, out)?;
            }
            out.push('}');
        }
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
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}
