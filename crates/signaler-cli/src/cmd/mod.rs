pub mod classify;
pub mod invoke;
pub mod lambda;
pub mod simulate;
pub mod token;

use anyhow::Context;
use serde_json::Value;
use std::path::Path;

pub(crate) fn read_event(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}
