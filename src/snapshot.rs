//! Best-effort debug snapshots of intermediate pipeline results.
//!
//! Snapshots are a debugging aid, not part of the result contract: a failed
//! write logs a warning and the pipeline carries on.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

/// Reduce a query to a filename-safe slug (alphanumerics kept, everything
/// else replaced, capped at 50 characters).
pub fn slug(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(50)
        .collect()
}

/// Write `data` as pretty JSON under `dir`, stamped with the capture time.
pub fn write_json<T: Serialize>(dir: &Path, name: &str, data: &T) {
    let value = match serde_json::to_value(data) {
        Ok(value) => value,
        Err(e) => {
            warn!(name, error = %e, "could not serialize snapshot");
            return;
        }
    };
    let wrapped = serde_json::json!({
        "captured_at": Utc::now().to_rfc3339(),
        "data": value,
    });

    let path = dir.join(name);
    let result = std::fs::create_dir_all(dir).and_then(|_| {
        std::fs::write(
            &path,
            serde_json::to_string_pretty(&wrapped).unwrap_or_default(),
        )
    });
    match result {
        Ok(()) => debug!(path = %path.display(), "wrote snapshot"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not write snapshot"),
    }
}
