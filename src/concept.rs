//! Image concept extraction: turn an image of educational content into a
//! text query the resolution pipeline can route.
//!
//! Failure never propagates. An unreadable file or a failed oracle call
//! yields a fixed sentinel string, so an image-only request still runs the
//! full pipeline with something to match on.

use std::path::Path;

use tracing::warn;

use crate::oracle::Oracle;

/// Sentinel concept text used when the image cannot be analyzed.
pub const ANALYSIS_FALLBACK: &str = "Image could not be analyzed - please try a text query instead";

/// Guess a MIME type from the file extension, defaulting to PNG.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Read an image and ask the oracle for the learning concept it shows.
pub async fn extract_concept(oracle: &dyn Oracle, path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read image");
            return ANALYSIS_FALLBACK.to_string();
        }
    };

    match oracle.describe_image(&bytes, guess_mime(path)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "image analysis failed");
            ANALYSIS_FALLBACK.to_string()
        }
    }
}

/// Join the user's query with the extracted concept; either may stand alone.
pub fn compose_query(query: &str, concept: &str) -> String {
    if query.is_empty() {
        concept.to_string()
    } else {
        format!("{} - {}", query, concept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    struct BrokenOracle;

    #[async_trait]
    impl Oracle for BrokenOracle {
        async fn classify_course(&self, _: &str, _: &[String]) -> Result<String> {
            bail!("down")
        }
        async fn classify_modules(&self, _: &str, _: &[String]) -> Result<String> {
            bail!("down")
        }
        async fn classify_resources(&self, _: &str, _: &[String], _: &str, _: &str) -> Result<String> {
            bail!("down")
        }
        async fn describe_image(&self, _: &[u8], _: &str) -> Result<String> {
            bail!("down")
        }
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a/diagram.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("scan.webp")), "image/webp");
        assert_eq!(guess_mime(Path::new("whiteboard")), "image/png");
    }

    #[test]
    fn test_compose_query_separator() {
        assert_eq!(compose_query("matrices", "orthogonal vectors"), "matrices - orthogonal vectors");
        assert_eq!(compose_query("", "orthogonal vectors"), "orthogonal vectors");
    }

    #[tokio::test]
    async fn test_missing_file_yields_sentinel() {
        let concept = extract_concept(&BrokenOracle, Path::new("/nonexistent/img.png")).await;
        assert_eq!(concept, ANALYSIS_FALLBACK);
    }

    #[tokio::test]
    async fn test_oracle_failure_yields_sentinel() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"\x89PNG\r\n").unwrap();
        let concept = extract_concept(&BrokenOracle, file.path()).await;
        assert_eq!(concept, ANALYSIS_FALLBACK);
    }
}
