use std::collections::HashMap;
use std::path::Path;

use crate::error::StartupError;
use crate::types::FallbackSpec;

/// Reads the fallback routes file into subdomain → spec pairs, if one is
/// configured. Each JSON value is either a plain string (`Resolve`) or an
/// object with `hostname`/`ports` (`Proxy`), discriminated by serde's
/// untagged matching on `FallbackSpec`.
pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, FallbackSpec>, StartupError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| StartupError::Config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.json");
        std::fs::write(
            &path,
            r#"{
                "api":  { "hostname": "api.example.com", "ports": [8080, 8443] },
                "docs": "docs.example.com"
            }"#,
        )
        .unwrap();

        let routes = load(&path).unwrap();
        assert_eq!(
            routes["api"],
            FallbackSpec::Proxy {
                hostname: "api.example.com".to_string(),
                ports: vec![8080, 8443],
            }
        );
        assert_eq!(
            routes["docs"],
            FallbackSpec::Resolve("docs.example.com".to_string())
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/nonexistent/fallback.json").unwrap_err();
        assert!(matches!(err, StartupError::Io(_)));
    }
}
