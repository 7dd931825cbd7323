//! Spec file loading: file read plus YAML decoding into the value model.
//!
//! JSON documents load through the same path, being a YAML subset.

use std::fs;
use std::path::Path;

use specrun_types::{ConvertError, Value, json_to_value};
use thiserror::Error;

/// Failure loading one spec file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Convert {
        path: String,
        #[source]
        source: ConvertError,
    },
}

/// Read and decode one spec file into the generic value model.
pub fn load_spec_file(path: &Path) -> Result<Value, LoadError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let json: serde_json::Value =
        serde_yaml::from_str(&text).map_err(|source| LoadError::Decode {
            path: display.clone(),
            source,
        })?;
    json_to_value(json).map_err(|source| LoadError::Convert {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_spec(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn yaml_documents_decode() {
        let file = write_spec("tests:\n  - command: [echo]\n");
        let value = load_spec_file(file.path()).unwrap();
        let map = value.as_map().unwrap();
        assert!(map.contains_key("tests"));
    }

    #[test]
    fn json_documents_decode_identically() {
        let yaml = load_spec_file(write_spec("tests:\n  - command: [echo]\n").path()).unwrap();
        let json = load_spec_file(write_spec(r#"{"tests": [{"command": ["echo"]}]}"#).path())
            .unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_spec_file(Path::new("/nonexistent/specrun.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_decode_error() {
        let file = write_spec("tests: [unclosed\n");
        let err = load_spec_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn floats_are_a_convert_error() {
        let file = write_spec("tests: [1.5]\n");
        let err = load_spec_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Convert { .. }));
    }
}
