//! Top-level `asset` metadata.

use serde_json::Value;

use crate::json::{find_object, find_string, JsonMap};

/// Document-level metadata from the manifest's `asset` member.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub version: String,
    pub generator: Option<String>,
    pub copyright: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            version: "1.0".to_owned(),
            generator: None,
            copyright: None,
        }
    }
}

impl Metadata {
    pub(crate) fn read(root: &JsonMap) -> Metadata {
        let mut meta = Metadata::default();
        if let Some(asset) = find_object(root, "asset") {
            if let Some(version) = find_string(asset, "version") {
                meta.version = version.to_owned();
            }
            meta.generator = find_string(asset, "generator").map(str::to_owned);
            meta.copyright = find_string(asset, "copyright").map(str::to_owned);
        }
        meta
    }

    /// Only major version 1 documents are readable; anything else makes the
    /// load return an empty document rather than an error.
    pub fn supported(&self) -> bool {
        self.version.split('.').next() == Some("1")
    }

    pub(crate) fn write(&self) -> JsonMap {
        let mut obj = JsonMap::new();
        obj.insert("version".to_owned(), Value::from(self.version.clone()));
        if let Some(generator) = &self.generator {
            obj.insert("generator".to_owned(), Value::from(generator.clone()));
        }
        if let Some(copyright) = &self.copyright {
            obj.insert("copyright".to_owned(), Value::from(copyright.clone()));
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_gate() {
        assert!(Metadata::default().supported());

        let root = json!({"asset": {"version": "1.1", "generator": "nether-export"}});
        let meta = Metadata::read(root.as_object().unwrap());
        assert!(meta.supported());
        assert_eq!(meta.generator.as_deref(), Some("nether-export"));

        let root = json!({"asset": {"version": "2.0"}});
        assert!(!Metadata::read(root.as_object().unwrap()).supported());
    }

    #[test]
    fn test_missing_asset_defaults() {
        let root = json!({});
        let meta = Metadata::read(root.as_object().unwrap());
        assert_eq!(meta.version, "1.0");
        assert!(meta.supported());
    }
}
