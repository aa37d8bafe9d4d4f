//! Manifest + binary payload serialization.

use std::path::Path;

use serde_json::Value;

use crate::accessor::Accessor;
use crate::buffer::Buffer;
use crate::dict::DictObject;
use crate::document::Document;
use crate::error::{AssetError, Result};
use crate::json::JsonMap;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::node::{Node, Scene};
use crate::skin::Skin;
use crate::view::BufferView;

/// Serializes every live (materialized) object of a document back into a
/// manifest tree, then flushes manifest and buffer contents to disk.
pub struct AssetWriter<'a> {
    doc: &'a Document,
    root: JsonMap,
}

impl<'a> AssetWriter<'a> {
    /// Build the manifest tree for `doc`.
    pub fn new(doc: &'a Document) -> AssetWriter<'a> {
        let mut root = JsonMap::new();

        write_section::<Buffer>(&mut root, doc);
        write_section::<BufferView>(&mut root, doc);
        write_section::<Accessor>(&mut root, doc);
        write_section::<Mesh>(&mut root, doc);
        write_section::<Material>(&mut root, doc);
        write_section::<Skin>(&mut root, doc);
        write_section::<Node>(&mut root, doc);
        write_section::<Scene>(&mut root, doc);

        root.insert("asset".to_owned(), Value::Object(doc.meta.write()));
        if let Some(scene) = doc.scene {
            root.insert("scene".to_owned(), Value::from(doc[scene].id.clone()));
        }

        AssetWriter { doc, root }
    }

    /// The manifest as pretty-printed JSON.
    pub fn manifest_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root).map_err(AssetError::Serialization)
    }

    /// Write the manifest to `path` and every buffer's bytes to a sibling
    /// side file named `<buffer-id>.bin`.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let manifest = self.manifest_json()?;
        std::fs::write(path, manifest)
            .map_err(|e| AssetError::io("could not open output file", path, e))?;

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        for buffer in Buffer::dict(self.doc).iter() {
            let bin_path = dir.join(buffer.uri());
            std::fs::write(&bin_path, buffer.raw_bytes())
                .map_err(|e| AssetError::io("could not write buffer file", &bin_path, e))?;
            tracing::debug!(buffer = %buffer.id, bytes = buffer.raw_bytes().len(), "wrote buffer side file");
        }
        tracing::info!(path = %path.display(), "wrote scene manifest");
        Ok(())
    }
}

/// Dump one dictionary's objects under its section name. Empty dictionaries
/// are omitted entirely.
fn write_section<T: DictObject>(root: &mut JsonMap, doc: &Document) {
    let dict = T::dict(doc);
    if dict.is_empty() {
        return;
    }
    let mut section = JsonMap::new();
    for obj in dict.iter() {
        let mut value = obj.write(doc);
        if let Some(name) = obj.name() {
            value.insert("name".to_owned(), Value::from(name));
        }
        section.insert(obj.id().to_owned(), Value::Object(value));
    }
    root.insert(T::SECTION.to_owned(), Value::Object(section));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_shape() {
        let mut doc = Document::new();
        let buffer = doc.create::<Buffer>("geo").unwrap();
        doc[buffer].append_data(&[1, 2, 3, 4]);
        let scene = doc.create::<Scene>("main").unwrap();
        doc.scene = Some(scene);

        let writer = AssetWriter::new(&doc);
        let json = writer.manifest_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["scene"], "main");
        assert_eq!(value["asset"]["version"], "1.0");
        assert_eq!(value["buffers"]["geo"]["byteLength"], 4);
        assert_eq!(value["buffers"]["geo"]["uri"], "geo.bin");
        // No meshes were created; the section must be absent, not empty.
        assert!(value.get("meshes").is_none());
    }
}
