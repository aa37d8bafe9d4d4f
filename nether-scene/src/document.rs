//! The document: dictionaries, id registry and the load flow.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::accessor::Accessor;
use crate::buffer::Buffer;
use crate::dict::{DictObject, LazyDict, Ref};
use crate::error::{AssetError, Result};
use crate::format::{SceneHeader, BODY_BUFFER_ID};
use crate::json::{find_string, JsonMap};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::metadata::Metadata;
use crate::node::{Node, Scene};
use crate::skin::Skin;
use crate::view::BufferView;
use crate::writer::AssetWriter;

/// An in-memory scene document.
///
/// Owns one lazy dictionary per object kind plus the global id registry;
/// every [`Ref`] handed out is an index into one of these dictionaries and
/// stays valid for the document's lifetime.
pub struct Document {
    pub meta: Metadata,
    /// The designated root scene, when the manifest names one.
    pub scene: Option<Ref<Scene>>,

    pub(crate) buffers: LazyDict<Buffer>,
    pub(crate) views: LazyDict<BufferView>,
    pub(crate) accessors: LazyDict<Accessor>,
    pub(crate) meshes: LazyDict<Mesh>,
    pub(crate) materials: LazyDict<Material>,
    pub(crate) skins: LazyDict<Skin>,
    pub(crate) nodes: LazyDict<Node>,
    pub(crate) scenes: LazyDict<Scene>,

    pub(crate) ids: crate::registry::IdRegistry,
    body_buffer: Option<Ref<Buffer>>,
    dir: Option<PathBuf>,
}

impl Document {
    /// An empty document, ready for the export path.
    pub fn new() -> Document {
        Document {
            meta: Metadata::default(),
            scene: None,
            buffers: LazyDict::new(),
            views: LazyDict::new(),
            accessors: LazyDict::new(),
            meshes: LazyDict::new(),
            materials: LazyDict::new(),
            skins: LazyDict::new(),
            nodes: LazyDict::new(),
            scenes: LazyDict::new(),
            ids: crate::registry::IdRegistry::default(),
            body_buffer: None,
            dir: None,
        }
    }

    /// Load a document from a manifest file (`is_binary` false) or a binary
    /// container (`is_binary` true). Buffer `uri`s resolve relative to the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>, is_binary: bool) -> Result<Document> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| AssetError::io("could not open file", path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| AssetError::io("could not stat file", path, e))?
            .len();
        let dir = path.parent().map(Path::to_path_buf);
        Self::load_impl(&mut file, file_len, is_binary, dir, path)
    }

    /// Load a document from in-memory bytes. Relative buffer `uri`s resolve
    /// against the process working directory.
    pub fn from_bytes(bytes: &[u8], is_binary: bool) -> Result<Document> {
        let mut cursor = Cursor::new(bytes);
        Self::load_impl(
            &mut cursor,
            bytes.len() as u64,
            is_binary,
            None,
            Path::new("<memory>"),
        )
    }

    fn load_impl<R: Read + Seek>(
        stream: &mut R,
        stream_len: u64,
        is_binary: bool,
        dir: Option<PathBuf>,
        origin: &Path,
    ) -> Result<Document> {
        let mut doc = Document::new();
        doc.dir = dir;

        let scene_length;
        let mut body: Option<(u64, u64)> = None;
        if is_binary {
            let mut header_bytes = [0u8; SceneHeader::SIZE];
            stream
                .read_exact(&mut header_bytes)
                .map_err(|e| AssetError::io("could not read container header", origin, e))?;
            let header = SceneHeader::parse(&header_bytes)?;
            scene_length = header.scene_length as u64;
            if header.body_length() > 0 {
                body = Some((header.body_offset() as u64, header.body_length() as u64));
            }
        } else {
            scene_length = stream_len;
        }

        // The smallest legal JSON document is "{}".
        if scene_length < 2 {
            return Err(AssetError::invalid("no JSON document contents"));
        }
        // The binary container addresses the manifest with a 32-bit length.
        if scene_length >= u32::MAX as u64 {
            return Err(AssetError::invalid("JSON manifest of 4 GiB or more"));
        }

        let mut scene_data = vec![0u8; scene_length as usize];
        stream
            .read_exact(&mut scene_data)
            .map_err(|e| AssetError::io("could not read manifest", origin, e))?;

        // The body buffer exists before any manifest object is touched, so
        // buffer views can resolve it by its reserved id.
        if body.is_some() {
            let buffer = doc.create::<Buffer>(BODY_BUFFER_ID)?;
            doc[buffer].mark_special();
            doc.body_buffer = Some(buffer);
        }

        let manifest: Value = serde_json::from_slice(&scene_data)
            .map_err(|e| parse_error(&scene_data, e))?;
        let Value::Object(mut root) = manifest else {
            return Err(AssetError::invalid("manifest root must be a JSON object"));
        };

        if let (Some(buffer), Some((offset, length))) = (doc.body_buffer, body) {
            doc[buffer]
                .load_from_stream(stream, length, offset)
                .map_err(|e| AssetError::io("could not read body chunk", origin, e))?;
        }

        doc.meta = Metadata::read(&root);
        if !doc.meta.supported() {
            tracing::warn!(version = %doc.meta.version, "unsupported asset version, leaving document empty");
            return Ok(doc);
        }

        doc.attach_all(&mut root);
        let scene_id = find_string(&root, "scene").map(str::to_owned);
        if let Some(id) = scene_id {
            let scene = doc.get::<Scene>(&id)?;
            doc.scene = Some(scene);
        }
        doc.detach_all();

        tracing::info!(
            origin = %origin.display(),
            nodes = doc.count_of::<Node>(),
            meshes = doc.count_of::<Mesh>(),
            accessors = doc.count_of::<Accessor>(),
            "resolved scene manifest"
        );
        Ok(doc)
    }

    /// Serialize the manifest and buffer side files next to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        AssetWriter::new(self).write_file(path.as_ref())
    }

    /// Resolve `id`, materializing the object from the manifest on first
    /// access. Reading an object may recursively resolve everything it
    /// references, so the graph builds in reference order.
    pub fn get<T: DictObject>(&mut self, id: &str) -> Result<Ref<T>> {
        if let Some(existing) = T::dict(self).lookup(id) {
            return Ok(existing);
        }
        let src = T::dict_mut(self).take_source(id)?;

        // Reserve the slot first: the id is registered and cyclic references
        // resolve to it while the fields are still being read.
        let this = T::dict_mut(self).reserve(id);
        self.ids.insert(id);

        let mut obj = T::new(id);
        if let Some(name) = find_string(&src, "name") {
            obj.set_name(name.to_owned());
        }
        obj.read(this, &src, self)?;
        T::dict_mut(self).fill(this, obj);
        Ok(this)
    }

    /// Allocate a fresh object with no manifest backing (the export path).
    /// Fails with [`AssetError::DuplicateId`] if `id` is used anywhere in
    /// the document, regardless of kind.
    pub fn create<T: DictObject>(&mut self, id: &str) -> Result<Ref<T>> {
        self.ids.reserve(id)?;
        Ok(T::dict_mut(self).reserve(id))
    }

    /// Access an already-materialized object by insertion order.
    pub fn by_index<T: DictObject>(&self, index: usize) -> Option<Ref<T>> {
        (index < T::dict(self).len()).then(|| Ref::new(index))
    }

    /// Number of materialized objects of one kind.
    pub fn count_of<T: DictObject>(&self) -> usize {
        T::dict(self).len()
    }

    /// Search for an id not yet used anywhere in the document.
    pub fn find_unique_id(&self, base: &str, suffix: &str) -> String {
        self.ids.find_unique(base, suffix)
    }

    /// The buffer backed by a binary container's body chunk, when loaded
    /// from one.
    pub fn body_buffer(&self) -> Option<Ref<Buffer>> {
        self.body_buffer
    }

    pub(crate) fn manifest_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn attach_all(&mut self, root: &mut JsonMap) {
        self.buffers.attach(root);
        self.views.attach(root);
        self.accessors.attach(root);
        self.meshes.attach(root);
        self.materials.attach(root);
        self.skins.attach(root);
        self.nodes.attach(root);
        self.scenes.attach(root);
    }

    fn detach_all(&mut self) {
        self.buffers.detach();
        self.views.detach();
        self.accessors.detach();
        self.meshes.detach();
        self.materials.detach();
        self.skins.detach();
        self.nodes.detach();
        self.scenes.detach();
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl<T: DictObject> Index<Ref<T>> for Document {
    type Output = T;

    fn index(&self, r: Ref<T>) -> &T {
        T::dict(self).get(r)
    }
}

impl<T: DictObject> IndexMut<Ref<T>> for Document {
    fn index_mut(&mut self, r: Ref<T>) -> &mut T {
        T::dict_mut(self).get_mut(r)
    }
}

/// Attach a byte offset to a JSON syntax error (serde reports line/column).
fn parse_error(data: &[u8], source: serde_json::Error) -> AssetError {
    let offset = byte_offset_of(data, source.line(), source.column());
    AssetError::Parse { offset, source }
}

fn byte_offset_of(data: &[u8], line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut remaining_newlines = line - 1;
    let mut offset = 0;
    for &byte in data {
        if remaining_newlines == 0 {
            break;
        }
        offset += 1;
        if byte == b'\n' {
            remaining_newlines -= 1;
        }
    }
    offset + column.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_manifest(json: &str) -> Result<Document> {
        Document::from_bytes(json.as_bytes(), false)
    }

    #[test]
    fn test_create_enforces_global_id_uniqueness() {
        let mut doc = Document::new();
        doc.create::<Mesh>("thing").unwrap();
        // Same id in a different dictionary still collides.
        assert!(matches!(
            doc.create::<Buffer>("thing"),
            Err(AssetError::DuplicateId(_))
        ));
        assert!(matches!(
            doc.create::<Mesh>("thing"),
            Err(AssetError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_missing_object_in_attached_section() {
        let result = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["missing"]}},
                "nodes": {}
            }"#,
        );
        assert!(matches!(
            result,
            Err(AssetError::MissingObject { section: "nodes", .. })
        ));
    }

    #[test]
    fn test_missing_section() {
        let result = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["n"]}}
            }"#,
        );
        assert!(matches!(result, Err(AssetError::MissingSection("nodes"))));
    }

    #[test]
    fn test_malformed_object() {
        let result = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": 17}
            }"#,
        );
        assert!(matches!(
            result,
            Err(AssetError::MalformedObject { section: "scenes", .. })
        ));
    }

    #[test]
    fn test_parse_error_carries_offset() {
        let result = load_manifest("{\n  \"asset\": nope\n}");
        match result {
            Err(AssetError::Parse { offset, .. }) => assert!(offset > 0),
            Err(other) => panic!("expected parse error, got {other:?}"),
            Ok(_) => panic!("expected parse error, got a document"),
        }
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            load_manifest("[1, 2]"),
            Err(AssetError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_too_short_manifest() {
        assert!(matches!(
            load_manifest("x"),
            Err(AssetError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_unsupported_version_loads_empty() {
        let doc = load_manifest(
            r#"{
                "asset": {"version": "2.0"},
                "scene": "main",
                "scenes": {"main": {}}
            }"#,
        )
        .unwrap();
        assert!(doc.scene.is_none());
        assert_eq!(doc.count_of::<Scene>(), 0);
    }

    #[test]
    fn test_lazy_resolution_in_reference_order() {
        let doc = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["root"]}},
                "nodes": {
                    "root": {"children": ["child"]},
                    "child": {},
                    "never_referenced": {}
                }
            }"#,
        )
        .unwrap();
        // Only referenced objects materialize.
        assert_eq!(doc.count_of::<Node>(), 2);
        let root = doc.by_index::<Node>(0).unwrap();
        let child = doc[root].children[0];
        assert_eq!(doc[child].parent, Some(root));
    }

    #[test]
    fn test_texcoord_slot_population() {
        let doc = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["n"]}},
                "nodes": {"n": {"meshes": ["m"]}},
                "meshes": {"m": {"primitives": [{
                    "mode": 4,
                    "attributes": {"TEXCOORD_1": "t", "BINORMAL": "t", "COLOR": 5}
                }]}},
                "accessors": {"t": {"componentType": 5126, "count": 0, "type": "VEC2"}}
            }"#,
        )
        .unwrap();
        let mesh = doc.by_index::<Mesh>(0).unwrap();
        let texcoord = &doc[mesh].primitives[0].attributes.texcoord;
        assert_eq!(texcoord.len(), 2);
        assert!(texcoord[0].is_none());
        assert!(texcoord[1].is_some());
        // Unknown semantic and non-string value were skipped silently.
        assert!(doc[mesh].primitives[0].attributes.color.is_empty());
    }

    #[test]
    fn test_base64_length_mismatch_fails() {
        // "AAECAw==" decodes to 4 bytes, the manifest claims 5.
        let result = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["n"]}},
                "nodes": {"n": {"meshes": ["m"]}},
                "meshes": {"m": {"primitives": [{"attributes": {"POSITION": "a"}}]}},
                "accessors": {"a": {"bufferView": "v", "componentType": 5121, "count": 4, "type": "SCALAR"}},
                "bufferViews": {"v": {"buffer": "b", "byteOffset": 0, "byteLength": 4}},
                "buffers": {"b": {"byteLength": 5, "uri": "data:application/octet-stream;base64,AAECAw=="}}
            }"#,
        );
        assert!(matches!(result, Err(AssetError::InvalidDocument(_))));
    }

    #[test]
    fn test_inline_base64_buffer_roundtrip() {
        let doc = load_manifest(
            r#"{
                "asset": {"version": "1.0"},
                "scene": "main",
                "scenes": {"main": {"nodes": ["n"]}},
                "nodes": {"n": {"meshes": ["m"]}},
                "meshes": {"m": {"primitives": [{"attributes": {"POSITION": "a"}}]}},
                "accessors": {"a": {"bufferView": "v", "componentType": 5121, "count": 4, "type": "SCALAR"}},
                "bufferViews": {"v": {"buffer": "b", "byteOffset": 0, "byteLength": 4}},
                "buffers": {"b": {"byteLength": 4, "uri": "data:application/octet-stream;base64,AAECAw=="}}
            }"#,
        )
        .unwrap();
        let accessor = doc.by_index::<Accessor>(0).unwrap();
        let data: Vec<u8> = doc[accessor].extract_data(&doc).unwrap();
        assert_eq!(data, vec![0, 1, 2, 3]);
    }
}
