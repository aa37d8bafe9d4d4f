//! Hand-built binary containers: header + manifest + body chunk.

use nether_scene::{Buffer, Document, Mesh, SceneHeader, BODY_BUFFER_ID, NETHER_SCENE_FORMAT};

const MANIFEST: &str = r#"{
    "asset": {"version": "1.0"},
    "scene": "main",
    "scenes": {"main": {"nodes": ["n"]}},
    "nodes": {"n": {"meshes": ["m"]}},
    "meshes": {"m": {"primitives": [{
        "mode": 4,
        "attributes": {"POSITION": "positions"}
    }]}},
    "accessors": {"positions": {
        "bufferView": "v",
        "byteOffset": 0,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3"
    }},
    "bufferViews": {"v": {"buffer": "binary_body", "byteOffset": 0, "byteLength": 36}}
}"#;

fn container(manifest: &str, body: &[u8]) -> Vec<u8> {
    let file_length = SceneHeader::SIZE + manifest.len() + body.len();
    let header = SceneHeader::new(file_length as u32, manifest.len() as u32);
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(manifest.as_bytes());
    bytes.extend_from_slice(body);
    bytes
}

#[test]
fn body_chunk_feeds_accessors() {
    let positions = [
        [0.0f32, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let body = bytemuck::cast_slice::<[f32; 3], u8>(&positions);
    let bytes = container(MANIFEST, body);

    let doc = Document::from_bytes(&bytes, true).unwrap();

    let body_buffer = doc.body_buffer().expect("body buffer registered");
    assert_eq!(doc[body_buffer].id, BODY_BUFFER_ID);
    assert!(doc[body_buffer].is_special());
    assert_eq!(doc[body_buffer].raw_bytes(), body);

    let mesh = doc.by_index::<Mesh>(0).unwrap();
    let accessor = doc[mesh].primitives[0].attributes.position[0].unwrap();
    let out: Vec<[f32; 3]> = doc[accessor].extract_data(&doc).unwrap();
    assert_eq!(out, positions.to_vec());
}

#[test]
fn container_without_body_loads() {
    let manifest = r#"{"asset": {"version": "1.0"}}"#;
    let bytes = container(manifest, &[]);
    let doc = Document::from_bytes(&bytes, true).unwrap();
    assert!(doc.body_buffer().is_none());
    assert_eq!(doc.count_of::<Buffer>(), 0);
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = container(r#"{"asset": {"version": "1.0"}}"#, &[]);
    bytes[0..4].copy_from_slice(b"QUAD");
    assert!(Document::from_bytes(&bytes, true).is_err());
}

#[test]
fn truncated_manifest_is_rejected() {
    let bytes = container(r#"{"asset": {"version": "1.0"}}"#, &[]);
    // Chop the container mid-manifest.
    assert!(Document::from_bytes(&bytes[..bytes.len() - 4], true).is_err());
}

#[test]
fn header_constants_are_stable() {
    assert_eq!(NETHER_SCENE_FORMAT.magic, b"NSCN");
    assert_eq!(NETHER_SCENE_FORMAT.extension, "ncscene");
    assert_eq!(NETHER_SCENE_FORMAT.binary_extension, "ncsb");
    assert_eq!(SceneHeader::SIZE, 20);
}

#[test]
fn deep_accessor_reaches_decoded_region() {
    // A region marked over the body buffer redirects accessor reads while
    // the raw arena keeps the encoded bytes.
    let positions = [[0.0f32; 3]; 3];
    let body = bytemuck::cast_slice::<[f32; 3], u8>(&positions);
    let bytes = container(MANIFEST, body);
    let mut doc = Document::from_bytes(&bytes, true).unwrap();

    let decoded_positions = [
        [9.0f32, 0.0, 0.0],
        [0.0, 9.0, 0.0],
        [0.0, 0.0, 9.0],
    ];
    let decoded = bytemuck::cast_slice::<[f32; 3], u8>(&decoded_positions).to_vec();

    let buffer = doc.body_buffer().unwrap();
    doc[buffer]
        .mark_decoded_region(0, 36, decoded, "m")
        .unwrap();
    doc[buffer].set_current_region("m").unwrap();

    let mesh = doc.by_index::<Mesh>(0).unwrap();
    let accessor = doc[mesh].primitives[0].attributes.position[0].unwrap();
    let out: Vec<[f32; 3]> = doc[accessor].extract_data(&doc).unwrap();
    assert_eq!(out, decoded_positions.to_vec());
}
