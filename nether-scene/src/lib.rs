//! NetherScene asset format (`.ncscene` / `.ncsb`)
//!
//! A NetherScene document pairs a JSON scene manifest with flat binary
//! geometry payloads. The manifest describes typed objects (buffers, buffer
//! views, accessors, meshes, materials, skins, nodes, scenes) by string id;
//! large numeric data (vertex positions, indices, bone weights,
//! inverse-bind matrices) lives in separately addressed byte buffers that
//! the manifest references by offset/length/stride.
//!
//! The same model is traversed in both directions:
//!
//! - **Import**: [`Document::load`] parses the manifest and resolves the
//!   object graph lazily in reference order, starting from the designated
//!   root scene. Typed access into the payload goes through [`Accessor`]s.
//! - **Export**: [`export::SceneExporter`] builds the graph from a host
//!   scene representation, packing vertex data into growable [`Buffer`]s;
//!   [`Document::save`] emits the manifest plus one `<buffer-id>.bin` side
//!   file per buffer.
//!
//! Binary containers carry the manifest and payload in one file; see
//! [`SceneHeader`] for the exact layout.
//!
//! # Example
//!
//! ```no_run
//! use nether_scene::Document;
//!
//! # fn main() -> nether_scene::Result<()> {
//! let doc = Document::load("model.ncscene", false)?;
//! if let Some(scene) = doc.scene {
//!     for &node in &doc[scene].nodes {
//!         println!("root node: {}", doc[node].id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod accessor;
mod buffer;
mod dict;
mod document;
mod error;
pub mod export;
mod format;
mod json;
mod material;
mod mesh;
mod metadata;
mod node;
mod registry;
mod skin;
mod uri;
mod view;
mod writer;

pub use accessor::{Accessor, ComponentType, ElementType, Indexer};
pub use buffer::{Buffer, BufferKind};
pub use dict::{DictObject, LazyDict, Ref};
pub use document::Document;
pub use error::{AssetError, Result};
pub use format::{
    SceneFormat, SceneHeader, BODY_BUFFER_ID, NETHER_SCENE_FORMAT, SCENE_FORMAT_JSON,
};
pub use material::Material;
pub use mesh::{AccessorSlots, Attributes, Mesh, Primitive, PrimitiveMode};
pub use metadata::Metadata;
pub use node::{Node, Scene};
pub use skin::Skin;
pub use view::{BufferView, BufferViewTarget};
pub use writer::AssetWriter;
