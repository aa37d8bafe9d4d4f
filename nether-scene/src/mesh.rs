//! Meshes, primitives and attribute resolution.
//!
//! Primitive attribute keys are matched by semantic prefix; a trailing
//! `_<N>` suffix selects the N-th slot of that semantic's accessor list
//! (`TEXCOORD_1` is the second texture-coordinate set). Slots populate
//! sparsely: a list may hold `None` below its highest written index.

use serde_json::Value;

use crate::accessor::Accessor;
use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::Result;
use crate::json::{find_array, find_object, find_string, JsonMap};
use crate::material::Material;

/// Ordered accessor slots for one attribute semantic.
pub type AccessorSlots = Vec<Option<Ref<Accessor>>>;

/// Draw mode of a primitive. Codes are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl PrimitiveMode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u64) -> Option<PrimitiveMode> {
        match code {
            0 => Some(PrimitiveMode::Points),
            1 => Some(PrimitiveMode::Lines),
            2 => Some(PrimitiveMode::LineLoop),
            3 => Some(PrimitiveMode::LineStrip),
            4 => Some(PrimitiveMode::Triangles),
            5 => Some(PrimitiveMode::TriangleStrip),
            6 => Some(PrimitiveMode::TriangleFan),
            _ => None,
        }
    }
}

/// Per-semantic accessor slots of one primitive.
#[derive(Debug, Default)]
pub struct Attributes {
    pub position: AccessorSlots,
    pub normal: AccessorSlots,
    pub texcoord: AccessorSlots,
    pub color: AccessorSlots,
    pub joint: AccessorSlots,
    pub jointmatrix: AccessorSlots,
    pub weight: AccessorSlots,
}

/// One draw call's worth of geometry.
#[derive(Debug, Default)]
pub struct Primitive {
    pub mode: PrimitiveMode,
    pub attributes: Attributes,
    pub indices: Option<Ref<Accessor>>,
    pub material: Option<Ref<Material>>,
}

/// A set of primitives drawn together.
#[derive(Debug, Default)]
pub struct Mesh {
    pub id: String,
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// Known semantic prefixes, longest first so JOINTMATRIX does not land in
/// the JOINT slots.
const SEMANTIC_PREFIXES: [&str; 7] = [
    "JOINTMATRIX",
    "POSITION",
    "TEXCOORD",
    "NORMAL",
    "WEIGHT",
    "COLOR",
    "JOINT",
];

/// Split an attribute key into its semantic's slot list and slot index.
fn semantic_slots<'a>(attrs: &'a mut Attributes, key: &str) -> Option<(&'a mut AccessorSlots, usize)> {
    let prefix = SEMANTIC_PREFIXES.iter().find(|p| key.starts_with(**p))?;
    let rest = &key[prefix.len()..];
    let slot = rest
        .strip_prefix('_')
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let list = match *prefix {
        "POSITION" => &mut attrs.position,
        "NORMAL" => &mut attrs.normal,
        "TEXCOORD" => &mut attrs.texcoord,
        "COLOR" => &mut attrs.color,
        "JOINT" => &mut attrs.joint,
        "JOINTMATRIX" => &mut attrs.jointmatrix,
        "WEIGHT" => &mut attrs.weight,
        _ => unreachable!(),
    };
    Some((list, slot))
}

impl Mesh {
    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        let Some(primitives) = find_array(obj, "primitives") else {
            return Ok(());
        };
        for value in primitives {
            let Some(prim_obj) = value.as_object() else {
                continue;
            };
            let mut prim = Primitive {
                mode: prim_obj
                    .get("mode")
                    .and_then(Value::as_u64)
                    .and_then(PrimitiveMode::from_code)
                    .unwrap_or_default(),
                ..Default::default()
            };

            if let Some(attrs) = find_object(prim_obj, "attributes") {
                for (key, value) in attrs {
                    // Unknown semantics and non-string values degrade to a
                    // skipped attribute, not a failed load.
                    let Some(accessor_id) = value.as_str() else {
                        tracing::warn!(attribute = %key, "skipping non-string attribute value");
                        continue;
                    };
                    let Some((slots, index)) = semantic_slots(&mut prim.attributes, key) else {
                        tracing::warn!(attribute = %key, "skipping unknown attribute semantic");
                        continue;
                    };
                    let accessor = doc.get::<Accessor>(accessor_id)?;
                    if slots.len() <= index {
                        slots.resize(index + 1, None);
                    }
                    slots[index] = Some(accessor);
                }
            }

            if let Some(indices_id) = find_string(prim_obj, "indices") {
                prim.indices = Some(doc.get::<Accessor>(indices_id)?);
            }
            if let Some(material_id) = find_string(prim_obj, "material") {
                prim.material = Some(doc.get::<Material>(material_id)?);
            }
            self.primitives.push(prim);
        }
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        let mut primitives = Vec::with_capacity(self.primitives.len());
        for prim in &self.primitives {
            let mut prim_obj = JsonMap::new();
            prim_obj.insert("mode".to_owned(), Value::from(prim.mode.code()));
            if let Some(material) = prim.material {
                prim_obj.insert("material".to_owned(), Value::from(doc[material].id.clone()));
            }
            if let Some(indices) = prim.indices {
                prim_obj.insert("indices".to_owned(), Value::from(doc[indices].id.clone()));
            }

            let mut attrs = JsonMap::new();
            write_attrs(doc, &mut attrs, &prim.attributes.position, "POSITION", false);
            write_attrs(doc, &mut attrs, &prim.attributes.normal, "NORMAL", false);
            write_attrs(doc, &mut attrs, &prim.attributes.texcoord, "TEXCOORD", true);
            write_attrs(doc, &mut attrs, &prim.attributes.color, "COLOR", false);
            write_attrs(doc, &mut attrs, &prim.attributes.joint, "JOINT", false);
            write_attrs(
                doc,
                &mut attrs,
                &prim.attributes.jointmatrix,
                "JOINTMATRIX",
                false,
            );
            write_attrs(doc, &mut attrs, &prim.attributes.weight, "WEIGHT", false);
            prim_obj.insert("attributes".to_owned(), Value::Object(attrs));

            primitives.push(Value::Object(prim_obj));
        }
        obj.insert("primitives".to_owned(), Value::from(primitives));
        obj
    }
}

dict_object!(Mesh, meshes, "meshes");

/// A single slot-0 accessor writes as the bare semantic; everything else
/// (and texture coordinates always) writes numbered keys.
fn write_attrs(
    doc: &Document,
    attrs: &mut JsonMap,
    slots: &AccessorSlots,
    semantic: &str,
    force_number: bool,
) {
    if slots.iter().all(Option::is_none) {
        return;
    }
    if slots.len() == 1 && !force_number {
        if let Some(accessor) = slots[0] {
            attrs.insert(semantic.to_owned(), Value::from(doc[accessor].id.clone()));
        }
        return;
    }
    for (i, slot) in slots.iter().enumerate() {
        if let Some(accessor) = slot {
            attrs.insert(
                format!("{semantic}_{i}"),
                Value::from(doc[*accessor].id.clone()),
            );
        }
    }
}
