//! Skins: joint lists and inverse-bind matrices.

use glam::Mat4;
use serde_json::Value;

use crate::accessor::Accessor;
use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::Result;
use crate::json::{find_string, float_array, id_array, JsonMap};
use crate::node::Node;

/// Joint bindings for a skinned mesh.
///
/// A joint's position in `joints` is the joint index vertex joint-index
/// accessors refer to; `inverse_bind_matrices` carries one MAT4 per joint in
/// the same order.
#[derive(Debug, Default)]
pub struct Skin {
    pub id: String,
    pub name: Option<String>,
    pub bind_shape_matrix: Option<Mat4>,
    pub inverse_bind_matrices: Option<Ref<Accessor>>,
    pub joints: Vec<Ref<Node>>,
}

impl Skin {
    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        self.bind_shape_matrix =
            float_array::<16>(obj, "bindShapeMatrix").map(|m| Mat4::from_cols_array(&m));
        if let Some(accessor_id) = find_string(obj, "inverseBindMatrices") {
            self.inverse_bind_matrices = Some(doc.get::<Accessor>(accessor_id)?);
        }
        for joint_id in id_array(obj, "jointNames") {
            self.joints.push(doc.get::<Node>(joint_id)?);
        }
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();

        let joint_names: Vec<Value> = self
            .joints
            .iter()
            .map(|&j| {
                let node = &doc[j];
                Value::from(node.joint_name.clone().unwrap_or_else(|| node.id.clone()))
            })
            .collect();
        obj.insert("jointNames".to_owned(), Value::from(joint_names));

        if let Some(matrix) = &self.bind_shape_matrix {
            obj.insert(
                "bindShapeMatrix".to_owned(),
                Value::from(matrix.to_cols_array().to_vec()),
            );
        }
        if let Some(accessor) = self.inverse_bind_matrices {
            obj.insert(
                "inverseBindMatrices".to_owned(),
                Value::from(doc[accessor].id.clone()),
            );
        }
        obj
    }
}

dict_object!(Skin, skins, "skins");
