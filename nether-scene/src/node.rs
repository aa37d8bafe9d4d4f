//! Scene-graph nodes and scenes.

use glam::{Mat4, Quat, Vec3};
use serde_json::Value;

use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::Result;
use crate::json::{find_string, float_array, id_array, JsonMap};
use crate::mesh::Mesh;
use crate::skin::Skin;

/// A node in the scene hierarchy. The local transform is either a full
/// matrix or a translation/rotation/scale triple.
#[derive(Debug, Default)]
pub struct Node {
    pub id: String,
    pub name: Option<String>,
    pub children: Vec<Ref<Node>>,
    pub meshes: Vec<Ref<Mesh>>,
    pub matrix: Option<Mat4>,
    pub translation: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    pub skin: Option<Ref<Skin>>,
    pub skeletons: Vec<Ref<Node>>,
    /// Set on nodes that act as skin joints.
    pub joint_name: Option<String>,
    /// Maintained while reading children; used to walk up to the skeleton
    /// root on export.
    pub parent: Option<Ref<Node>>,
}

impl Node {
    fn read_fields(&mut self, this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        for child_id in id_array(obj, "children") {
            let child = doc.get::<Node>(child_id)?;
            doc[child].parent = Some(this);
            self.children.push(child);
        }
        for mesh_id in id_array(obj, "meshes") {
            self.meshes.push(doc.get::<Mesh>(mesh_id)?);
        }

        self.matrix = float_array::<16>(obj, "matrix").map(|m| Mat4::from_cols_array(&m));
        self.translation = float_array::<3>(obj, "translation").map(Vec3::from_array);
        self.rotation =
            float_array::<4>(obj, "rotation").map(|q| Quat::from_xyzw(q[0], q[1], q[2], q[3]));
        self.scale = float_array::<3>(obj, "scale").map(Vec3::from_array);

        if let Some(skin_id) = find_string(obj, "skin") {
            self.skin = Some(doc.get::<Skin>(skin_id)?);
        }
        for skeleton_id in id_array(obj, "skeletons") {
            self.skeletons.push(doc.get::<Node>(skeleton_id)?);
        }
        self.joint_name = find_string(obj, "jointName").map(str::to_owned);
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        if let Some(matrix) = &self.matrix {
            obj.insert(
                "matrix".to_owned(),
                Value::from(matrix.to_cols_array().to_vec()),
            );
        }
        if let Some(translation) = &self.translation {
            obj.insert(
                "translation".to_owned(),
                Value::from(translation.to_array().to_vec()),
            );
        }
        if let Some(rotation) = &self.rotation {
            obj.insert(
                "rotation".to_owned(),
                Value::from(rotation.to_array().to_vec()),
            );
        }
        if let Some(scale) = &self.scale {
            obj.insert("scale".to_owned(), Value::from(scale.to_array().to_vec()));
        }

        write_refs(&mut obj, "children", &self.children, |r| doc[*r].id.clone());
        write_refs(&mut obj, "meshes", &self.meshes, |r| doc[*r].id.clone());
        write_refs(&mut obj, "skeletons", &self.skeletons, |r| doc[*r].id.clone());

        if let Some(skin) = self.skin {
            obj.insert("skin".to_owned(), Value::from(doc[skin].id.clone()));
        }
        if let Some(joint_name) = &self.joint_name {
            obj.insert("jointName".to_owned(), Value::from(joint_name.clone()));
        }
        obj
    }
}

dict_object!(Node, nodes, "nodes");

/// The root object tying a set of nodes together.
#[derive(Debug, Default)]
pub struct Scene {
    pub id: String,
    pub name: Option<String>,
    pub nodes: Vec<Ref<Node>>,
}

impl Scene {
    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()> {
        for node_id in id_array(obj, "nodes") {
            self.nodes.push(doc.get::<Node>(node_id)?);
        }
        Ok(())
    }

    fn write_fields(&self, doc: &Document) -> JsonMap {
        let mut obj = JsonMap::new();
        write_refs(&mut obj, "nodes", &self.nodes, |r| doc[*r].id.clone());
        obj
    }
}

dict_object!(Scene, scenes, "scenes");

/// Emit a non-empty reference list as an array of id strings.
fn write_refs<T>(obj: &mut JsonMap, key: &str, refs: &[Ref<T>], id_of: impl Fn(&Ref<T>) -> String) {
    if refs.is_empty() {
        return;
    }
    let ids: Vec<Value> = refs.iter().map(|r| Value::from(id_of(r))).collect();
    obj.insert(key.to_owned(), Value::from(ids));
}
