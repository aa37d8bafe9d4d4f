//! Host-scene export: builds a document from a generic scene representation.
//!
//! The host hands in a [`SourceScene`] (node hierarchy, triangle meshes,
//! bones). The exporter creates the node graph first so bones can resolve
//! their joint nodes by name, then packs mesh attributes and indices into a
//! shared buffer through freshly created views and accessors, and finally
//! wires skins: per-vertex joint/weight data capped at four influences,
//! inverse-bind matrices, and the skeleton root on the mesh-carrying node.

use glam::Mat4;
use hashbrown::HashMap;

use crate::accessor::{Accessor, ComponentType, ElementType};
use crate::buffer::Buffer;
use crate::dict::{DictObject, Ref};
use crate::document::Document;
use crate::error::{AssetError, Result};
use crate::mesh::{Mesh, Primitive};
use crate::node::{Node, Scene};
use crate::skin::Skin;
use crate::view::{BufferView, BufferViewTarget};

/// Per-vertex influence of one bone.
#[derive(Debug, Clone, Copy)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// A bone feeding the skin exporter: the joint node's name, its offset
/// (inverse-bind) matrix and the vertices it influences.
#[derive(Debug, Clone)]
pub struct SourceBone {
    pub name: String,
    pub offset_matrix: Mat4,
    pub weights: Vec<VertexWeight>,
}

/// Triangle mesh handed in by the host application. `normals`, `texcoords`
/// and `indices` may be empty.
#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub bones: Vec<SourceBone>,
}

/// Node in the host hierarchy; `meshes` holds indices into
/// [`SourceScene::meshes`].
#[derive(Debug, Clone, Default)]
pub struct SourceNode {
    pub name: String,
    pub matrix: Option<Mat4>,
    pub children: Vec<SourceNode>,
    pub meshes: Vec<usize>,
}

/// Scene-graph input for [`SceneExporter`].
#[derive(Debug, Clone, Default)]
pub struct SourceScene {
    pub name: String,
    pub roots: Vec<SourceNode>,
    pub meshes: Vec<SourceMesh>,
}

/// Influences kept per vertex; extra contributions are dropped in arrival
/// order, without reordering or renormalization.
pub const MAX_VERTEX_INFLUENCES: usize = 4;

/// Builds document objects from a [`SourceScene`].
pub struct SceneExporter<'a> {
    doc: &'a mut Document,
    buffer: Ref<Buffer>,
    roots: Vec<Ref<Node>>,
    node_by_name: HashMap<String, Ref<Node>>,
    mesh_refs: Vec<Ref<Mesh>>,
    pending_mesh_links: Vec<(Ref<Node>, Vec<usize>)>,
}

impl<'a> SceneExporter<'a> {
    /// Targets the document's body buffer when there is one, otherwise
    /// creates a fresh buffer named after `buffer_id_base`.
    pub fn new(doc: &'a mut Document, buffer_id_base: &str) -> Result<SceneExporter<'a>> {
        let buffer = match doc.body_buffer() {
            Some(body) => body,
            None => {
                let id = doc.find_unique_id(buffer_id_base, "buffer");
                doc.create::<Buffer>(&id)?
            }
        };
        Ok(SceneExporter {
            doc,
            buffer,
            roots: Vec::new(),
            node_by_name: HashMap::new(),
            mesh_refs: Vec::new(),
            pending_mesh_links: Vec::new(),
        })
    }

    /// Export the whole host scene and make it the document's root scene.
    pub fn export(mut self, src: &SourceScene) -> Result<Ref<Scene>> {
        for root in &src.roots {
            let node = self.export_node(root, None)?;
            self.roots.push(node);
        }

        let has_bones = src.meshes.iter().any(|m| !m.bones.is_empty());
        let skin = if has_bones {
            let id = self.doc.find_unique_id("skin", "skin");
            let skin = self.doc.create::<Skin>(&id)?;
            self.doc[skin].name = Some(id);
            Some(skin)
        } else {
            None
        };

        let mut inverse_bind: Vec<Mat4> = Vec::new();
        for mesh in &src.meshes {
            let r = self.export_mesh(mesh, skin, &mut inverse_bind)?;
            self.mesh_refs.push(r);
        }

        // Mesh handles exist now; wire them into the node graph.
        for (node, mesh_indices) in std::mem::take(&mut self.pending_mesh_links) {
            for index in mesh_indices {
                let mesh = self.mesh_refs.get(index).copied().ok_or_else(|| {
                    AssetError::invalid(format!("node references mesh index {index} out of range"))
                })?;
                self.doc[node].meshes.push(mesh);
            }
        }

        if let Some(skin) = skin {
            self.finish_skin(skin, &inverse_bind)?;
        }

        let scene_id = self.doc.find_unique_id(&src.name, "scene");
        let scene = self.doc.create::<Scene>(&scene_id)?;
        self.doc[scene].nodes = self.roots.clone();
        self.doc.scene = Some(scene);

        tracing::info!(
            scene = %scene_id,
            meshes = self.mesh_refs.len(),
            nodes = self.doc.count_of::<Node>(),
            skinned = has_bones,
            "exported host scene"
        );
        Ok(scene)
    }

    fn export_node(&mut self, src: &SourceNode, parent: Option<Ref<Node>>) -> Result<Ref<Node>> {
        let id = self.doc.find_unique_id(&src.name, "node");
        let node = self.doc.create::<Node>(&id)?;
        self.doc[node].name = Some(src.name.clone());
        self.doc[node].matrix = src.matrix;
        self.doc[node].parent = parent;
        if !src.meshes.is_empty() {
            self.pending_mesh_links.push((node, src.meshes.clone()));
        }
        self.node_by_name.entry(src.name.clone()).or_insert(node);

        for child in &src.children {
            let child_ref = self.export_node(child, Some(node))?;
            self.doc[node].children.push(child_ref);
        }
        Ok(node)
    }

    fn export_mesh(
        &mut self,
        src: &SourceMesh,
        skin: Option<Ref<Skin>>,
        inverse_bind: &mut Vec<Mat4>,
    ) -> Result<Ref<Mesh>> {
        let id = self.doc.find_unique_id(&src.name, "mesh");
        let mesh = self.doc.create::<Mesh>(&id)?;

        let mut prim = Primitive::default();
        if let Some(accessor) = self.export_data(
            &id,
            src.positions.len(),
            bytemuck::cast_slice(&src.positions),
            ElementType::Vec3,
            ComponentType::Float,
            false,
        )? {
            prim.attributes.position.push(Some(accessor));
        }
        if let Some(accessor) = self.export_data(
            &id,
            src.normals.len(),
            bytemuck::cast_slice(&src.normals),
            ElementType::Vec3,
            ComponentType::Float,
            false,
        )? {
            prim.attributes.normal.push(Some(accessor));
        }
        if let Some(accessor) = self.export_data(
            &id,
            src.texcoords.len(),
            bytemuck::cast_slice(&src.texcoords),
            ElementType::Vec2,
            ComponentType::Float,
            false,
        )? {
            prim.attributes.texcoord.push(Some(accessor));
        }
        if !src.indices.is_empty() {
            // Indices go out as unsigned shorts; the format caps a primitive
            // at 64k vertices.
            let short: Vec<u16> = src.indices.iter().map(|&i| i as u16).collect();
            if let Some(accessor) = self.export_data(
                &id,
                short.len(),
                bytemuck::cast_slice(&short),
                ElementType::Scalar,
                ComponentType::UnsignedShort,
                true,
            )? {
                prim.indices = Some(accessor);
            }
        }
        self.doc[mesh].primitives.push(prim);

        if let Some(skin) = skin {
            if !src.bones.is_empty() {
                self.export_skin(src, mesh, skin, inverse_bind)?;
            }
        }
        Ok(mesh)
    }

    /// Pack per-vertex joint indices and weights for one mesh into the
    /// skin, accumulating inverse-bind matrices per distinct joint.
    fn export_skin(
        &mut self,
        src: &SourceMesh,
        mesh: Ref<Mesh>,
        skin: Ref<Skin>,
        inverse_bind: &mut Vec<Mat4>,
    ) -> Result<()> {
        let vertex_count = src.positions.len();
        let mut joint_data = vec![[0.0f32; 4]; vertex_count];
        let mut weight_data = vec![[0.0f32; 4]; vertex_count];
        let mut influences = vec![0u8; vertex_count];
        let mut dropped = 0usize;

        for bone in &src.bones {
            let node = *self.node_by_name.get(&bone.name).ok_or_else(|| {
                AssetError::MissingObject {
                    section: Node::SECTION,
                    id: bone.name.clone(),
                }
            })?;
            let node_id = self.doc[node].id.clone();
            self.doc[node].joint_name = Some(node_id);

            // One joint entry per distinct node; the offset matrix is
            // recorded the first time the joint is seen.
            let joint_index = match self.doc[skin].joints.iter().position(|&j| j == node) {
                Some(existing) => existing,
                None => {
                    self.doc[skin].joints.push(node);
                    inverse_bind.push(bone.offset_matrix);
                    inverse_bind.len() - 1
                }
            };

            for w in &bone.weights {
                let vertex = w.vertex as usize;
                if vertex >= vertex_count {
                    continue;
                }
                let used = influences[vertex] as usize;
                if used >= MAX_VERTEX_INFLUENCES {
                    dropped += 1;
                    continue;
                }
                joint_data[vertex][used] = joint_index as f32;
                weight_data[vertex][used] = w.weight;
                influences[vertex] += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                mesh = %src.name,
                dropped,
                "dropped vertex bone influences beyond the per-vertex limit"
            );
        }

        let skin_id = self.doc[skin].id.clone();
        let joint_accessor = self.export_data(
            &skin_id,
            vertex_count,
            bytemuck::cast_slice(&joint_data),
            ElementType::Vec4,
            ComponentType::Float,
            false,
        )?;
        let weight_accessor = self.export_data(
            &skin_id,
            vertex_count,
            bytemuck::cast_slice(&weight_data),
            ElementType::Vec4,
            ComponentType::Float,
            false,
        )?;
        if let Some(prim) = self.doc[mesh].primitives.last_mut() {
            if let Some(accessor) = joint_accessor {
                prim.attributes.joint.push(Some(accessor));
            }
            if let Some(accessor) = weight_accessor {
                prim.attributes.weight.push(Some(accessor));
            }
        }
        Ok(())
    }

    /// Emit the accumulated inverse-bind matrices and attach the skin to the
    /// node carrying the first mesh, with the skeleton rooted at the first
    /// non-joint ancestor.
    fn finish_skin(&mut self, skin: Ref<Skin>, inverse_bind: &[Mat4]) -> Result<()> {
        let skin_id = self.doc[skin].id.clone();
        if let Some(accessor) = self.export_data(
            &skin_id,
            inverse_bind.len(),
            bytemuck::cast_slice(inverse_bind),
            ElementType::Mat4,
            ComponentType::Float,
            false,
        )? {
            self.doc[skin].inverse_bind_matrices = Some(accessor);
        }
        self.doc[skin].bind_shape_matrix = Some(Mat4::IDENTITY);

        let Some(&first_mesh) = self.mesh_refs.first() else {
            return Ok(());
        };
        let Some(mesh_node) = self.find_mesh_node(first_mesh) else {
            return Ok(());
        };
        if let Some(root_joint) = self.find_skeleton_root(skin) {
            self.doc[mesh_node].skeletons.push(root_joint);
        }
        self.doc[mesh_node].skin = Some(skin);
        Ok(())
    }

    fn find_mesh_node(&self, mesh: Ref<Mesh>) -> Option<Ref<Node>> {
        fn walk(doc: &Document, node: Ref<Node>, mesh: Ref<Mesh>) -> Option<Ref<Node>> {
            if doc[node].meshes.contains(&mesh) {
                return Some(node);
            }
            for &child in &doc[node].children {
                if let Some(found) = walk(doc, child, mesh) {
                    return Some(found);
                }
            }
            None
        }
        self.roots.iter().find_map(|&root| walk(self.doc, root, mesh))
    }

    /// Walk up from the first joint until a node without a joint name.
    fn find_skeleton_root(&self, skin: Ref<Skin>) -> Option<Ref<Node>> {
        let mut current = *self.doc[skin].joints.first()?;
        loop {
            match self.doc[current].parent {
                Some(parent) if self.doc[parent].joint_name.is_some() => current = parent,
                Some(parent) => return Some(parent),
                None => return Some(current),
            }
        }
    }

    /// Append `count` tightly packed elements to the export buffer behind a
    /// fresh buffer view + accessor pair with per-component bounds.
    fn export_data(
        &mut self,
        base_id: &str,
        count: usize,
        src: &[u8],
        element_type: ElementType,
        component_type: ComponentType,
        indices: bool,
    ) -> Result<Option<Ref<Accessor>>> {
        if count == 0 || src.is_empty() {
            return Ok(None);
        }
        let elem_size = element_type.components() * component_type.size();
        debug_assert_eq!(src.len(), count * elem_size);

        let offset = {
            let buffer = &mut self.doc[self.buffer];
            let offset = buffer.byte_length();
            buffer.grow(count * elem_size);
            offset
        };

        let view_id = self.doc.find_unique_id(base_id, "view");
        let view = self.doc.create::<BufferView>(&view_id)?;
        {
            let v = &mut self.doc[view];
            v.buffer = Some(self.buffer);
            v.byte_offset = offset;
            v.byte_length = count * elem_size;
            v.target = if indices {
                BufferViewTarget::ElementArrayBuffer
            } else {
                BufferViewTarget::ArrayBuffer
            };
        }

        let accessor_id = self.doc.find_unique_id(base_id, "accessor");
        let accessor = self.doc.create::<Accessor>(&accessor_id)?;
        let (min, max) = component_bounds(src, count, element_type.components(), component_type);
        {
            let a = &mut self.doc[accessor];
            a.buffer_view = Some(view);
            a.byte_offset = 0;
            a.byte_stride = 0;
            a.component_type = component_type;
            a.element_type = element_type;
            a.count = count;
            a.min = min;
            a.max = max;
        }

        self.doc.write_accessor(accessor, count, src, elem_size)?;
        Ok(Some(accessor))
    }
}

/// Per-component min/max over tightly packed source elements.
fn component_bounds(
    src: &[u8],
    count: usize,
    components: usize,
    component_type: ComponentType,
) -> (Vec<f64>, Vec<f64>) {
    let read = |index: usize| -> f64 {
        let at = index * component_type.size();
        match component_type {
            ComponentType::Float => bytemuck::pod_read_unaligned::<f32>(&src[at..at + 4]) as f64,
            ComponentType::UnsignedInt => {
                bytemuck::pod_read_unaligned::<u32>(&src[at..at + 4]) as f64
            }
            ComponentType::UnsignedShort => {
                bytemuck::pod_read_unaligned::<u16>(&src[at..at + 2]) as f64
            }
            ComponentType::Short => bytemuck::pod_read_unaligned::<i16>(&src[at..at + 2]) as f64,
            ComponentType::UnsignedByte => src[at] as f64,
            ComponentType::Byte => src[at] as i8 as f64,
        }
    };

    let mut min = vec![f64::MAX; components];
    let mut max = vec![f64::MIN; components];
    for element in 0..count {
        for component in 0..components {
            let value = read(element * components + component);
            min[component] = min[component].min(value);
            max[component] = max[component].max(value);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skinned_scene() -> SourceScene {
        SourceScene {
            name: "rig".to_owned(),
            roots: vec![
                SourceNode {
                    name: "armature".to_owned(),
                    children: vec![
                        SourceNode {
                            name: "bone_a".to_owned(),
                            ..Default::default()
                        },
                        SourceNode {
                            name: "bone_b".to_owned(),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
                SourceNode {
                    name: "character".to_owned(),
                    meshes: vec![0],
                    ..Default::default()
                },
            ],
            meshes: vec![SourceMesh {
                name: "body".to_owned(),
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                indices: vec![0, 1, 2],
                bones: vec![
                    SourceBone {
                        name: "bone_a".to_owned(),
                        offset_matrix: Mat4::IDENTITY,
                        weights: vec![
                            VertexWeight { vertex: 0, weight: 0.6 },
                            VertexWeight { vertex: 1, weight: 1.0 },
                        ],
                    },
                    SourceBone {
                        name: "bone_b".to_owned(),
                        offset_matrix: Mat4::from_translation(glam::Vec3::X),
                        weights: vec![VertexWeight { vertex: 0, weight: 0.4 }],
                    },
                ],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_export_builds_scene_graph() {
        let mut doc = Document::new();
        let scene = SceneExporter::new(&mut doc, "rig")
            .unwrap()
            .export(&skinned_scene())
            .unwrap();

        assert_eq!(doc.scene, Some(scene));
        assert_eq!(doc[scene].nodes.len(), 2);
        assert_eq!(doc.count_of::<Node>(), 4);
        assert_eq!(doc.count_of::<Mesh>(), 1);
        assert_eq!(doc.count_of::<Skin>(), 1);

        // The mesh-carrying node got the skin and a skeleton root.
        let character = doc[scene].nodes[1];
        assert!(doc[character].skin.is_some());
        assert_eq!(doc[character].skeletons.len(), 1);
        // Skeleton root is the armature: the first non-joint ancestor.
        let armature = doc[scene].nodes[0];
        assert_eq!(doc[character].skeletons[0], armature);
    }

    #[test]
    fn test_skin_weights_and_joints() {
        let mut doc = Document::new();
        SceneExporter::new(&mut doc, "rig")
            .unwrap()
            .export(&skinned_scene())
            .unwrap();

        let mesh = doc.by_index::<Mesh>(0).unwrap();
        let prim = &doc[mesh].primitives[0];
        let joints = prim.attributes.joint[0].unwrap();
        let weights = prim.attributes.weight[0].unwrap();

        let joint_data: Vec<[f32; 4]> = doc[joints].extract_data(&doc).unwrap();
        let weight_data: Vec<[f32; 4]> = doc[weights].extract_data(&doc).unwrap();

        // Vertex 0: bone_a then bone_b, in arrival order.
        assert_eq!(joint_data[0], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(weight_data[0], [0.6, 0.4, 0.0, 0.0]);
        // Vertex 1: only bone_a.
        assert_eq!(weight_data[1], [1.0, 0.0, 0.0, 0.0]);

        // Two joints, two inverse-bind matrices, identity bind shape.
        let skin = doc.by_index::<Skin>(0).unwrap();
        assert_eq!(doc[skin].joints.len(), 2);
        assert_eq!(doc[skin].bind_shape_matrix, Some(Mat4::IDENTITY));
        let ibm = doc[skin].inverse_bind_matrices.unwrap();
        let matrices: Vec<[f32; 16]> = doc[ibm].extract_data(&doc).unwrap();
        assert_eq!(matrices.len(), 2);
        assert_eq!(matrices[0], Mat4::IDENTITY.to_cols_array());
    }

    #[test]
    fn test_fifth_influence_is_dropped_in_arrival_order() {
        let weights = [0.1f32, 0.2, 0.3, 0.2, 0.2];
        let mut scene = SourceScene {
            name: "over".to_owned(),
            roots: vec![SourceNode {
                name: "root".to_owned(),
                meshes: vec![0],
                ..Default::default()
            }],
            meshes: vec![SourceMesh {
                name: "m".to_owned(),
                positions: vec![[0.0; 3]],
                ..Default::default()
            }],
        };
        for (i, &w) in weights.iter().enumerate() {
            scene.roots[0].children.push(SourceNode {
                name: format!("joint_{i}"),
                ..Default::default()
            });
            scene.meshes[0].bones.push(SourceBone {
                name: format!("joint_{i}"),
                offset_matrix: Mat4::IDENTITY,
                weights: vec![VertexWeight { vertex: 0, weight: w }],
            });
        }

        let mut doc = Document::new();
        SceneExporter::new(&mut doc, "over")
            .unwrap()
            .export(&scene)
            .unwrap();

        let mesh = doc.by_index::<Mesh>(0).unwrap();
        let weights_acc = doc[mesh].primitives[0].attributes.weight[0].unwrap();
        let weight_data: Vec<[f32; 4]> = doc[weights_acc].extract_data(&doc).unwrap();
        // Exactly the first four contributed weights; the fifth is gone.
        assert_eq!(weight_data[0], [0.1, 0.2, 0.3, 0.2]);
    }

    #[test]
    fn test_duplicate_bone_names_share_one_joint() {
        let scene = SourceScene {
            name: "dup".to_owned(),
            roots: vec![SourceNode {
                name: "root".to_owned(),
                meshes: vec![0],
                children: vec![SourceNode {
                    name: "joint".to_owned(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            meshes: vec![SourceMesh {
                name: "m".to_owned(),
                positions: vec![[0.0; 3], [1.0; 3]],
                bones: vec![
                    SourceBone {
                        name: "joint".to_owned(),
                        offset_matrix: Mat4::IDENTITY,
                        weights: vec![VertexWeight { vertex: 0, weight: 1.0 }],
                    },
                    SourceBone {
                        name: "joint".to_owned(),
                        offset_matrix: Mat4::from_translation(glam::Vec3::Y),
                        weights: vec![VertexWeight { vertex: 1, weight: 1.0 }],
                    },
                ],
                ..Default::default()
            }],
        };

        let mut doc = Document::new();
        SceneExporter::new(&mut doc, "dup")
            .unwrap()
            .export(&scene)
            .unwrap();

        let skin = doc.by_index::<Skin>(0).unwrap();
        assert_eq!(doc[skin].joints.len(), 1);
        // The first-seen offset matrix wins.
        let ibm = doc[skin].inverse_bind_matrices.unwrap();
        let matrices: Vec<[f32; 16]> = doc[ibm].extract_data(&doc).unwrap();
        assert_eq!(matrices, vec![Mat4::IDENTITY.to_cols_array()]);
    }

    #[test]
    fn test_accessor_bounds() {
        let scene = SourceScene {
            name: "bounds".to_owned(),
            roots: vec![SourceNode {
                name: "n".to_owned(),
                meshes: vec![0],
                ..Default::default()
            }],
            meshes: vec![SourceMesh {
                name: "m".to_owned(),
                positions: vec![[-1.0, 0.0, 2.0], [3.0, -4.0, 0.5]],
                ..Default::default()
            }],
        };

        let mut doc = Document::new();
        SceneExporter::new(&mut doc, "bounds")
            .unwrap()
            .export(&scene)
            .unwrap();

        let mesh = doc.by_index::<Mesh>(0).unwrap();
        let position = doc[mesh].primitives[0].attributes.position[0].unwrap();
        assert_eq!(doc[position].min, vec![-1.0, -4.0, 0.5]);
        assert_eq!(doc[position].max, vec![3.0, 0.0, 2.0]);
    }
}
