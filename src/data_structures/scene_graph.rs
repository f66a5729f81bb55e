//! Imported scene representation.
//!
//! Importers translate their file format into a [`SceneGraph`]: an owned arena
//! of nodes that reference meshes by index and children by [`NodeId`]. Nothing
//! in here touches the GPU; turning the graph into drawable meshes happens in
//! [`crate::data_structures::model`].

use cgmath::{InnerSpace, Vector3};

use crate::data_structures::texture::TextureKind;

/// Index of a node in its [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    /// Indices into [`SceneGraph::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<NodeId>,
}

/// A triangle mesh as the importer produced it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First UV channel only.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub faces: Vec<[u32; 3]>,
    /// Index into [`SceneGraph::materials`].
    pub material: Option<usize>,
}

impl ImportedMesh {
    /// Fill in smooth per-vertex normals from the faces.
    ///
    /// Each face contributes its unnormalized normal, so larger faces weigh
    /// more. Vertices no face touches (or only degenerate ones) get `+Z`.
    pub fn generate_smooth_normals(&mut self) {
        let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); self.positions.len()];
        for face in &self.faces {
            let [a, b, c] = face.map(|i| i as usize);
            let (Some(pa), Some(pb), Some(pc)) = (
                self.positions.get(a),
                self.positions.get(b),
                self.positions.get(c),
            ) else {
                continue;
            };
            let (pa, pb, pc): (Vector3<f32>, Vector3<f32>, Vector3<f32>) =
                ((*pa).into(), (*pb).into(), (*pc).into());
            let face_normal = (pb - pa).cross(pc - pa);
            for i in [a, b, c] {
                sums[i] += face_normal;
            }
        }
        let normals = sums
            .into_iter()
            .map(|n| {
                if n.magnitude2() > f32::EPSILON {
                    n.normalize().into()
                } else {
                    [0.0, 0.0, 1.0]
                }
            })
            .collect();
        self.normals = Some(normals);
    }
}

/// Texture references of one material, per slot, in file order.
///
/// A reference is either a path relative to the model file or `*<index>` for
/// an embedded texture.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportedMaterial {
    pub name: String,
    pub diffuse: Vec<String>,
    pub specular: Vec<String>,
    /// Height or bump maps, used as normal maps.
    pub height: Vec<String>,
}

impl ImportedMaterial {
    pub fn slot(&self, kind: TextureKind) -> &[String] {
        match kind {
            TextureKind::Diffuse => &self.diffuse,
            TextureKind::Specular => &self.specular,
            TextureKind::Normal => &self.height,
        }
    }
}

/// Texture data stored inside the model file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmbeddedTexture {
    pub width: u32,
    /// Zero means `data` is a compressed image file (PNG, JPEG, ...).
    pub height: u32,
    pub data: Vec<u8>,
    /// File extension hint for compressed data, e.g. `"png"`.
    pub format_hint: Option<String>,
}

impl EmbeddedTexture {
    pub fn is_compressed(&self) -> bool {
        self.height == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    root: Option<NodeId>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub textures: Vec<EmbeddedTexture>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, meshes: Vec<usize>) -> NodeId {
        self.nodes.push(SceneNode {
            name: name.into(),
            meshes,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` to the children of `parent`. Unknown parents are ignored.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Pre-order walk from the root: a node, then each child subtree in order.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: self.root.into_iter().collect(),
            visited: vec![false; self.nodes.len()],
        }
    }

    /// Mesh indices in the order the walk visits them.
    pub fn mesh_order(&self) -> Vec<usize> {
        self.depth_first()
            .flat_map(|(_, node)| node.meshes.iter().copied())
            .collect()
    }
}

/// Iterator returned by [`SceneGraph::depth_first`].
///
/// Each node is yielded at most once, so malformed graphs with shared or
/// cyclic children still terminate.
pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (NodeId, &'a SceneNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.graph.node(id) else {
                log::warn!("scene references missing node {}", id.0);
                continue;
            };
            if std::mem::replace(&mut self.visited[id.0], true) {
                continue;
            }
            self.stack.extend(node.children.iter().rev().copied());
            return Some((id, node));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SceneGraph {
        // root(0) -> a(1) -> c(3)
        //         -> b(2)
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", vec![0]);
        let a = graph.add_node("a", vec![1, 2]);
        let b = graph.add_node("b", vec![4]);
        let c = graph.add_node("c", vec![3]);
        graph.add_child(root, a);
        graph.add_child(root, b);
        graph.add_child(a, c);
        graph.set_root(root);
        graph
    }

    #[test]
    fn walk_visits_children_in_order_after_their_parent() {
        let graph = tree();
        let names: Vec<_> = graph.depth_first().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "c", "b"]);
        assert_eq!(graph.mesh_order(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn graph_without_root_yields_nothing() {
        let mut graph = SceneGraph::new();
        graph.add_node("orphan", vec![0]);
        assert_eq!(graph.depth_first().count(), 0);
    }

    #[test]
    fn cycles_do_not_hang_the_walk() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node("a", vec![]);
        let b = graph.add_node("b", vec![]);
        graph.add_child(a, b);
        graph.add_child(b, a);
        graph.set_root(a);
        assert_eq!(graph.depth_first().count(), 2);
    }

    #[test]
    fn smooth_normals_point_away_from_a_ccw_face() {
        let mut mesh = ImportedMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [5.0, 5.0, 5.0]],
            faces: vec![[0, 1, 2]],
            ..Default::default()
        };
        mesh.generate_smooth_normals();
        let normals = mesh.normals.unwrap();
        assert_eq!(normals[0], [0.0, 0.0, 1.0]);
        assert_eq!(normals[2], [0.0, 0.0, 1.0]);
        // untouched vertex
        assert_eq!(normals[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn larger_faces_dominate_shared_normals() {
        // A big face in the XY plane and a tiny one in the XZ plane share vertex 0.
        let mut mesh = ImportedMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [10.0, 0.0, 0.0],
                [0.0, 10.0, 0.0],
                [0.0, 0.0, -0.1],
            ],
            faces: vec![[0, 1, 2], [0, 3, 1]],
            ..Default::default()
        };
        mesh.generate_smooth_normals();
        let n = mesh.normals.unwrap()[0];
        assert!(n[2] > 0.99, "{n:?}");
    }

    #[test]
    fn material_slots_map_height_to_normal() {
        let material = ImportedMaterial {
            height: vec!["bump.png".into()],
            ..Default::default()
        };
        assert_eq!(material.slot(TextureKind::Normal), ["bump.png".to_string()]);
        assert!(material.slot(TextureKind::Diffuse).is_empty());
    }
}
