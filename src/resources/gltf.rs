//! glTF 2.0 import.
//!
//! Every primitive becomes one [`ImportedMesh`]. Images stored in buffer views
//! become embedded textures referenced as `*<index>`, images with a URI keep
//! the URI as a path relative to the model. Node transforms are not applied.

use std::{collections::HashMap, path::Path};

use crate::{
    data_structures::scene_graph::{
        EmbeddedTexture, ImportedMaterial, ImportedMesh, NodeId, SceneGraph,
    },
    resources::ImportError,
};

/// Parse a `.gltf` or `.glb` file that was read into memory. External buffers
/// are loaded relative to `path`.
pub fn import_gltf(bytes: &[u8], path: &Path) -> Result<SceneGraph, ImportError> {
    let to_error = |source| ImportError::Gltf {
        path: path.to_path_buf(),
        source,
    };
    let ::gltf::Gltf { document, blob } = ::gltf::Gltf::from_slice(bytes).map_err(to_error)?;
    let buffers = ::gltf::import_buffers(&document, path.parent(), blob).map_err(to_error)?;
    let buffer_data = |buffer: ::gltf::Buffer<'_>| buffers.get(buffer.index()).map(|d| &d.0[..]);

    let mut scene = SceneGraph::new();

    // Image index -> texture reference
    let mut image_refs = Vec::new();
    for image in document.images() {
        let reference = match image.source() {
            ::gltf::image::Source::View { view, mime_type } => {
                let start = view.offset();
                let end = start + view.length();
                match buffer_data(view.buffer()).and_then(|data| data.get(start..end)) {
                    Some(data) => {
                        scene.textures.push(EmbeddedTexture {
                            width: 0,
                            height: 0,
                            data: data.to_vec(),
                            format_hint: mime_type.rsplit('/').next().map(str::to_string),
                        });
                        Some(format!("*{}", scene.textures.len() - 1))
                    }
                    None => {
                        log::warn!("{}: image {} points outside its buffer", path.display(), image.index());
                        None
                    }
                }
            }
            ::gltf::image::Source::Uri { uri, .. } => Some(uri_to_reference(uri)),
        };
        image_refs.push(reference);
    }
    let image_ref = |image: ::gltf::Image<'_>| image_refs.get(image.index()).cloned().flatten();

    scene.materials = document
        .materials()
        .map(|material| ImportedMaterial {
            name: material.name().unwrap_or_default().to_string(),
            diffuse: material
                .pbr_metallic_roughness()
                .base_color_texture()
                .and_then(|info| image_ref(info.texture().source()))
                .into_iter()
                .collect(),
            specular: Vec::new(),
            height: material
                .normal_texture()
                .and_then(|normal| image_ref(normal.texture().source()))
                .into_iter()
                .collect(),
        })
        .collect();

    // glTF mesh index -> imported mesh indices, one per triangle primitive
    let mut mesh_map: HashMap<usize, Vec<usize>> = HashMap::new();
    for mesh in document.meshes() {
        let name = mesh.name().unwrap_or("unnamed_mesh");
        for primitive in mesh.primitives() {
            if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                log::warn!(
                    "{}: skipping {:?} primitive of mesh {name:?}",
                    path.display(),
                    primitive.mode()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffer_data(buffer));
            let Some(positions) = reader.read_positions() else {
                log::warn!("{}: primitive of mesh {name:?} has no positions", path.display());
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if indices.len() % 3 != 0 {
                log::warn!("{}: mesh {name:?} has a trailing partial triangle", path.display());
            }
            scene.meshes.push(ImportedMesh {
                name: name.to_string(),
                normals: reader.read_normals().map(|normals| normals.collect()),
                tex_coords: reader.read_tex_coords(0).map(|uvs| uvs.into_f32().collect()),
                faces: indices
                    .chunks_exact(3)
                    .map(|f| [f[0], f[1], f[2]])
                    .collect(),
                material: primitive.material().index(),
                positions,
            });
            mesh_map
                .entry(mesh.index())
                .or_default()
                .push(scene.meshes.len() - 1);
        }
    }

    let Some(gltf_scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return Ok(scene);
    };
    let root = scene.add_node(gltf_scene.name().unwrap_or("scene"), Vec::new());
    scene.set_root(root);
    for node in gltf_scene.nodes() {
        let child = add_node(&mut scene, node, &mesh_map);
        scene.add_child(root, child);
    }
    Ok(scene)
}

/// Relative image URIs are percent-encoded. `data:` URIs are passed through
/// untouched and rejected by the texture loader.
fn uri_to_reference(uri: &str) -> String {
    if uri.starts_with("data:") {
        return uri.to_string();
    }
    match urlencoding::decode(uri) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            log::warn!("image uri {uri:?} is not valid UTF-8 once decoded ({err}), using it as is");
            uri.to_string()
        }
    }
}

fn add_node(
    scene: &mut SceneGraph,
    node: ::gltf::Node<'_>,
    mesh_map: &HashMap<usize, Vec<usize>>,
) -> NodeId {
    let meshes = node
        .mesh()
        .and_then(|mesh| mesh_map.get(&mesh.index()))
        .cloned()
        .unwrap_or_default();
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let id = scene.add_node(name, meshes);
    for child in node.children() {
        let child_id = add_node(scene, child, mesh_map);
        scene.add_child(id, child_id);
    }
    id
}
