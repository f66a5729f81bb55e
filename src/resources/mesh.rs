//! Wavefront OBJ/MTL import via `tobj`.

use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use crate::{
    data_structures::scene_graph::{ImportedMaterial, ImportedMesh, SceneGraph},
    resources::{ImportError, ImportOptions},
};

/// Parse OBJ text into a scene: a root node with one child per object.
///
/// Material libraries are looked up next to the OBJ file. A missing or broken
/// library is logged and the meshes are imported without materials.
pub async fn import_obj(
    text: &str,
    path: &Path,
    options: &ImportOptions,
) -> Result<SceneGraph, ImportError> {
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut reader = BufReader::new(Cursor::new(text));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: options.triangulate,
            single_index: true,
            ..Default::default()
        },
        move |p| {
            let mtl_path = base_dir.join(&p);
            async move {
                match tokio::fs::read_to_string(&mtl_path).await {
                    Ok(mtl_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text))),
                    Err(err) => {
                        log::warn!("could not read material library {}: {err}", mtl_path.display());
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await
    .map_err(|source| ImportError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let obj_materials = obj_materials.unwrap_or_else(|err| {
        log::warn!("{}: materials unavailable ({err}), importing without", path.display());
        Vec::new()
    });

    let mut scene = SceneGraph::new();
    scene.materials = obj_materials.iter().map(convert_material).collect();

    let root = scene.add_node("root", Vec::new());
    scene.set_root(root);
    for model in &models {
        let mesh = convert_mesh(model, scene.materials.len());
        if mesh.faces.len() * 3 != model.mesh.indices.len() {
            log::warn!(
                "{}: object {:?} has non-triangular faces, trailing indices dropped",
                path.display(),
                model.name
            );
        }
        scene.meshes.push(mesh);
        let child = scene.add_node(model.name.clone(), vec![scene.meshes.len() - 1]);
        scene.add_child(root, child);
    }
    Ok(scene)
}

fn convert_material(material: &tobj::Material) -> ImportedMaterial {
    ImportedMaterial {
        name: material.name.clone(),
        diffuse: material.diffuse_texture.iter().cloned().collect(),
        specular: material.specular_texture.iter().cloned().collect(),
        height: material.normal_texture.iter().cloned().collect(),
    }
}

fn convert_mesh(model: &tobj::Model, material_count: usize) -> ImportedMesh {
    let mesh = &model.mesh;
    let vertex_count = mesh.positions.len() / 3;

    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let normals = (!mesh.normals.is_empty() && mesh.normals.len() == vertex_count * 3).then(|| {
        mesh.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    });
    // OBJ puts the V origin at the bottom, wgpu samples from the top.
    let tex_coords =
        (!mesh.texcoords.is_empty() && mesh.texcoords.len() == vertex_count * 2).then(|| {
            mesh.texcoords
                .chunks_exact(2)
                .map(|t| [t[0], 1.0 - t[1]])
                .collect()
        });
    let faces = mesh
        .indices
        .chunks_exact(3)
        .map(|f| [f[0], f[1], f[2]])
        .collect();

    let material = mesh.material_id.filter(|&id| {
        let known = id < material_count;
        if !known {
            log::warn!("object {:?} references unknown material {id}", model.name);
        }
        known
    });

    ImportedMesh {
        name: model.name.clone(),
        positions,
        normals,
        tex_coords,
        faces,
        material,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn import(text: &str) -> SceneGraph {
        import_obj(
            text,
            Path::new("does-not-exist/model.obj"),
            &ImportOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn quads_are_triangulated() {
        let scene = import("o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").await;
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.faces.iter().flatten().all(|&i| i < 4));
        assert_eq!(mesh.normals, None);
        assert_eq!(mesh.material, None);
    }

    #[tokio::test]
    async fn texture_coordinates_are_flipped_vertically() {
        let scene = import(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0.25\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
        ).await;
        let uvs = scene.meshes[0].tex_coords.clone().unwrap();
        assert_eq!(uvs, vec![[0.0, 0.75], [1.0, 1.0], [0.0, 0.0]]);
    }

    #[tokio::test]
    async fn objects_become_children_of_the_root() {
        let scene = import(
            "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n",
        ).await;
        let names: Vec<_> = scene.depth_first().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b"]);
        assert_eq!(scene.mesh_order(), vec![0, 1]);
    }

    #[tokio::test]
    async fn missing_material_library_is_not_fatal() {
        let scene = import("mtllib nowhere.mtl\nusemtl brick\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").await;
        assert!(scene.materials.is_empty());
        assert_eq!(scene.meshes[0].material, None);
    }
}
