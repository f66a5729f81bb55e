//! Loading scenes and textures from external files.
//!
//! [`import_scene`] picks an importer by file extension and returns a
//! [`SceneGraph`]. OBJ files go through `tobj` (see [`mesh`]), glTF files
//! through the `gltf` crate (see [`gltf`]).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::data_structures::scene_graph::SceneGraph;

pub mod gltf;
pub mod mesh;
pub mod texture;

/// Failure to turn a model file into meshes. Fatal for the model.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read model file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("could not parse OBJ file {path}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("could not parse glTF file {path}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: ::gltf::Error,
    },
    #[error("scene contains no meshes")]
    EmptyScene,
    #[error("scene has no root node")]
    NoRoot,
    #[error("node {node:?} references missing mesh {mesh}")]
    DanglingMesh { node: String, mesh: usize },
    #[error("mesh {mesh:?} uses index {index} but has only {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },
}

/// Post-processing requested from the importers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Split polygons into triangles.
    pub triangulate: bool,
    /// Compute smooth normals for meshes that have none.
    pub generate_normals: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            triangulate: true,
            generate_normals: true,
        }
    }
}

pub async fn load_string(path: &Path) -> Result<String, ImportError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn load_binary(path: &Path) -> Result<Vec<u8>, ImportError> {
    tokio::fs::read(path).await.map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Import `path` as a scene graph, choosing the importer by extension.
pub async fn import_scene(path: &Path, options: &ImportOptions) -> Result<SceneGraph, ImportError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    log::info!("importing {}", path.display());
    let mut scene = match extension.as_deref() {
        Some("obj") => {
            let text = load_string(path).await?;
            mesh::import_obj(&text, path, options).await?
        }
        Some("gltf" | "glb") => {
            let bytes = load_binary(path).await?;
            gltf::import_gltf(&bytes, path)?
        }
        _ => return Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    };

    if options.generate_normals {
        for mesh in scene.meshes.iter_mut().filter(|m| m.normals.is_none()) {
            log::debug!("generating normals for {:?}", mesh.name);
            mesh.generate_smooth_normals();
        }
    }
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_extensions_are_rejected() {
        let err = import_scene(Path::new("model.fbx"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn missing_files_report_their_path() {
        let err = import_scene(Path::new("no/such/model.obj"), &ImportOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "could not read model file no/such/model.obj");
    }
}
