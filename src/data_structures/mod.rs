//! Engine data structures: GPU buffers, textures, scene graphs and models.
//!
//! - `buffer` holds move-only vertex, index and uniform buffer handles
//! - `model` contains vertices, meshes, models and the draw commands
//! - `scene_graph` is the importer-neutral scene arena
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod buffer;
pub mod model;
pub mod scene_graph;
pub mod texture;
