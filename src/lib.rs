//! pbr-demo
//!
//! A small real-time model viewer. A model file is imported into a scene
//! graph, flattened into GPU meshes with their textures and drawn every frame
//! through a WGSL shader program under a first-person camera.
//!
//! High-level modules
//! - `camera`: fly camera producing view/projection matrices
//! - `config`: compile-time defaults for the window, assets and camera
//! - `context`: GPU/window context and the per-frame [`context::FrameContext`]
//! - `data_structures`: GPU buffers, textures, the scene graph and models
//! - `flow`: the winit event loop driving each frame
//! - `input`: held keys and mouse buttons
//! - `pipelines`: shader program, material layout and uniform packing
//! - `resources`: OBJ/glTF import and the texture cache
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod input;
pub mod pipelines;
pub mod resources;
