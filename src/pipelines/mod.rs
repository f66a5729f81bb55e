//! Render pipelines and the uniform data that feeds them.
//!
//! - `basic` builds the triangle-list render pipeline
//! - `shader` links the vertex and fragment stages and owns the frame uniforms
//! - `material` lays out the per-mesh texture units and `material.*` uniforms
//! - `uniform` packs named values into WGSL uniform structs

pub mod basic;
pub mod material;
pub mod shader;
pub mod uniform;
