//! Compile-time defaults for the demo.

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub model: PathBuf,
    pub camera: CameraConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "PBR-DEMO".to_string(),
            width: 1920,
            height: 1013,
            clear_colour: wgpu::Color::BLACK,
            vertex_shader: PathBuf::from("assets/shaders/vert.wgsl"),
            fragment_shader: PathBuf::from("assets/shaders/frag.wgsl"),
            model: PathBuf::from("assets/models/cube.obj"),
            camera: CameraConfig::default(),
        }
    }
}

/// Start pose and tuning of the first-person camera. Angles are in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub front: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    /// Units per second.
    pub speed: f32,
    /// Units per second while Left Shift is held.
    pub sprint_speed: f32,
    /// Degrees per cursor pixel.
    pub sensitivity: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.0],
            front: [0.0, 0.0, -1.0],
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            speed: 6.0,
            sprint_speed: 10.0,
            sensitivity: 0.1,
            near: 0.1,
            far: 1000.0,
        }
    }
}
