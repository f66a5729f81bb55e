//! The shader program: a vertex and a fragment stage linked into one render
//! pipeline, plus the per-frame uniforms (`model`, `view`, `projection`).

use std::{
    fmt,
    path::{Path, PathBuf},
};

use cgmath::{Matrix4, Vector2, Vector3};
use thiserror::Error;

use crate::{
    data_structures::{
        buffer::UniformBuffer,
        model::{ModelVertex, Vertex},
    },
    pipelines::{
        basic::mk_render_pipeline,
        material::MaterialLayout,
        uniform::{UniformBlock, UniformKind, UniformLayout, UniformValue},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("could not read {stage} shader source {path}")]
    Read {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
}

/// Layout of the WGSL `Frame` struct in `vert.wgsl`.
pub fn frame_uniform_layout() -> UniformLayout {
    UniformLayout::new()
        .field("model", UniformKind::Mat4)
        .field("view", UniformKind::Mat4)
        .field("projection", UniformKind::Mat4)
}

/// A linked vertex + fragment program with its frame uniforms.
///
/// Uniform writes are staged on the CPU and sent with [`upload`](Self::upload).
/// When the device supports line rasterization a second pipeline is kept for
/// wireframe rendering.
#[derive(Debug)]
pub struct ShaderProgram {
    fill: wgpu::RenderPipeline,
    wireframe: Option<wgpu::RenderPipeline>,
    polygon_mode: wgpu::PolygonMode,
    uniforms: UniformBlock,
    uniform_buffer: UniformBuffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl ShaderProgram {
    /// Read both stages from disk and build the program.
    pub async fn from_files(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        material: &MaterialLayout,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<Self, ShaderError> {
        let (vertex_src, fragment_src) = futures::try_join!(
            read_source(ShaderStage::Vertex, vertex_path),
            read_source(ShaderStage::Fragment, fragment_path),
        )?;
        log::info!(
            "compiling shaders {} and {}",
            vertex_path.display(),
            fragment_path.display()
        );
        Self::from_sources(device, color_format, material, &vertex_src, &fragment_src).await
    }

    pub async fn from_sources(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        material: &MaterialLayout,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(device, ShaderStage::Vertex, vertex_src).await?;
        let fragment = compile(device, ShaderStage::Fragment, fragment_src).await?;

        let uniforms = UniformBlock::new(frame_uniform_layout());
        let uniform_buffer = UniformBuffer::allocate_and_fill(
            device,
            "Frame Uniform Buffer",
            uniforms.bytes(),
            wgpu::BufferUsages::empty(),
        );
        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("frame_bind_group_layout"),
            });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("frame_bind_group"),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &material.bind_group_layout],
            push_constant_ranges: &[],
        });

        let stages = (&vertex, &fragment);
        let fill = link(device, &layout, color_format, stages, wgpu::PolygonMode::Fill).await?;
        let wireframe = if device
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            Some(link(device, &layout, color_format, stages, wgpu::PolygonMode::Line).await?)
        } else {
            log::warn!("device does not support line rasterization, wireframe is unavailable");
            None
        };

        Ok(Self {
            fill,
            wireframe,
            polygon_mode: wgpu::PolygonMode::Fill,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    /// The pipeline for the current polygon mode.
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        match (&self.polygon_mode, &self.wireframe) {
            (wgpu::PolygonMode::Line, Some(wireframe)) => wireframe,
            _ => &self.fill,
        }
    }

    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    /// Make this program active on `pass` for the following draws.
    pub fn use_program(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(self.pipeline());
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
    }

    /// Switch between filled and wireframe rendering.
    ///
    /// Returns `false` (and keeps the current mode) when the requested mode
    /// has no pipeline on this device.
    pub fn set_polygon_mode(&mut self, mode: wgpu::PolygonMode) -> bool {
        match mode {
            wgpu::PolygonMode::Fill => {}
            wgpu::PolygonMode::Line if self.wireframe.is_some() => {}
            other => {
                log::warn!("polygon mode {other:?} is not available");
                return false;
            }
        }
        if self.polygon_mode != mode {
            log::info!("switching to {mode:?} rendering");
        }
        self.polygon_mode = mode;
        true
    }

    pub fn polygon_mode(&self) -> wgpu::PolygonMode {
        self.polygon_mode
    }

    /// Stage a uniform value by name. Unknown names and mismatched types are
    /// ignored.
    pub fn set_value(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        self.uniforms.set(name, value)
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        self.set_value(name, value)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        self.set_value(name, value)
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        self.set_value(name, value)
    }

    pub fn set_vec2(&mut self, name: &str, value: Vector2<f32>) -> bool {
        self.set_value(name, value)
    }

    pub fn set_vec3(&mut self, name: &str, value: Vector3<f32>) -> bool {
        self.set_value(name, value)
    }

    pub fn set_mat4(&mut self, name: &str, value: Matrix4<f32>) -> bool {
        self.set_value(name, value)
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    /// Write staged uniform values to the GPU if any changed.
    pub fn upload(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.uniforms.take_dirty() {
            self.uniform_buffer.fill_bytes(queue, 0, bytes);
        }
    }
}

async fn read_source(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ShaderError::Read {
            stage,
            path: path.to_path_buf(),
            source,
        })
}

async fn compile(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "Vertex Shader",
            ShaderStage::Fragment => "Fragment Shader",
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match device.pop_error_scope().await {
        Some(error) => Err(ShaderError::Compile {
            stage,
            log: error.to_string(),
        }),
        None => Ok(module),
    }
}

async fn link(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    (vertex, fragment): (&wgpu::ShaderModule, &wgpu::ShaderModule),
    polygon_mode: wgpu::PolygonMode,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = mk_render_pipeline(
        device,
        layout,
        color_format,
        &[ModelVertex::desc()],
        vertex,
        fragment,
        polygon_mode,
    );
    match device.pop_error_scope().await {
        Some(error) => Err(ShaderError::Link {
            log: error.to_string(),
        }),
        None => Ok(pipeline),
    }
}
