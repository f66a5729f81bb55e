use std::sync::Arc;

use anyhow::Context as _;
use instant::Instant;
use winit::window::Window;

use crate::{data_structures::texture, input::InputState};

/// GPU state bound to the window: surface, device, queue and depth buffer.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        // Wireframe rendering is optional
        let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("could not open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders write linear colour and expect an sRGB surface to encode it.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigure the surface and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        true
    }
}

/// Per-frame state: window size, frame timing and input.
#[derive(Clone, Debug)]
pub struct FrameContext {
    pub width: u32,
    pub height: u32,
    pub input: InputState,
    last_frame: Instant,
    delta: f32,
    cursor: (f32, f32),
}

impl FrameContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            input: InputState::new(),
            last_frame: Instant::now(),
            delta: 0.0,
            cursor: (0.0, 0.0),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Width over height, or 1 while the window is minimized.
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Start a new frame and return the seconds since the previous one.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.delta
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Accumulate a relative mouse motion into the virtual cursor.
    ///
    /// A grabbed cursor stops producing positions, so absolute coordinates
    /// are rebuilt from raw motion deltas.
    pub fn move_cursor(&mut self, dx: f64, dy: f64) -> (f32, f32) {
        self.cursor.0 += dx as f32;
        self.cursor.1 += dy as f32;
        self.cursor
    }

    pub fn cursor(&self) -> (f32, f32) {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_survives_minimizing() {
        let mut frame = FrameContext::new(1920, 1080);
        assert!((frame.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        frame.resize(0, 0);
        assert_eq!(frame.aspect_ratio(), 1.0);
    }

    #[test]
    fn cursor_accumulates_motion() {
        let mut frame = FrameContext::new(10, 10);
        frame.move_cursor(3.0, -2.0);
        assert_eq!(frame.move_cursor(1.5, 0.5), (4.5, -1.5));
    }

    #[test]
    fn tick_measures_elapsed_time() {
        let mut frame = FrameContext::new(10, 10);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(frame.tick() > 0.0);
        assert!(frame.delta() >= 0.005);
    }
}
