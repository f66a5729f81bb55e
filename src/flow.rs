//! Application event loop.
//!
//! [`run`] opens the window, loads the GPU context, shader program and model
//! on a tokio runtime, then drives one frame per redraw:
//!
//! 1. Collect window/device events into the [`FrameContext`]
//! 2. Measure the frame delta
//! 3. Update the camera and write the frame uniforms
//! 4. Clear, draw the model and present

use std::{iter, sync::Arc};

use anyhow::Context as _;
use cgmath::Matrix4;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{
        DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent,
    },
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::{
    camera::Camera,
    config::DemoConfig,
    context::{Context, FrameContext},
    data_structures::model::{Model, RenderCommands},
    pipelines::{material::MaterialLayout, shader::ShaderProgram},
};

/// Scroll distance in pixels that counts as one wheel line.
pub const PIXELS_PER_LINE: f64 = 20.0;

/// Everything that exists once the window is up.
#[derive(Debug)]
struct AppState {
    ctx: Context,
    program: ShaderProgram,
    model: Model,
    camera: Camera,
    clear_colour: wgpu::Color,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &DemoConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window)
            .await
            .context("cannot create the main context")?;
        let material_layout = MaterialLayout::new(&ctx.device, &ctx.queue);
        let program = ShaderProgram::from_files(
            &ctx.device,
            ctx.config.format,
            &material_layout,
            &config.vertex_shader,
            &config.fragment_shader,
        )
        .await?;
        let model = Model::load(&ctx.device, &ctx.queue, &material_layout, &config.model)
            .await
            .with_context(|| format!("cannot load model {}", config.model.display()))?;
        if !model.texture_errors().is_empty() {
            log::warn!(
                "{} texture(s) of {} could not be loaded",
                model.texture_errors().len(),
                config.model.display()
            );
        }
        let aspect = ctx.config.width as f32 / ctx.config.height as f32;
        let camera = Camera::new(&config.camera, aspect);
        Ok(Self {
            ctx,
            program,
            model,
            camera,
            clear_colour: config.clear_colour,
        })
    }

    fn resize(&mut self, frame: &mut FrameContext, width: u32, height: u32) {
        frame.resize(width, height);
        self.ctx.resize(width, height);
    }

    fn update(&mut self, frame: &FrameContext, dt: f32) {
        self.camera.update(frame, dt);
        self.program.set_mat4("model", Matrix4::from_scale(1.0));
        self.program.set_mat4("view", self.camera.view_matrix());
        self.program
            .set_mat4("projection", self.camera.projection_matrix());
        self.program.upload(&self.ctx.queue);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.draw_model(&self.model, &self.program);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App {
    config: DemoConfig,
    async_runtime: tokio::runtime::Runtime,
    state: Option<AppState>,
    frame: FrameContext,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: DemoConfig) -> anyhow::Result<Self> {
        let async_runtime =
            tokio::runtime::Runtime::new().context("cannot start the async runtime")?;
        let frame = FrameContext::new(config.width, config.height);
        Ok(Self {
            config,
            async_runtime,
            state: None,
            frame,
            error: None,
        })
    }

    /// Stop the loop and remember why, so [`run`] can report it.
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        let Some(state) = &mut self.state else {
            return;
        };
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyT => {
                state.program.set_polygon_mode(wgpu::PolygonMode::Line);
            }
            KeyCode::KeyY => {
                state.program.set_polygon_mode(wgpu::PolygonMode::Fill);
            }
            _ => {}
        }
    }
}

fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    if let Err(e) = grabbed {
        log::warn!("could not grab the cursor: {e}");
    }
    window.set_cursor_visible(false);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, anyhow::Error::new(e).context("cannot create the window")),
        };
        grab_cursor(&window);

        let init = AppState::new(window, &self.config);
        match self.async_runtime.block_on(init) {
            Ok(state) => {
                self.frame
                    .resize(state.ctx.config.width, state.ctx.config.height);
                self.frame.tick();
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let (x, y) = self.frame.move_cursor(dx, dy);
            state.camera.process_mouse(x, y);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if self.state.is_none() {
            return;
        }
        self.frame.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::MouseWheel { delta, .. } => {
                let (x, y) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(pos) => (
                        (pos.x / PIXELS_PER_LINE) as f32,
                        (pos.y / PIXELS_PER_LINE) as f32,
                    ),
                };
                if let Some(state) = &mut self.state {
                    state.camera.process_scroll(x, y);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(&mut self.frame, size.width, size.height);
                }
            }
            WindowEvent::Focused(true) => {
                if let Some(state) = &self.state {
                    grab_cursor(&state.ctx.window);
                }
            }
            // Clicking into the window takes the cursor back
            WindowEvent::MouseInput { .. }
                if self.frame.input.is_button_pressed(MouseButton::Left) =>
            {
                if let Some(state) = &self.state {
                    grab_cursor(&state.ctx.window);
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = self.frame.tick();
                let Some(state) = &mut self.state else {
                    return;
                };
                state.update(&self.frame, dt);
                match state.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(&mut self.frame, size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::Timeout) => log::warn!("surface timeout, skipping frame"),
                    Err(e) => {
                        let error = anyhow::Error::new(e).context("unable to render");
                        self.fail(event_loop, error);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Run the demo until the window is closed or a fatal error occurs.
pub fn run(config: DemoConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new().context("cannot create the event loop")?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
