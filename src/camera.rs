//! First-person fly camera.
//!
//! The camera keeps its pose as a position plus yaw/pitch angles and derives
//! the view and projection matrices once per frame in [`Camera::update`].

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Vector3, perspective};
use winit::keyboard::KeyCode;

use crate::{config::CameraConfig, context::FrameContext};

/// wgpu clip space has z in [0, 1] where cgmath produces [-1, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const PITCH_LIMIT: f32 = 89.0;
const FOV_MIN: f32 = 1.0;
const FOV_MAX: f32 = 45.0;

#[derive(Clone, Debug)]
pub struct Camera {
    position: Point3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    fov: f32,
    speed: f32,
    sprint_speed: f32,
    sensitivity: f32,
    near: f32,
    far: f32,
    last_x: f32,
    last_y: f32,
    first_mouse: bool,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            position: config.position.into(),
            front: Vector3::from(config.front).normalize(),
            up: Vector3::unit_y(),
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            fov: config.fov.clamp(FOV_MIN, FOV_MAX),
            speed: config.speed,
            sprint_speed: config.sprint_speed,
            sensitivity: config.sensitivity,
            near: config.near,
            far: config.far,
            last_x: 0.0,
            last_y: 0.0,
            first_mouse: true,
            view: Matrix4::from_scale(1.0),
            projection: Matrix4::from_scale(1.0),
        };
        camera.view = camera.look_at();
        camera.projection = camera.perspective(aspect);
        camera
    }

    /// Refresh the matrices from the current pose, then move with W/A/S/D.
    ///
    /// Movement is applied after the matrices are built, so it shows up in
    /// the next frame.
    pub fn update(&mut self, frame: &FrameContext, dt: f32) {
        self.view = self.look_at();
        self.projection = self.perspective(frame.aspect_ratio());

        let input = &frame.input;
        let speed = if input.is_pressed(KeyCode::ShiftLeft) {
            self.sprint_speed
        } else {
            self.speed
        };
        let velocity = speed * dt;
        let right = self.front.cross(self.up).normalize();
        if input.is_pressed(KeyCode::KeyW) {
            self.position += self.front * velocity;
        }
        if input.is_pressed(KeyCode::KeyS) {
            self.position -= self.front * velocity;
        }
        if input.is_pressed(KeyCode::KeyA) {
            self.position -= right * velocity;
        }
        if input.is_pressed(KeyCode::KeyD) {
            self.position += right * velocity;
        }
    }

    /// Turn towards an absolute cursor position.
    ///
    /// The first sample only seeds the reference point.
    pub fn process_mouse(&mut self, x: f32, y: f32) {
        if self.first_mouse {
            self.last_x = x;
            self.last_y = y;
            self.first_mouse = false;
            return;
        }
        let xoffset = (x - self.last_x) * self.sensitivity;
        // screen y grows downwards
        let yoffset = (self.last_y - y) * self.sensitivity;
        self.last_x = x;
        self.last_y = y;

        self.yaw += xoffset;
        self.pitch = (self.pitch + yoffset).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.front = front_from_angles(self.yaw, self.pitch);
    }

    /// Zoom by narrowing or widening the field of view.
    pub fn process_scroll(&mut self, _xoffset: f32, yoffset: f32) {
        self.fov = (self.fov - yoffset).clamp(FOV_MIN, FOV_MAX);
    }

    fn look_at(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    fn perspective(&self, aspect: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(Deg(self.fov), aspect, self.near, self.far)
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    /// Point the camera along `front`. Yaw and pitch are left alone, so the
    /// next mouse movement turns relative to the stored angles.
    pub fn set_front(&mut self, front: Vector3<f32>) {
        if front.magnitude2() > f32::EPSILON {
            self.front = front.normalize();
        }
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn set_view_matrix(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn set_projection_matrix(&mut self, projection: Matrix4<f32>) {
        self.projection = projection;
    }
}

fn front_from_angles(yaw: f32, pitch: f32) -> Vector3<f32> {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}
