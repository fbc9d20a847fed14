//! Perspective camera, projection and orbit controls.
//!
//! The camera always looks at a target point. [`OrbitControls`] moves the camera on a
//! sphere around that target. Rotation and panning ease out when damping is on, so
//! [`OrbitControls::update`] has to be called every frame, even without input.

use std::collections::HashMap;
use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
};

use crate::config::ViewerConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 1e-6;
/// Lower bound for the orbit radius, applied on top of `min_distance`.
const MIN_RADIUS: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Camera-space right and up axes expressed in world space.
    pub fn basis(&self) -> (Vector3<f32>, Vector3<f32>) {
        let forward = (self.target - self.position).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward);
        (right, up)
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Camera data as seen by the shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    // x: exposure, y: tone mapping mode, z: 1 when the shader has to encode sRGB
    output: [f32; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
            output: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj
            .invert()
            .unwrap_or_else(Matrix4::identity)
            .into();
    }

    pub fn set_output(&mut self, exposure: f32, tone_mapping_mode: f32, encode_srgb: bool) {
        self.output = [
            exposure,
            tone_mapping_mode,
            if encode_srgb { 1.0 } else { 0.0 },
            0.0,
        ];
    }

    pub fn exposure(&self) -> f32 {
        self.output[0]
    }

    pub fn encodes_srgb(&self) -> bool {
        self.output[2] > 0.5
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU side of the camera: the uniform, its buffer and bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Spherical coordinates with Y up. `theta` is the azimuth around Y, `phi` the polar
/// angle measured from +Y.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Spherical {
    pub fn from_vector(v: Vector3<f32>) -> Self {
        let radius = v.magnitude();
        if radius == 0.0 || !radius.is_finite() {
            return Self::default();
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_vector(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }

    fn make_safe(&mut self) {
        self.phi = self.phi.clamp(EPS, PI - EPS);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    None,
    Rotate,
    Pan,
    Dolly,
}

/// Orbits, dollies and pans a [`Camera`] around a target point.
#[derive(Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,

    spherical_delta: Spherical,
    scale: f32,
    pan_offset: Vector3<f32>,

    // Height of the input surface in the same unit as cursor positions.
    element_height: f32,
    fovy: Rad<f32>,
    gesture: Gesture,
    cursor: Option<PhysicalPosition<f64>>,
    touches: HashMap<u64, PhysicalPosition<f64>>,
}

impl OrbitControls {
    pub fn new<T: Into<Point3<f32>>>(target: T, fovy: Rad<f32>, element_height: f32) -> Self {
        Self {
            target: target.into(),
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: MIN_RADIUS,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            spherical_delta: Spherical::default(),
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            element_height: element_height.max(1.0),
            fovy,
            gesture: Gesture::None,
            cursor: None,
            touches: HashMap::new(),
        }
    }

    pub fn from_config(config: &ViewerConfig, element_height: f32) -> Self {
        let mut controls = Self::new(
            config.camera_target,
            cgmath::Deg(config.fovy).into(),
            element_height,
        );
        controls.enable_damping = config.enable_damping;
        controls.damping_factor = config.damping_factor;
        controls.min_distance = config.znear.max(MIN_RADIUS);
        controls
    }

    pub fn set_element_height(&mut self, height: f32) {
        self.element_height = height.max(1.0);
    }

    /// `true` while rotation or pan is still easing out.
    pub fn is_moving(&self) -> bool {
        self.spherical_delta.theta.abs() > EPS
            || self.spherical_delta.phi.abs() > EPS
            || self.pan_offset.magnitude2() > EPS * EPS
            || (self.scale - 1.0).abs() > EPS
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    /// Rotate by a pointer movement in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let factor = 2.0 * PI * self.rotate_speed / self.element_height;
        self.rotate_left(dx * factor);
        self.rotate_up(dy * factor);
    }

    /// Move closer for positive steps, further away for negative ones.
    pub fn dolly(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        self.scale *= self.zoom_scale().powf(steps);
    }

    /// Pan by a pointer movement in pixels, in screen space.
    pub fn pan(&mut self, camera: &Camera, dx: f32, dy: f32) {
        let offset = camera.position - self.target;
        let target_distance = offset.magnitude() * (self.fovy.0 / 2.0).tan();
        let (right, up) = camera.basis();
        let left_distance = 2.0 * dx * target_distance / self.element_height * self.pan_speed;
        let up_distance = 2.0 * dy * target_distance / self.element_height * self.pan_speed;
        self.pan_offset += right * -left_distance;
        self.pan_offset += up * up_distance;
    }

    /// Feed a window event into the controls. Returns `true` if the event was used.
    ///
    /// Panning needs the current camera basis, hence `camera`.
    pub fn handle_window_events(&mut self, camera: &Camera, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.gesture = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Gesture::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => Gesture::Pan,
                    (ElementState::Pressed, MouseButton::Middle) => Gesture::Dolly,
                    (ElementState::Released, _) => Gesture::None,
                    _ => self.gesture,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace(*position);
                let Some(previous) = previous else {
                    return false;
                };
                let dx = (position.x - previous.x) as f32;
                let dy = (position.y - previous.y) as f32;
                match self.gesture {
                    Gesture::Rotate => self.rotate(dx, dy),
                    Gesture::Pan => self.pan(camera, dx, dy),
                    Gesture::Dolly => {
                        if dy > 0.0 {
                            self.dolly(-1.0)
                        } else if dy < 0.0 {
                            self.dolly(1.0)
                        }
                    }
                    Gesture::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.gesture = Gesture::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if dy > 0.0 {
                    self.dolly(1.0);
                } else if dy < 0.0 {
                    self.dolly(-1.0);
                }
                true
            }
            WindowEvent::Touch(touch) => self.handle_touch(touch),
            _ => false,
        }
    }

    fn handle_touch(&mut self, touch: &Touch) -> bool {
        match touch.phase {
            TouchPhase::Started => {
                self.touches.insert(touch.id, touch.location);
            }
            TouchPhase::Moved => {
                let pinch_before = self.pinch_distance();
                let previous = self.touches.insert(touch.id, touch.location);
                match (self.touches.len(), previous) {
                    (1, Some(previous)) => {
                        let dx = (touch.location.x - previous.x) as f32;
                        let dy = (touch.location.y - previous.y) as f32;
                        self.rotate(dx, dy);
                    }
                    (2, Some(_)) => {
                        if let (Some(before), Some(after)) = (pinch_before, self.pinch_distance()) {
                            if before > 0.0 && after > 0.0 {
                                let dolly_scale = (after / before).powf(self.zoom_speed);
                                self.scale /= dolly_scale;
                            }
                        }
                    }
                    _ => return false,
                }
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.touches.remove(&touch.id);
            }
        }
        true
    }

    fn pinch_distance(&self) -> Option<f32> {
        let mut points = self.touches.values();
        let a = points.next()?;
        let b = points.next()?;
        Some(((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt() as f32)
    }

    /// Advance the controls by one step and move `camera` accordingly.
    ///
    /// Returns `true` if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_vector(offset);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle);
        spherical.make_safe();

        // a scale that over- or underflowed is dropped for this step
        let scaled = spherical.radius * self.scale;
        if scaled.is_finite() && scaled > 0.0 {
            spherical.radius = scaled;
        }
        let min_distance = self.min_distance.max(MIN_RADIUS);
        spherical.radius = spherical
            .radius
            .clamp(min_distance, self.max_distance.max(min_distance));

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        let new_position = self.target + spherical.to_vector();
        let moved = (new_position - camera.position).magnitude2() > EPS * EPS
            || (camera.target - self.target).magnitude2() > EPS * EPS;
        camera.position = new_position;
        camera.target = self.target;

        if self.enable_damping {
            self.spherical_delta.theta *= 1.0 - self.damping_factor;
            self.spherical_delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        moved
    }
}
