use std::f32::consts::PI;

use cgmath::{Deg, InnerSpace, Point3, Rad, Vector3};
use hdri_viewer::{
    camera::{Camera, CameraUniform, OrbitControls, Projection, Spherical},
    config::ViewerConfig,
};
use winit::{
    dpi::PhysicalPosition,
    event::{
        DeviceId, ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent,
    },
};

use crate::common::test_utils::assert_close;

mod common;

const HEIGHT: f32 = 800.0;

fn controls() -> OrbitControls {
    OrbitControls::new((0.0, 0.0, 0.0), Deg(75.0).into(), HEIGHT)
}

fn distance(camera: &Camera) -> f32 {
    (camera.position - camera.target).magnitude()
}

#[test]
fn should_set_aspect_on_resize() {
    let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 100.0);
    assert_close(projection.aspect(), 800.0 / 600.0);

    projection.resize(1920, 1080);
    assert_close(projection.aspect(), 1920.0 / 1080.0);

    // a collapsed window keeps the last aspect
    projection.resize(1920, 0);
    assert_close(projection.aspect(), 1920.0 / 1080.0);
}

#[test]
fn should_convert_spherical_coordinates() {
    let v = Vector3::new(1.0, 2.0, -3.0);
    let back = Spherical::from_vector(v).to_vector();
    assert_close(back.x, v.x);
    assert_close(back.y, v.y);
    assert_close(back.z, v.z);

    let on_z = Spherical::from_vector(Vector3::new(0.0, 0.0, 4.0));
    assert_close(on_z.radius, 4.0);
    assert_close(on_z.theta, 0.0);
    assert_close(on_z.phi, PI / 2.0);
}

#[test]
fn should_expose_exposure_and_encoding() {
    let mut uniform = CameraUniform::new();
    uniform.set_output(1.5, 1.0, true);

    assert_close(uniform.exposure(), 1.5);
    assert!(uniform.encodes_srgb());
}

#[test]
fn should_rotate_around_target() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    // a quarter of the element height is a quarter turn
    controls.rotate(HEIGHT / 4.0, 0.0);
    assert!(controls.update(&mut camera));

    assert_close(camera.position.x, -4.0);
    assert_close(camera.position.y, 0.0);
    assert_close(camera.position.z, 0.0);
    assert_close(distance(&camera), 4.0);

    // without damping nothing is left over
    assert!(!controls.update(&mut camera));
}

#[test]
fn should_dolly_by_wheel_steps() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    controls.dolly(1.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), 4.0 * 0.95);

    controls.dolly(-1.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), 4.0);
}

#[test]
fn should_clamp_distance() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();
    controls.min_distance = 3.0;
    controls.max_distance = 5.0;

    controls.dolly(20.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), 3.0);

    controls.dolly(-40.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), 5.0);
}

#[test]
fn should_not_flip_over_the_pole() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    // far more than half a turn upwards
    controls.rotate(0.0, HEIGHT);
    controls.update(&mut camera);

    let spherical = Spherical::from_vector(camera.position - camera.target);
    assert!(spherical.phi < 0.01);
    assert_close(camera.position.y, 4.0);
    assert!(camera.position.x.is_finite() && camera.position.z.is_finite());
}

#[test]
fn should_ease_out_with_damping() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();
    controls.enable_damping = true;
    controls.damping_factor = 0.05;

    controls.rotate(HEIGHT / 4.0, 0.0);

    // first step applies 5% of the pending quarter turn
    controls.update(&mut camera);
    let first = Spherical::from_vector(camera.position - camera.target);
    assert_close(first.theta, -PI / 2.0 * 0.05);

    // second step applies 5% of what is left
    controls.update(&mut camera);
    let second = Spherical::from_vector(camera.position - camera.target);
    assert_close(second.theta - first.theta, -PI / 2.0 * 0.95 * 0.05);

    assert!(controls.is_moving());
    for _ in 0..2000 {
        controls.update(&mut camera);
    }
    assert!(!controls.is_moving());
    let settled = Spherical::from_vector(camera.position - camera.target);
    assert_close(settled.theta, -PI / 2.0);
}

#[test]
fn should_keep_target_while_rotating_and_move_it_while_panning() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    controls.rotate(100.0, 50.0);
    controls.update(&mut camera);
    assert_eq!(camera.target, Point3::new(0.0, 0.0, 0.0));

    // dragging right moves the scene right, so the target moves left
    controls.pan(&camera.clone(), 100.0, 0.0);
    controls.update(&mut camera);
    let (right, _) = camera.basis();
    let moved = camera.target - Point3::new(0.0, 0.0, 0.0);
    assert!(moved.dot(right) < 0.0);
    assert_close(distance(&camera), 4.0);
}

#[test]
fn should_build_from_config() {
    let config = ViewerConfig::default();
    let controls = OrbitControls::from_config(&config, HEIGHT);

    assert!(controls.enable_damping);
    assert_close(controls.damping_factor, 0.05);
    assert_eq!(controls.target, Point3::new(0.0, 0.0, 0.0));
    assert!(!controls.is_moving());

    let fovy: Rad<f32> = Deg(config.fovy).into();
    let projection = Projection::new(800, 600, fovy, config.znear, config.zfar);
    assert_close(projection.fovy().0, fovy.0);
}

#[test]
fn should_recover_from_dollying_far_past_the_target() {
    let config = ViewerConfig::default();
    let mut camera = Camera::new(config.camera_position, config.camera_target);
    let mut controls = OrbitControls::from_config(&config, HEIGHT);

    for _ in 0..2100 {
        controls.dolly(1.0);
        controls.update(&mut camera);
    }
    assert_close(distance(&camera), config.znear);

    for _ in 0..20 {
        controls.dolly(-1.0);
        controls.update(&mut camera);
    }
    assert_close(distance(&camera), config.znear / 0.95f32.powi(20));

    // a zoom factor that overflows is dropped instead of poisoning the radius
    let before = distance(&camera);
    controls.dolly(-5000.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), before);

    controls.dolly(5000.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), before);
}

#[test]
fn should_move_away_from_a_camera_sitting_on_the_target() {
    let mut camera = Camera::new((0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    controls.update(&mut camera);
    let radius = distance(&camera);
    assert!(radius > 0.0);

    controls.dolly(-1.0);
    controls.update(&mut camera);
    assert_close(distance(&camera), radius / 0.95);
}

fn device() -> DeviceId {
    // SAFETY: only used as an opaque id, never handed back to the platform
    unsafe { DeviceId::dummy() }
}

fn cursor_moved(x: f64, y: f64) -> WindowEvent {
    WindowEvent::CursorMoved {
        device_id: device(),
        position: PhysicalPosition::new(x, y),
    }
}

fn mouse(state: ElementState, button: MouseButton) -> WindowEvent {
    WindowEvent::MouseInput {
        device_id: device(),
        state,
        button,
    }
}

fn touch(id: u64, phase: TouchPhase, x: f64, y: f64) -> WindowEvent {
    WindowEvent::Touch(Touch {
        device_id: device(),
        phase,
        location: PhysicalPosition::new(x, y),
        force: None,
        id,
    })
}

#[test]
fn should_rotate_and_dolly_from_mouse_events() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    assert!(controls.handle_window_events(&camera, &mouse(ElementState::Pressed, MouseButton::Left)));
    // the first position only anchors the drag
    assert!(!controls.handle_window_events(&camera, &cursor_moved(0.0, 0.0)));
    assert!(controls.handle_window_events(&camera, &cursor_moved(HEIGHT as f64 / 4.0, 0.0)));
    controls.update(&mut camera);
    assert_close(camera.position.x, -4.0);
    assert_close(camera.position.z, 0.0);

    controls.handle_window_events(&camera, &mouse(ElementState::Released, MouseButton::Left));
    assert!(!controls.handle_window_events(&camera, &cursor_moved(400.0, 0.0)));
    controls.update(&mut camera);
    assert_close(camera.position.x, -4.0);

    let wheel = WindowEvent::MouseWheel {
        device_id: device(),
        delta: MouseScrollDelta::LineDelta(0.0, 1.0),
        phase: TouchPhase::Moved,
    };
    assert!(controls.handle_window_events(&camera, &wheel));
    controls.update(&mut camera);
    assert_close(distance(&camera), 4.0 * 0.95);
}

#[test]
fn should_pan_with_right_drag() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    controls.handle_window_events(&camera, &mouse(ElementState::Pressed, MouseButton::Right));
    controls.handle_window_events(&camera, &cursor_moved(100.0, 100.0));
    controls.handle_window_events(&camera, &cursor_moved(200.0, 100.0));
    controls.update(&mut camera);

    assert!(camera.target.x < 0.0);
    assert_close(camera.target.y, 0.0);
    assert_close(distance(&camera), 4.0);
}

#[test]
fn should_rotate_with_one_finger_and_pinch_with_two() {
    let mut camera = Camera::new((0.0, 0.0, 4.0), (0.0, 0.0, 0.0));
    let mut controls = controls();

    controls.handle_window_events(&camera, &touch(1, TouchPhase::Started, 0.0, 0.0));
    controls.handle_window_events(&camera, &touch(1, TouchPhase::Moved, HEIGHT as f64 / 4.0, 0.0));
    controls.update(&mut camera);
    assert_close(camera.position.x, -4.0);

    // fingers 100px apart, then spread to 200px
    controls.handle_window_events(&camera, &touch(2, TouchPhase::Started, 100.0, 0.0));
    controls.handle_window_events(&camera, &touch(2, TouchPhase::Moved, 0.0, 0.0));
    controls.update(&mut camera);
    assert_close(distance(&camera), 2.0);

    controls.handle_window_events(&camera, &touch(1, TouchPhase::Ended, 200.0, 0.0));
    controls.handle_window_events(&camera, &touch(2, TouchPhase::Cancelled, 0.0, 0.0));
    assert!(!controls.is_moving());
}
