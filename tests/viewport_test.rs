use hdri_viewer::context::Viewport;
use winit::dpi::PhysicalSize;

#[test]
fn should_convert_physical_window_size() {
    let viewport = Viewport::from_physical(PhysicalSize::new(1600, 1200), 2.0);

    assert_eq!((viewport.width, viewport.height), (800, 600));
    assert_eq!(viewport.scale_factor, 2.0);
    assert_eq!(viewport.element_height(), 1200.0);
}

#[test]
fn should_cap_pixel_ratio() {
    let retina = Viewport::new(800, 600, 3.0);
    assert_eq!(retina.pixel_ratio(2.0), 2.0);
    assert_eq!(retina.physical_size(2.0), (1600, 1200));

    let plain = Viewport::new(800, 600, 1.0);
    assert_eq!(plain.pixel_ratio(2.0), 1.0);
    assert_eq!(plain.physical_size(2.0), (800, 600));

    let fractional = Viewport::new(801, 601, 1.25);
    assert_eq!(fractional.physical_size(2.0), (1001, 751));
}

#[test]
fn should_never_produce_an_empty_render_target() {
    let collapsed = Viewport::new(0, 600, 1.0);

    assert!(collapsed.is_empty());
    assert_eq!(collapsed.physical_size(2.0), (1, 600));
    assert!(!Viewport::new(1, 1, 1.0).is_empty());
}
