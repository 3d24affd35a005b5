//! Batch renderer output checks.

use std::sync::Arc;

use vivarium::consts::NUM_AGENTS;
use vivarium::{Config, ExecMode, Manager, RasterDevice, RenderDeviceCfg};

fn render_manager(num_worlds: u32) -> Manager {
    Manager::new(Config {
        exec_mode: ExecMode::Cpu,
        num_worlds,
        rand_seed: 3,
        enable_batch_renderer: true,
        batch_render_view_width: 48,
        batch_render_view_height: 32,
        ..Config::default()
    })
}

#[test]
fn test_image_tensor_shapes() {
    let mgr = render_manager(2);

    let rgb = mgr.rgb_tensor();
    assert_eq!(rgb.dims(), &[2, NUM_AGENTS as i64, 32, 48, 4]);
    assert_eq!(rgb.element_type(), vivarium::ElementType::U8);

    let depth = mgr.depth_tensor();
    assert_eq!(depth.dims(), &[2, NUM_AGENTS as i64, 32, 48, 1]);
    assert_eq!(depth.element_type(), vivarium::ElementType::F32);
    assert_eq!(depth.num_elements() * 4, rgb.num_elements());
}

#[test]
fn test_frames_contain_geometry() {
    let mgr = render_manager(1);

    let rgb = mgr.rgb_tensor();
    let pixels = rgb.as_slice::<u8>();
    // Fully opaque output.
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));
    // The agent stands inside a walled room; a substantial share of the
    // view must be covered by geometry rather than background.
    let background = pixels
        .chunks_exact(4)
        .filter(|px| px[..3] == [13, 16, 26])
        .count();
    let total = pixels.len() / 4;
    assert!(
        background < total / 2,
        "expected geometry to cover most of the view ({background}/{total} background)"
    );

    let depth = mgr.depth_tensor();
    let depths = depth.as_slice::<f32>();
    assert!(depths.iter().all(|d| d.is_finite() && *d > 0.0));
    // Something must be closer than the far plane.
    assert!(depths.iter().any(|d| *d < 50.0));
}

#[test]
fn test_external_render_device() {
    // A caller-supplied device is used directly; the same handle can back
    // several managers.
    let device = Arc::new(RasterDevice {
        near: 0.1,
        far: 60.0,
        fov_y_degrees: 75.0,
    });
    let mgr = Manager::new(Config {
        exec_mode: ExecMode::Cpu,
        num_worlds: 1,
        rand_seed: 9,
        render_device: RenderDeviceCfg::External(Arc::clone(&device)),
        enable_batch_renderer: true,
        batch_render_view_width: 16,
        batch_render_view_height: 16,
        ..Config::default()
    });
    // The configured far plane bounds every depth sample.
    let depth = mgr.depth_tensor();
    assert!(depth.as_slice::<f32>().iter().all(|d| *d <= 60.0));
    assert!(Arc::strong_count(&device) >= 2, "manager must borrow, not copy");
}

#[test]
fn test_frames_follow_the_simulation() {
    let mut mgr = render_manager(1);
    let before: Vec<u8> = mgr.rgb_tensor().as_slice::<u8>().to_vec();

    // Spin in place; the rendered view must change.
    for agent in 0..NUM_AGENTS as u32 {
        mgr.set_action(0, agent, 0, 0, 2, 0);
    }
    for _ in 0..10 {
        mgr.step();
    }
    let after = mgr.rgb_tensor();
    assert_ne!(before.as_slice(), after.as_slice::<u8>());
}
