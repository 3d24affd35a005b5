//! Headless rollout demo.
//!
//! Runs a handful of worlds with random actions, prints per-episode reward
//! summaries, and optionally dumps the first world's rendered agent views
//! as PNGs.
//!
//! Run with: cargo run --example headless -p vivarium -- [--render]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use vivarium::consts::{EPISODE_LEN, NUM_AGENTS};
use vivarium::{Config, ExecMode, Manager};

const NUM_WORLDS: u32 = 8;

fn main() {
    env_logger::init();
    let render = std::env::args().any(|a| a == "--render");

    let mut mgr = Manager::new(Config {
        exec_mode: ExecMode::Cpu,
        num_worlds: NUM_WORLDS,
        auto_reset: true,
        rand_seed: 1,
        enable_batch_renderer: render,
        batch_render_view_width: 128,
        batch_render_view_height: 128,
        ..Config::default()
    });

    let mut rng = Xoshiro256StarStar::seed_from_u64(2);
    let mut episode_return = vec![0.0f32; (NUM_WORLDS as usize) * NUM_AGENTS];

    for step in 0..EPISODE_LEN {
        for world in 0..NUM_WORLDS {
            for agent in 0..NUM_AGENTS as u32 {
                mgr.set_action(
                    world,
                    agent,
                    rng.gen_range(0..4),
                    rng.gen_range(0..8),
                    rng.gen_range(-2..=2),
                    rng.gen_range(0..=1),
                );
            }
        }
        mgr.step();

        let rewards = mgr.reward_tensor();
        for (acc, r) in episode_return.iter_mut().zip(rewards.as_slice::<f32>()) {
            *acc += r;
        }

        if render && step == 50 {
            dump_views(&mgr);
        }
    }

    println!("episode returns after {EPISODE_LEN} steps:");
    for world in 0..NUM_WORLDS as usize {
        let per_agent: Vec<String> = (0..NUM_AGENTS)
            .map(|a| format!("{:+.3}", episode_return[world * NUM_AGENTS + a]))
            .collect();
        println!("  world {world}: {}", per_agent.join("  "));
    }

    let steps = mgr.steps_remaining_tensor();
    println!(
        "steps remaining (world 0): {}",
        steps.as_slice::<i32>()[0]
    );
}

fn dump_views(mgr: &Manager) {
    let rgb = mgr.rgb_tensor();
    let dims = rgb.dims().to_vec();
    let (h, w) = (dims[2] as u32, dims[3] as u32);
    let pixels = rgb.as_slice::<u8>();
    let view_bytes = (h * w * 4) as usize;
    for agent in 0..NUM_AGENTS {
        let offset = agent * view_bytes;
        let view = &pixels[offset..offset + view_bytes];
        let img = image::RgbaImage::from_raw(w, h, view.to_vec())
            .expect("view buffer matches image dimensions");
        let path = format!("view_w0_a{agent}.png");
        img.save(&path).expect("failed to write view PNG");
        println!("wrote {path}");
    }
}
