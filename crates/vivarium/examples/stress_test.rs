//! Stress test / benchmark for manager step throughput.
//!
//! Measures world-steps per second on the host backend under random action
//! load.
//!
//! Run with: cargo run --example stress_test --release -p vivarium

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use vivarium::consts::NUM_AGENTS;
use vivarium::{Config, ExecMode, Manager};

const NUM_WORLDS: u32 = 1024;
const WARMUP_STEPS: u32 = 50;
const MEASURED_STEPS: u32 = 500;

fn main() {
    env_logger::init();

    println!("{}", "=".repeat(70));
    println!("VIVARIUM MANAGER STRESS TEST");
    println!("{}", "=".repeat(70));
    println!("Worlds: {NUM_WORLDS}");
    println!("Agents per world: {NUM_AGENTS}");
    println!("Steps: {MEASURED_STEPS} (+{WARMUP_STEPS} warmup)");
    println!();

    let mut mgr = Manager::new(Config {
        exec_mode: ExecMode::Cpu,
        num_worlds: NUM_WORLDS,
        auto_reset: true,
        rand_seed: 42,
        ..Config::default()
    });

    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let mut drive = |mgr: &mut Manager, rng: &mut Xoshiro256StarStar| {
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
    };

    for _ in 0..WARMUP_STEPS {
        drive(&mut mgr, &mut rng);
    }

    let start = Instant::now();
    for _ in 0..MEASURED_STEPS {
        drive(&mut mgr, &mut rng);
    }
    let elapsed = start.elapsed();

    let world_steps = NUM_WORLDS as u64 * MEASURED_STEPS as u64;
    let sps = world_steps as f64 / elapsed.as_secs_f64();
    println!("Elapsed: {:.2}s", elapsed.as_secs_f64());
    println!("Manager steps/s: {:.1}", MEASURED_STEPS as f64 / elapsed.as_secs_f64());
    println!("World steps/s: {sps:.0}");

    let rewards = mgr.reward_tensor();
    let mean: f32 =
        rewards.as_slice::<f32>().iter().sum::<f32>() / rewards.num_elements() as f32;
    println!("Mean reward at end: {mean:.4}");
}
