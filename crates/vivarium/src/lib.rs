//! Vivarium - Backend-abstracted multi-world execution manager.
//!
//! Orchestration layer for a massively-parallel, multi-instance simulation
//! used to produce training data for reinforcement-learning agents. The
//! [`Manager`] owns N independent worlds, dispatches one synchronous
//! simulation step across all of them on either a multi-core host backend
//! or a CUDA accelerator backend, and exposes per-world/per-agent state as
//! flat, strided zero-copy tensors.
//!
//! # Example
//!
//! ```rust,ignore
//! use vivarium::{Config, ExecMode, Manager};
//!
//! let mut mgr = Manager::new(Config {
//!     exec_mode: ExecMode::Cpu,
//!     num_worlds: 1024,
//!     auto_reset: true,
//!     rand_seed: 5,
//!     ..Config::default()
//! });
//!
//! loop {
//!     // write actions for every (world, agent) pair ...
//!     mgr.set_action(0, 0, 1, 0, 0, 0);
//!     mgr.step();
//!     let rewards = mgr.reward_tensor();
//!     let _ = rewards.as_slice::<f32>();
//! }
//! ```
//!
//! # Architecture
//!
//! - `assets` converts the static mesh/material/texture set into the
//!   render-asset and physics collision-asset tables.
//! - `backend` selects and drives one of the two execution substrates; the
//!   simulation itself lives in the `vivarium-sim` crate.
//! - `render` optionally rasterizes one RGB/depth frame per (world, agent)
//!   view each step.
//! - `manager` ties the pieces together and owns the interchange contract.

pub mod assets;
pub mod backend;
pub mod manager;
pub mod render;

pub use manager::{default_data_dir, Config, ExecMode, Manager};
pub use render::{LightConfig, RasterDevice, RenderDeviceCfg};

pub use vivarium_core::{ElementType, ExportSlot, SimObject, Tensor};
pub use vivarium_sim::consts;
pub use vivarium_sim::Action;
