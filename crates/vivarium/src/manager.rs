//! The backend-abstracted multi-world execution manager.
//!
//! Owns the lifecycle of N independent simulation worlds: selects and
//! initializes one execution backend, loads the static asset tables,
//! owns the interchange buffers, and drives one synchronous step per
//! [`Manager::step`] call. Construction performs the mandatory warm-up
//! step so every world has valid post-reset observations before the first
//! externally visible step.
//!
//! The manager is single-threaded from the caller's perspective: exactly
//! one `step` is in flight at a time, and action/reset writes must
//! happen-before the step that should observe them.

use std::path::PathBuf;
use std::sync::Arc;

use vivarium_core::{fatal, ExportSlot, Tensor};
use vivarium_sim::consts::*;
use vivarium_sim::{Action, SimConfig, WorldReset};

use crate::assets;
use crate::backend::{Backend, CpuExecutor};
use crate::render::{RasterDevice, RenderDeviceCfg, RenderManager};

/// Execution substrate, chosen once at construction. There is no runtime
/// fallback between modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Multi-core host backend.
    Cpu,
    /// Hardware-accelerated parallel backend (`cuda` feature).
    Cuda,
}

/// Construction configuration for [`Manager`].
#[derive(Clone, Debug)]
pub struct Config {
    pub exec_mode: ExecMode,
    pub num_worlds: u32,
    /// Accelerator device ordinal; only meaningful in [`ExecMode::Cuda`].
    pub gpu_id: i32,
    /// Re-arm each world's reset flag automatically when its episode ends.
    pub auto_reset: bool,
    pub rand_seed: u64,
    /// Render-device attachment: none, owned, or caller-supplied.
    pub render_device: RenderDeviceCfg,
    /// Produce per-(world, agent) RGB/depth frames every step.
    pub enable_batch_renderer: bool,
    pub batch_render_view_width: u32,
    pub batch_render_view_height: u32,
    /// Directory holding the fixed static asset set.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_mode: ExecMode::Cpu,
            num_worlds: 1,
            gpu_id: 0,
            auto_reset: false,
            rand_seed: 0,
            render_device: RenderDeviceCfg::Disabled,
            enable_batch_renderer: false,
            batch_render_view_width: 64,
            batch_render_view_height: 64,
            data_dir: default_data_dir(),
        }
    }
}

/// The `data/` directory at the workspace root.
pub fn default_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

pub struct Manager {
    cfg: Config,
    backend: Backend,
    render_mgr: Option<RenderManager>,
}

impl Manager {
    /// Build the manager: load assets, initialize the selected backend,
    /// attach the render manager when configured, then warm up.
    ///
    /// Any configuration or load failure is fatal; no partially
    /// initialized manager is ever returned.
    pub fn new(cfg: Config) -> Self {
        validate(&cfg);

        let physics = assets::load_physics_assets(&cfg.data_dir)
            .unwrap_or_else(|e| fatal!("failed to load collision assets: {e}"));
        let objects = Arc::new(physics.table);
        log::info!(
            "loaded physics assets: {} hulls across {} kinds",
            physics.hulls.iter().map(Vec::len).sum::<usize>(),
            physics.hulls.iter().filter(|h| !h.is_empty()).count(),
        );

        // Resolve the render-device choice before constructing worlds; the
        // per-world render wiring is fixed at construction time.
        let render_device = match &cfg.render_device {
            RenderDeviceCfg::Disabled if cfg.enable_batch_renderer => {
                Some(Arc::new(RasterDevice::default()))
            }
            RenderDeviceCfg::Disabled => None,
            RenderDeviceCfg::Owned => Some(Arc::new(RasterDevice::default())),
            RenderDeviceCfg::External(device) => Some(Arc::clone(device)),
        };
        let render_mgr = render_device.map(|device| {
            let render_assets = assets::load_render_assets(&cfg.data_dir)
                .unwrap_or_else(|e| fatal!("failed to load render assets: {e}"));
            RenderManager::new(
                device,
                render_assets,
                cfg.num_worlds as usize,
                cfg.batch_render_view_width,
                cfg.batch_render_view_height,
            )
        });

        let sim_cfg = SimConfig {
            auto_reset: cfg.auto_reset,
            base_seed: cfg.rand_seed,
        };

        let backend = match cfg.exec_mode {
            ExecMode::Cpu => {
                let exec = CpuExecutor::new(cfg.num_worlds as usize, sim_cfg, objects)
                    .unwrap_or_else(|e| fatal!("host backend init failed: {e}"));
                Backend::Cpu(exec)
            }
            #[cfg(feature = "cuda")]
            ExecMode::Cuda => {
                let exec = vivarium_cuda::CudaExecutor::new(
                    cfg.gpu_id,
                    cfg.num_worlds as usize,
                    sim_cfg,
                    &objects,
                )
                .unwrap_or_else(|e| fatal!("accelerator backend init failed: {e}"));
                Backend::Cuda(exec)
            }
            #[cfg(not(feature = "cuda"))]
            ExecMode::Cuda => {
                fatal!("vivarium was not compiled with CUDA support (enable the `cuda` feature)")
            }
        };

        let mut mgr = Self {
            cfg,
            backend,
            render_mgr,
        };

        // The simulation has no way to construct directly into a valid
        // post-reset observation state: a reset only takes effect through a
        // step. Force-reset every world and burn one step so the first
        // visible state is a coherent fresh episode.
        for world in 0..mgr.cfg.num_worlds {
            mgr.trigger_reset(world);
        }
        mgr.step();

        mgr
    }

    /// Advance every world by exactly one tick. Blocks until all worlds
    /// (and, when enabled, all rendered views) are complete.
    pub fn step(&mut self) {
        self.backend.run();

        if let Some(render_mgr) = &mut self.render_mgr {
            render_mgr.read_state(&mut self.backend);
            if self.cfg.enable_batch_renderer {
                render_mgr.batch_render();
            }
        }
    }

    /// Request that a world's episode be terminated and regenerated on the
    /// next step.
    pub fn trigger_reset(&mut self, world: u32) {
        debug_assert!(world < self.cfg.num_worlds, "world index out of range");
        self.backend.write_reset(world as usize, WorldReset { reset: 1 });
    }

    /// Set one agent's action record for the next step. Field values are
    /// clamped to their documented bucket ranges.
    pub fn set_action(
        &mut self,
        world: u32,
        agent: u32,
        move_amount: i32,
        move_angle: i32,
        rotate: i32,
        grab: i32,
    ) {
        debug_assert!(world < self.cfg.num_worlds, "world index out of range");
        debug_assert!((agent as usize) < NUM_AGENTS, "agent index out of range");
        let action = Action {
            move_amount: move_amount.clamp(0, NUM_MOVE_AMOUNT_BUCKETS - 1),
            move_angle: move_angle.clamp(0, NUM_MOVE_ANGLE_BUCKETS - 1),
            rotate: rotate.clamp(-(NUM_TURN_BUCKETS / 2), NUM_TURN_BUCKETS / 2),
            grab: grab.clamp(0, 1),
        };
        let index = world as usize * NUM_AGENTS + agent as usize;
        self.backend.write_action(index, action);
    }

    pub fn num_worlds(&self) -> u32 {
        self.cfg.num_worlds
    }

    // ========================================================================
    // Exported tensors
    // ========================================================================

    pub fn reset_tensor(&self) -> Tensor<'_> {
        self.export(ExportSlot::Reset, vec![self.worlds_dim(), 1])
    }

    pub fn action_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::Action,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 4],
        )
    }

    pub fn reward_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::Reward,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 1],
        )
    }

    pub fn done_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::Done,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 1],
        )
    }

    pub fn self_observation_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::SelfObservation,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 8],
        )
    }

    pub fn partner_observations_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::PartnerObservations,
            vec![self.worlds_dim(), NUM_AGENTS as i64, NUM_AGENTS as i64 - 1, 3],
        )
    }

    pub fn room_entity_observations_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::RoomEntityObservations,
            vec![
                self.worlds_dim(),
                NUM_AGENTS as i64,
                MAX_ENTITIES_PER_ROOM as i64,
                3,
            ],
        )
    }

    pub fn door_observation_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::DoorObservation,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 3],
        )
    }

    pub fn lidar_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::Lidar,
            vec![
                self.worlds_dim(),
                NUM_AGENTS as i64,
                NUM_LIDAR_SAMPLES as i64,
                2,
            ],
        )
    }

    pub fn steps_remaining_tensor(&self) -> Tensor<'_> {
        self.export(
            ExportSlot::StepsRemaining,
            vec![self.worlds_dim(), NUM_AGENTS as i64, 1],
        )
    }

    /// RGBA8 frames, `[W, A, H, W, 4]`. Only available when batch
    /// rendering is enabled.
    pub fn rgb_tensor(&self) -> Tensor<'_> {
        let render_mgr = self.batch_renderer();
        Tensor::from_host_slice(
            render_mgr.rgb_buffer(),
            vivarium_core::ElementType::U8,
            vec![
                self.worlds_dim(),
                NUM_AGENTS as i64,
                render_mgr.view_height() as i64,
                render_mgr.view_width() as i64,
                4,
            ],
        )
    }

    /// Per-view depth, `[W, A, H, W, 1]`. Only available when batch
    /// rendering is enabled.
    pub fn depth_tensor(&self) -> Tensor<'_> {
        let render_mgr = self.batch_renderer();
        Tensor::from_host_slice(
            render_mgr.depth_buffer(),
            vivarium_core::ElementType::F32,
            vec![
                self.worlds_dim(),
                NUM_AGENTS as i64,
                render_mgr.view_height() as i64,
                render_mgr.view_width() as i64,
                1,
            ],
        )
    }

    fn batch_renderer(&self) -> &RenderManager {
        if !self.cfg.enable_batch_renderer {
            fatal!("image tensors requested but batch rendering is not enabled");
        }
        self.render_mgr
            .as_ref()
            .unwrap_or_else(|| fatal!("batch renderer missing despite being enabled"))
    }

    fn export(&self, slot: ExportSlot, dims: Vec<i64>) -> Tensor<'_> {
        self.backend.tensor(slot, dims)
    }

    #[inline]
    fn worlds_dim(&self) -> i64 {
        self.cfg.num_worlds as i64
    }
}

fn validate(cfg: &Config) {
    if cfg.num_worlds == 0 {
        fatal!("invalid configuration for 'num_worlds': must be at least 1");
    }
    let rendering = cfg.enable_batch_renderer
        || !matches!(cfg.render_device, RenderDeviceCfg::Disabled);
    if rendering && (cfg.batch_render_view_width == 0 || cfg.batch_render_view_height == 0) {
        fatal!("invalid configuration for 'batch_render_view': dimensions must be nonzero");
    }
}
