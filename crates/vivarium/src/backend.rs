//! Execution backends.
//!
//! [`Backend`] is the closed set of execution substrates: the host-parallel
//! executor defined here and, behind the `cuda` feature, the
//! accelerator-parallel executor from `vivarium-cuda`. Exactly one variant
//! is live per manager; selection happens once at construction and the
//! handle is never reassigned.
//!
//! Both variants obey the same memory discipline: every interchange buffer
//! is allocated once at init and keeps a stable address for the life of the
//! backend. The caller writes actions and reset flags between steps, the
//! simulation writes everything else during a step, and each buffer has
//! exactly one writer.

use std::sync::Arc;

use rayon::prelude::*;

use vivarium_core::{ExportSlot, ObjectTable, Tensor};
use vivarium_sim::consts::NUM_AGENTS;
use vivarium_sim::{
    step_world, Action, Done, DoorObservation, Lidar, PartnerObservations,
    RoomEntityObservations, Reward, SelfObservation, SimConfig, StepsRemaining, WorldIo,
    WorldReset, WorldState,
};

/// Host-memory arenas for every export slot. One typed vector per slot,
/// laid out `[world]` or `[world * agent]` exactly as the exported tensor
/// shapes advertise.
pub struct ExportArenas {
    pub reset: Vec<WorldReset>,
    pub actions: Vec<Action>,
    pub rewards: Vec<Reward>,
    pub dones: Vec<Done>,
    pub self_obs: Vec<SelfObservation>,
    pub partner_obs: Vec<PartnerObservations>,
    pub room_ent_obs: Vec<RoomEntityObservations>,
    pub door_obs: Vec<DoorObservation>,
    pub lidar: Vec<Lidar>,
    pub steps_remaining: Vec<StepsRemaining>,
}

impl ExportArenas {
    pub fn new(num_worlds: usize) -> Self {
        let per_agent = num_worlds * NUM_AGENTS;
        Self {
            reset: vec![Default::default(); num_worlds],
            actions: vec![Default::default(); per_agent],
            rewards: vec![Default::default(); per_agent],
            dones: vec![Default::default(); per_agent],
            self_obs: vec![Default::default(); per_agent],
            partner_obs: vec![Default::default(); per_agent],
            room_ent_obs: vec![Default::default(); per_agent],
            door_obs: vec![Default::default(); per_agent],
            lidar: vec![Default::default(); per_agent],
            steps_remaining: vec![Default::default(); per_agent],
        }
    }

    /// Carve the arenas into disjoint per-world views. The split is what
    /// makes the parallel fan-out safe: no two worlds ever alias a slice.
    fn carve(&mut self, num_worlds: usize) -> Vec<WorldIo<'_>> {
        let mut reset = self.reset.as_mut_slice();
        let mut actions = self.actions.as_slice();
        let mut rewards = self.rewards.as_mut_slice();
        let mut dones = self.dones.as_mut_slice();
        let mut self_obs = self.self_obs.as_mut_slice();
        let mut partner_obs = self.partner_obs.as_mut_slice();
        let mut room_ent_obs = self.room_ent_obs.as_mut_slice();
        let mut door_obs = self.door_obs.as_mut_slice();
        let mut lidar = self.lidar.as_mut_slice();
        let mut steps_remaining = self.steps_remaining.as_mut_slice();

        let mut views = Vec::with_capacity(num_worlds);
        for _ in 0..num_worlds {
            let (reset_head, reset_tail) = std::mem::take(&mut reset).split_at_mut(1);
            reset = reset_tail;
            let (actions_head, actions_tail) = actions.split_at(NUM_AGENTS);
            actions = actions_tail;

            macro_rules! take_agents {
                ($slice:ident) => {{
                    let (head, tail) = std::mem::take(&mut $slice).split_at_mut(NUM_AGENTS);
                    $slice = tail;
                    head
                }};
            }

            views.push(WorldIo {
                reset: &mut reset_head[0],
                actions: actions_head,
                rewards: take_agents!(rewards),
                dones: take_agents!(dones),
                self_obs: take_agents!(self_obs),
                partner_obs: take_agents!(partner_obs),
                room_ent_obs: take_agents!(room_ent_obs),
                door_obs: take_agents!(door_obs),
                lidar: take_agents!(lidar),
                steps_remaining: take_agents!(steps_remaining),
            });
        }
        views
    }
}

/// Host-parallel executor: all worlds in host memory, stepped across a
/// private worker pool, one unit of work per world.
pub struct CpuExecutor {
    worlds: Vec<WorldState>,
    arenas: ExportArenas,
    pool: rayon::ThreadPool,
    sim_cfg: SimConfig,
    objects: Arc<ObjectTable>,
}

impl CpuExecutor {
    pub fn new(
        num_worlds: usize,
        sim_cfg: SimConfig,
        objects: Arc<ObjectTable>,
    ) -> Result<Self, String> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(num_worlds.max(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("vivarium-world-{i}"))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            worlds: vec![WorldState::default(); num_worlds],
            arenas: ExportArenas::new(num_worlds),
            pool,
            sim_cfg,
            objects,
        })
    }

    /// Advance every world by one tick. Blocks until all worlds complete.
    pub fn run(&mut self) {
        let Self {
            worlds,
            arenas,
            pool,
            sim_cfg,
            objects,
        } = self;
        let num_worlds = worlds.len();
        let views = arenas.carve(num_worlds);
        let cfg = *sim_cfg;
        let objects = Arc::clone(objects);
        pool.install(|| {
            worlds
                .par_iter_mut()
                .enumerate()
                .zip(views)
                .for_each(|((idx, state), mut io)| {
                    step_world(idx as u32, state, &mut io, &cfg, &objects);
                });
        });
    }

    pub fn arenas(&self) -> &ExportArenas {
        &self.arenas
    }

    pub fn world_states(&self) -> &[WorldState] {
        &self.worlds
    }

    pub fn write_reset(&mut self, world: usize, value: WorldReset) {
        self.arenas.reset[world] = value;
    }

    pub fn write_action(&mut self, index: usize, action: Action) {
        self.arenas.actions[index] = action;
    }

    fn tensor(&self, slot: ExportSlot, dims: Vec<i64>) -> Tensor<'_> {
        let elem = slot.element_type();
        let arenas = &self.arenas;
        match slot {
            ExportSlot::Reset => Tensor::from_host_slice(&arenas.reset, elem, dims),
            ExportSlot::Action => Tensor::from_host_slice(&arenas.actions, elem, dims),
            ExportSlot::Reward => Tensor::from_host_slice(&arenas.rewards, elem, dims),
            ExportSlot::Done => Tensor::from_host_slice(&arenas.dones, elem, dims),
            ExportSlot::SelfObservation => Tensor::from_host_slice(&arenas.self_obs, elem, dims),
            ExportSlot::PartnerObservations => {
                Tensor::from_host_slice(&arenas.partner_obs, elem, dims)
            }
            ExportSlot::RoomEntityObservations => {
                Tensor::from_host_slice(&arenas.room_ent_obs, elem, dims)
            }
            ExportSlot::DoorObservation => Tensor::from_host_slice(&arenas.door_obs, elem, dims),
            ExportSlot::Lidar => Tensor::from_host_slice(&arenas.lidar, elem, dims),
            ExportSlot::StepsRemaining => {
                Tensor::from_host_slice(&arenas.steps_remaining, elem, dims)
            }
        }
    }
}

/// The closed set of execution backends.
pub enum Backend {
    Cpu(CpuExecutor),
    #[cfg(feature = "cuda")]
    Cuda(vivarium_cuda::CudaExecutor),
}

impl Backend {
    /// Run one synchronous step across all worlds.
    pub fn run(&mut self) {
        match self {
            Backend::Cpu(exec) => exec.run(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(exec) => exec.run(),
        }
    }

    /// Export one slot as a typed, shaped, zero-copy tensor view.
    pub fn tensor(&self, slot: ExportSlot, dims: Vec<i64>) -> Tensor<'_> {
        match self {
            Backend::Cpu(exec) => exec.tensor(slot, dims),
            #[cfg(feature = "cuda")]
            Backend::Cuda(exec) => Tensor::from_device_ptr(
                exec.export_ptr(slot),
                slot.element_type(),
                dims,
                exec.gpu_id(),
            ),
        }
    }

    /// Write one world's reset record. Direct store on the host backend; a
    /// synchronous host-to-device copy of the single record on CUDA.
    pub fn write_reset(&mut self, world: usize, value: WorldReset) {
        match self {
            Backend::Cpu(exec) => exec.write_reset(world, value),
            #[cfg(feature = "cuda")]
            Backend::Cuda(exec) => exec.write_reset(world, value),
        }
    }

    /// Write one agent's action record at `world * NUM_AGENTS + agent`.
    /// Same dual-path discipline as [`Backend::write_reset`].
    pub fn write_action(&mut self, index: usize, action: Action) {
        match self {
            Backend::Cpu(exec) => exec.write_action(index, action),
            #[cfg(feature = "cuda")]
            Backend::Cuda(exec) => exec.write_action(index, action),
        }
    }

    /// Per-world simulation state for render read-back. Borrowed in place
    /// on the host backend; synchronously copied back on CUDA.
    pub fn world_states(&mut self) -> &[WorldState] {
        match self {
            Backend::Cpu(exec) => exec.world_states(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(exec) => exec.read_world_states(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_sim::consts::EPISODE_LEN;
    use vivarium_sim::world::testing;

    fn executor(num_worlds: usize, seed: u64) -> CpuExecutor {
        CpuExecutor::new(
            num_worlds,
            SimConfig {
                auto_reset: false,
                base_seed: seed,
            },
            Arc::new(testing::object_table()),
        )
        .unwrap()
    }

    fn warm_up(exec: &mut CpuExecutor) {
        for w in 0..exec.world_states().len() {
            exec.write_reset(w, WorldReset { reset: 1 });
        }
        exec.run();
    }

    #[test]
    fn test_step_updates_every_world() {
        let mut exec = executor(8, 1);
        warm_up(&mut exec);
        for w in 0..8 {
            assert_eq!(exec.arenas().steps_remaining[w * NUM_AGENTS].t, EPISODE_LEN);
        }
        exec.run();
        for w in 0..8 {
            assert_eq!(
                exec.arenas().steps_remaining[w * NUM_AGENTS].t,
                EPISODE_LEN - 1
            );
        }
    }

    #[test]
    fn test_parallel_matches_repeat_run() {
        // Rayon scheduling must not leak into results: two executors with
        // the same seed stay bit-identical over many steps.
        let mut a = executor(16, 77);
        let mut b = executor(16, 77);
        warm_up(&mut a);
        warm_up(&mut b);
        for w in 0..16 {
            a.write_action(
                w * NUM_AGENTS,
                Action { move_amount: 3, move_angle: (w % 8) as i32, rotate: 0, grab: 0 },
            );
            b.write_action(
                w * NUM_AGENTS,
                Action { move_amount: 3, move_angle: (w % 8) as i32, rotate: 0, grab: 0 },
            );
        }
        for _ in 0..25 {
            a.run();
            b.run();
        }
        assert_eq!(a.world_states(), b.world_states());
        assert_eq!(a.arenas().rewards, b.arenas().rewards);
        assert_eq!(a.arenas().lidar, b.arenas().lidar);
    }

    #[test]
    fn test_cross_world_isolation() {
        let mut a = executor(4, 5);
        let mut b = executor(4, 5);
        warm_up(&mut a);
        warm_up(&mut b);
        // Drive world 2 differently in `b`; other worlds must be unaffected.
        b.write_action(
            2 * NUM_AGENTS,
            Action { move_amount: 3, move_angle: 0, rotate: 1, grab: 0 },
        );
        for _ in 0..10 {
            a.run();
            b.run();
        }
        for w in [0usize, 1, 3] {
            assert_eq!(a.world_states()[w], b.world_states()[w], "world {w} diverged");
        }
        assert_ne!(a.world_states()[2], b.world_states()[2]);
    }

    #[test]
    fn test_tensor_views_are_zero_copy() {
        let mut exec = executor(2, 3);
        warm_up(&mut exec);
        let t = exec.tensor(ExportSlot::StepsRemaining, vec![2, NUM_AGENTS as i64, 1]);
        assert_eq!(t.as_slice::<i32>(), &[EPISODE_LEN; 4]);
        let actions = exec.tensor(ExportSlot::Action, vec![2, NUM_AGENTS as i64, 4]);
        assert_eq!(actions.as_slice::<i32>().len(), 2 * NUM_AGENTS * 4);
    }
}
