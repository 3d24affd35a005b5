//! CUDA accelerator backend.
//!
//! All per-world state and every export buffer lives in device memory; one
//! kernel launch advances every world by one tick. The step kernel
//! (`kernels/escape_room.cu`) mirrors `vivarium_sim::world` statement for
//! statement over byte-identical `#[repr(C)]` layouts, and is compiled once
//! at initialization through NVRTC, so the build needs no CUDA toolchain,
//! only the driver at runtime.
//!
//! Caller-side writes (actions, reset flags) are synchronous single-record
//! host-to-device copies; render read-back is a synchronous device-to-host
//! copy of the world states.

use std::sync::Arc;

use cudarc::driver::{
    CudaDevice, CudaFunction, CudaSlice, DeviceRepr, LaunchAsync, LaunchConfig,
};
use cudarc::nvrtc::compile_ptx;

use vivarium_core::{ExportSlot, ObjectTable};
use vivarium_sim::consts::NUM_AGENTS;
use vivarium_sim::types::{
    Action, Done, DoorObservation, Lidar, PartnerObservations, Reward, RoomEntityObservations,
    SelfObservation, StepsRemaining, WorldReset,
};
use vivarium_sim::world::SimConfig;
use vivarium_sim::WorldState;

const KERNEL_SRC: &str = include_str!("../kernels/escape_room.cu");
const MODULE: &str = "escape_room";
const STEP_FN: &str = "escape_step";

/// Kernel parameter block: raw device addresses plus the scalar config.
/// The CUDA source declares the byte-identical `StepParams` struct.
#[derive(Clone, Copy)]
#[repr(C)]
struct StepParams {
    worlds: u64,
    objects: u64,
    reset: u64,
    actions: u64,
    rewards: u64,
    dones: u64,
    self_obs: u64,
    partner_obs: u64,
    room_ent_obs: u64,
    door_obs: u64,
    lidar: u64,
    steps_remaining: u64,
    num_worlds: i32,
    auto_reset: i32,
    base_seed: u64,
}

unsafe impl DeviceRepr for StepParams {}

/// Device-resident executor for the accelerator-parallel execution mode.
pub struct CudaExecutor {
    device: Arc<CudaDevice>,
    step_fn: CudaFunction,
    worlds: CudaSlice<u8>,
    objects: CudaSlice<u8>,
    reset: CudaSlice<u8>,
    actions: CudaSlice<u8>,
    rewards: CudaSlice<u8>,
    dones: CudaSlice<u8>,
    self_obs: CudaSlice<u8>,
    partner_obs: CudaSlice<u8>,
    room_ent_obs: CudaSlice<u8>,
    door_obs: CudaSlice<u8>,
    lidar: CudaSlice<u8>,
    steps_remaining: CudaSlice<u8>,
    host_states: Vec<WorldState>,
    num_worlds: usize,
    gpu_id: i32,
    sim_cfg: SimConfig,
}

impl CudaExecutor {
    /// Bind the requested device, compile the step kernel, and allocate
    /// every device buffer. Fails (rather than falling back) when the
    /// device cannot be initialized.
    pub fn new(
        gpu_id: i32,
        num_worlds: usize,
        sim_cfg: SimConfig,
        objects: &ObjectTable,
    ) -> Result<Self, String> {
        let device = CudaDevice::new(gpu_id as usize)
            .map_err(|e| format!("device {gpu_id} unavailable: {e}"))?;

        let ptx =
            compile_ptx(KERNEL_SRC).map_err(|e| format!("step kernel compilation failed: {e}"))?;
        device
            .load_ptx(ptx, MODULE, &[STEP_FN])
            .map_err(|e| format!("step kernel load failed: {e}"))?;
        let step_fn = device
            .get_func(MODULE, STEP_FN)
            .ok_or_else(|| format!("kernel '{STEP_FN}' missing from module"))?;

        let per_agent = num_worlds * NUM_AGENTS;
        let alloc = |elems: usize| -> Result<CudaSlice<u8>, String> {
            device.alloc_zeros::<u8>(elems).map_err(|e| e.to_string())
        };

        let object_bytes = bytemuck::cast_slice::<_, u8>(&objects.metadata);
        let mut object_buf = alloc(object_bytes.len())?;
        device
            .htod_sync_copy_into(object_bytes, &mut object_buf)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            step_fn,
            worlds: alloc(num_worlds * std::mem::size_of::<WorldState>())?,
            objects: object_buf,
            reset: alloc(num_worlds * std::mem::size_of::<WorldReset>())?,
            actions: alloc(per_agent * std::mem::size_of::<Action>())?,
            rewards: alloc(per_agent * std::mem::size_of::<Reward>())?,
            dones: alloc(per_agent * std::mem::size_of::<Done>())?,
            self_obs: alloc(per_agent * std::mem::size_of::<SelfObservation>())?,
            partner_obs: alloc(per_agent * std::mem::size_of::<PartnerObservations>())?,
            room_ent_obs: alloc(per_agent * std::mem::size_of::<RoomEntityObservations>())?,
            door_obs: alloc(per_agent * std::mem::size_of::<DoorObservation>())?,
            lidar: alloc(per_agent * std::mem::size_of::<Lidar>())?,
            steps_remaining: alloc(per_agent * std::mem::size_of::<StepsRemaining>())?,
            host_states: vec![WorldState::default(); num_worlds],
            num_worlds,
            gpu_id,
            sim_cfg,
            device,
        })
    }

    /// Launch the precompiled step graph across all worlds and wait for it.
    pub fn run(&mut self) {
        use cudarc::driver::DevicePtr;
        let params = StepParams {
            worlds: *self.worlds.device_ptr(),
            objects: *self.objects.device_ptr(),
            reset: *self.reset.device_ptr(),
            actions: *self.actions.device_ptr(),
            rewards: *self.rewards.device_ptr(),
            dones: *self.dones.device_ptr(),
            self_obs: *self.self_obs.device_ptr(),
            partner_obs: *self.partner_obs.device_ptr(),
            room_ent_obs: *self.room_ent_obs.device_ptr(),
            door_obs: *self.door_obs.device_ptr(),
            lidar: *self.lidar.device_ptr(),
            steps_remaining: *self.steps_remaining.device_ptr(),
            num_worlds: self.num_worlds as i32,
            auto_reset: self.sim_cfg.auto_reset as i32,
            base_seed: self.sim_cfg.base_seed,
        };
        let cfg = LaunchConfig::for_num_elems(self.num_worlds as u32);
        // A failed launch or sync leaves the device in an unknown state;
        // per the error model this is unrecoverable.
        unsafe { self.step_fn.clone().launch(cfg, (params,)) }
            .unwrap_or_else(|e| vivarium_core::fatal!("step kernel launch failed: {e}"));
        self.device
            .synchronize()
            .unwrap_or_else(|e| vivarium_core::fatal!("device synchronize failed: {e}"));
    }

    /// Raw device address of an export buffer.
    pub fn export_ptr(&self, slot: ExportSlot) -> u64 {
        use cudarc::driver::DevicePtr;
        let slice = match slot {
            ExportSlot::Reset => &self.reset,
            ExportSlot::Action => &self.actions,
            ExportSlot::Reward => &self.rewards,
            ExportSlot::Done => &self.dones,
            ExportSlot::SelfObservation => &self.self_obs,
            ExportSlot::PartnerObservations => &self.partner_obs,
            ExportSlot::RoomEntityObservations => &self.room_ent_obs,
            ExportSlot::DoorObservation => &self.door_obs,
            ExportSlot::Lidar => &self.lidar,
            ExportSlot::StepsRemaining => &self.steps_remaining,
        };
        *slice.device_ptr()
    }

    pub fn gpu_id(&self) -> i32 {
        self.gpu_id
    }

    /// Synchronous single-record host-to-device copy of one reset flag.
    /// The buffer lives in device memory host code cannot write directly.
    pub fn write_reset(&mut self, world: usize, value: WorldReset) {
        debug_assert!(world < self.num_worlds);
        self.write_record(ExportSlot::Reset, world, bytemuck::bytes_of(&value));
    }

    /// Synchronous single-record host-to-device copy of one action.
    pub fn write_action(&mut self, index: usize, action: Action) {
        debug_assert!(index < self.num_worlds * NUM_AGENTS);
        self.write_record(ExportSlot::Action, index, bytemuck::bytes_of(&action));
    }

    fn write_record(&mut self, slot: ExportSlot, index: usize, bytes: &[u8]) {
        let offset = index * bytes.len();
        let buf = match slot {
            ExportSlot::Reset => &mut self.reset,
            ExportSlot::Action => &mut self.actions,
            _ => unreachable!("only caller-writable slots take host writes"),
        };
        let mut view = buf.slice_mut(offset..offset + bytes.len());
        self.device
            .htod_sync_copy_into(bytes, &mut view)
            .unwrap_or_else(|e| vivarium_core::fatal!("host-to-device record copy failed: {e}"));
    }

    /// Synchronous device read-back of every world's simulation state, for
    /// render-instance extraction.
    pub fn read_world_states(&mut self) -> &[WorldState] {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.host_states);
        self.device
            .dtoh_sync_copy_into(&self.worlds, bytes)
            .unwrap_or_else(|e| vivarium_core::fatal!("device state read-back failed: {e}"));
        &self.host_states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_sim::consts::EPISODE_LEN;
    use vivarium_sim::world::testing;

    fn executor(num_worlds: usize, seed: u64) -> CudaExecutor {
        CudaExecutor::new(
            0,
            num_worlds,
            SimConfig {
                auto_reset: false,
                base_seed: seed,
            },
            &testing::object_table(),
        )
        .expect("CUDA device required")
    }

    #[test]
    #[ignore] // Only run where a CUDA device is available.
    fn test_warmup_and_countdown() {
        let mut exec = executor(4, 7);
        for w in 0..4 {
            exec.write_reset(w, WorldReset { reset: 1 });
        }
        exec.run();
        let states = exec.read_world_states().to_vec();
        for state in &states {
            assert_eq!(state.steps_remaining, EPISODE_LEN);
        }
        exec.run();
        let states = exec.read_world_states().to_vec();
        for state in &states {
            assert_eq!(state.steps_remaining, EPISODE_LEN - 1);
        }
    }

    #[test]
    #[ignore] // Only run where a CUDA device is available.
    fn test_matches_host_backend() {
        use vivarium_sim::{step_world, WorldIo};

        let seed = 99;
        let mut gpu = executor(2, seed);
        for w in 0..2 {
            gpu.write_reset(w, WorldReset { reset: 1 });
        }
        gpu.run();

        // Host reference for world 0 with the same seed and actions.
        let objects = testing::object_table();
        let cfg = SimConfig {
            auto_reset: false,
            base_seed: seed,
        };
        let mut state = WorldState::default();
        let mut reset = WorldReset { reset: 1 };
        let actions = [Action { move_amount: 3, move_angle: 0, rotate: 1, grab: 0 };
            NUM_AGENTS];
        let mut rewards = [Reward::default(); NUM_AGENTS];
        let mut dones = [Done::default(); NUM_AGENTS];
        let mut self_obs = [SelfObservation::default(); NUM_AGENTS];
        let mut partner_obs = [PartnerObservations::default(); NUM_AGENTS];
        let mut room_ent_obs = [RoomEntityObservations::default(); NUM_AGENTS];
        let mut door_obs = [DoorObservation::default(); NUM_AGENTS];
        let mut lidar = [Lidar::default(); NUM_AGENTS];
        let mut steps = [StepsRemaining::default(); NUM_AGENTS];
        let mut host_step = |reset: &mut WorldReset, state: &mut WorldState| {
            let mut io = WorldIo {
                reset,
                actions: &actions,
                rewards: &mut rewards,
                dones: &mut dones,
                self_obs: &mut self_obs,
                partner_obs: &mut partner_obs,
                room_ent_obs: &mut room_ent_obs,
                door_obs: &mut door_obs,
                lidar: &mut lidar,
                steps_remaining: &mut steps,
            };
            step_world(0, state, &mut io, &cfg, &objects);
        };
        host_step(&mut reset, &mut state);

        for a in 0..NUM_AGENTS {
            gpu.write_action(a, actions[a]);
        }
        for _ in 0..20 {
            gpu.run();
            host_step(&mut reset, &mut state);
        }

        let gpu_state = gpu.read_world_states()[0];
        // Level layout is integer-RNG driven and must match exactly; float
        // dynamics may differ by transcendental rounding.
        assert_eq!(gpu_state.rooms[0].num_buttons, state.rooms[0].num_buttons);
        assert_eq!(gpu_state.steps_remaining, state.steps_remaining);
        for a in 0..NUM_AGENTS {
            for axis in 0..2 {
                assert!(
                    (gpu_state.agents[a].pos[axis] - state.agents[a].pos[axis]).abs() < 1e-3,
                    "agent {a} axis {axis} diverged"
                );
            }
        }
    }
}
