//! Batch render manager.
//!
//! Optional component that turns per-world simulation state into one RGBA8
//! + depth frame per (world, agent) view each step. It receives the static
//! render-asset table once at initialization, pulls instance transforms
//! from the active backend after every step (`read_state`), and rasterizes
//! all views (`batch_render`). The per-world instance schema is wired at
//! construction and never changes; episode resets only move instances.

pub mod raster;

use std::sync::Arc;

use rayon::prelude::*;

use vivarium_core::SimObject;
use vivarium_sim::consts::*;
use vivarium_sim::{WorldState, GRAB_NONE};

use crate::assets::RenderAssets;
use crate::backend::Backend;
use raster::{render_view, ViewTarget};

/// Rasterizer device handle: projection parameters shared by every view.
///
/// A caller embedding the manager in its own visualization stack can hand
/// the same device to several managers; otherwise the manager owns one.
#[derive(Clone, Copy, Debug)]
pub struct RasterDevice {
    pub near: f32,
    pub far: f32,
    pub fov_y_degrees: f32,
}

impl Default for RasterDevice {
    fn default() -> Self {
        Self {
            near: 0.05,
            far: 100.0,
            fov_y_degrees: 90.0,
        }
    }
}

/// The three legal render-device configurations. Owning a device and
/// borrowing one are mutually exclusive by construction.
#[derive(Clone, Debug, Default)]
pub enum RenderDeviceCfg {
    /// No render manager is created.
    #[default]
    Disabled,
    /// The manager acquires and owns its own rasterizer device.
    Owned,
    /// A caller-supplied device is used directly.
    External(Arc<RasterDevice>),
}

/// One directional light.
#[derive(Clone, Copy, Debug)]
pub struct LightConfig {
    pub active: bool,
    pub direction: [f32; 3],
    pub color: [f32; 3],
}

/// Per-instance transform refreshed from simulation state each step.
#[derive(Clone, Copy, Debug)]
pub struct InstanceXform {
    pub kind: SimObject,
    pub pos: [f32; 3],
    pub yaw: f32,
    pub scale: [f32; 3],
    pub visible: bool,
}

pub struct RenderManager {
    device: Arc<RasterDevice>,
    assets: RenderAssets,
    lights: Vec<LightConfig>,
    num_worlds: usize,
    view_width: u32,
    view_height: u32,
    /// `instances_per_world` slots per world, fixed at construction.
    instances: Vec<InstanceXform>,
    instances_per_world: usize,
    rgb: Vec<u8>,
    depth: Vec<f32>,
}

/// Fixed slot count per world: ground plane, three border walls, the
/// agents, per-room door plus two wall segments plus button/cube slots,
/// and the court props.
const SLOTS_PER_ROOM: usize = 3 + MAX_BUTTONS_PER_ROOM + MAX_CUBES_PER_ROOM;
const SLOTS_PER_WORLD: usize = 1 + 3 + NUM_AGENTS + NUM_ROOMS * SLOTS_PER_ROOM + 3;

/// Index of the first agent slot within a world's instance block.
const AGENT_SLOT_BASE: usize = 1 + 3;

impl RenderManager {
    pub fn new(
        device: Arc<RasterDevice>,
        assets: RenderAssets,
        num_worlds: usize,
        view_width: u32,
        view_height: u32,
    ) -> Self {
        let views = num_worlds * NUM_AGENTS;
        let pixels = (view_width * view_height) as usize;
        let mut mgr = Self {
            device,
            assets,
            lights: Vec::new(),
            num_worlds,
            view_width,
            view_height,
            instances: vec![
                InstanceXform {
                    kind: SimObject::Plane,
                    pos: [0.0; 3],
                    yaw: 0.0,
                    scale: [1.0; 3],
                    visible: false,
                };
                num_worlds * SLOTS_PER_WORLD
            ],
            instances_per_world: SLOTS_PER_WORLD,
            rgb: vec![0; views * pixels * 4],
            depth: vec![0.0; views * pixels],
        };
        mgr.configure_lighting(&[LightConfig {
            active: true,
            direction: [1.0, 1.0, -2.0],
            color: [1.0, 1.0, 1.0],
        }]);
        mgr
    }

    /// Replace the light set used by every subsequent frame.
    pub fn configure_lighting(&mut self, lights: &[LightConfig]) {
        self.lights = lights.to_vec();
    }

    /// Pull updated instance transforms out of the active backend. On the
    /// CUDA backend this is the synchronous device read-back.
    pub fn read_state(&mut self, backend: &mut Backend) {
        let states = backend.world_states();
        debug_assert_eq!(states.len(), self.num_worlds);
        for (world, state) in states.iter().enumerate() {
            let base = world * self.instances_per_world;
            let slots = &mut self.instances[base..base + self.instances_per_world];
            fill_world_instances(slots, state);
        }
    }

    /// Produce one frame per (world, agent) view. Views are independent and
    /// render in parallel.
    pub fn batch_render(&mut self) {
        let pixels = (self.view_width * self.view_height) as usize;
        let per_world = self.instances_per_world;
        let instances = &self.instances;
        let assets = &self.assets;
        let lights = &self.lights;
        let device = *self.device;
        let (view_width, view_height) = (self.view_width, self.view_height);

        self.rgb
            .par_chunks_exact_mut(pixels * 4)
            .zip(self.depth.par_chunks_exact_mut(pixels))
            .enumerate()
            .for_each(|(view, (rgb, depth))| {
                let world = view / NUM_AGENTS;
                let agent = view % NUM_AGENTS;
                let world_instances = &instances[world * per_world..(world + 1) * per_world];
                // The agent slot for this view carries the camera pose. The
                // camera sits inside the agent's own body mesh, so that one
                // instance is culled from its own view.
                let own_slot = AGENT_SLOT_BASE + agent;
                let agent_slot = world_instances[own_slot];
                let mut view_instances = world_instances.to_vec();
                view_instances[own_slot].visible = false;
                let eye = [
                    agent_slot.pos[0],
                    agent_slot.pos[1],
                    agent_slot.pos[2] + 1.3,
                ];
                let mut target = ViewTarget {
                    rgb,
                    depth,
                    width: view_width,
                    height: view_height,
                };
                render_view(
                    &mut target,
                    &device,
                    eye,
                    agent_slot.yaw,
                    &view_instances,
                    assets,
                    lights,
                );
            });
    }

    pub fn rgb_buffer(&self) -> &[u8] {
        &self.rgb
    }

    pub fn depth_buffer(&self) -> &[f32] {
        &self.depth
    }

    pub fn view_width(&self) -> u32 {
        self.view_width
    }

    pub fn view_height(&self) -> u32 {
        self.view_height
    }
}

/// Write one world's instance slots from its simulation state. Slot order
/// is fixed: plane, borders, agents, rooms, court props.
fn fill_world_instances(slots: &mut [InstanceXform], state: &WorldState) {
    let mut slot = 0;
    let mut emit = |kind: SimObject, pos: [f32; 3], yaw: f32, scale: [f32; 3], visible: bool| {
        slots[slot] = InstanceXform {
            kind,
            pos,
            yaw,
            scale,
            visible,
        };
        slot += 1;
    };

    emit(SimObject::Plane, [0.0; 3], 0.0, [1.0; 3], true);

    // Border walls: two sides and the back of the play area.
    let wall_h = 2.0;
    emit(
        SimObject::Wall,
        [-HALF_WIDTH - 0.5, WORLD_LENGTH * 0.5, wall_h * 0.5],
        0.0,
        [0.5, WORLD_LENGTH * 0.5, wall_h * 0.5],
        true,
    );
    emit(
        SimObject::Wall,
        [HALF_WIDTH + 0.5, WORLD_LENGTH * 0.5, wall_h * 0.5],
        0.0,
        [0.5, WORLD_LENGTH * 0.5, wall_h * 0.5],
        true,
    );
    emit(
        SimObject::Wall,
        [0.0, -0.5, wall_h * 0.5],
        0.0,
        [HALF_WIDTH + 1.0, 0.5, wall_h * 0.5],
        true,
    );

    for agent in &state.agents {
        emit(
            SimObject::Agent,
            agent.pos,
            agent.yaw,
            [1.0; 3],
            true,
        );
    }

    for (i, room) in state.rooms.iter().enumerate() {
        let wall_y = WorldState::wall_y(i);

        // Door panel sinks into the floor as it opens.
        emit(
            SimObject::Door,
            [
                room.door_gap_x,
                wall_y,
                wall_h * 0.5 - room.door_open_frac * DOOR_TRAVEL,
            ],
            0.0,
            [DOOR_HALF_WIDTH, WALL_WIDTH * 0.5, wall_h * 0.5],
            true,
        );

        // Wall segments either side of the door gap.
        let left_edge = room.door_gap_x - DOOR_HALF_WIDTH;
        let right_edge = room.door_gap_x + DOOR_HALF_WIDTH;
        emit(
            SimObject::Wall,
            [(left_edge - HALF_WIDTH) * 0.5, wall_y, wall_h * 0.5],
            0.0,
            [(left_edge + HALF_WIDTH) * 0.5, WALL_WIDTH * 0.5, wall_h * 0.5],
            true,
        );
        emit(
            SimObject::Wall,
            [(right_edge + HALF_WIDTH) * 0.5, wall_y, wall_h * 0.5],
            0.0,
            [(HALF_WIDTH - right_edge) * 0.5, WALL_WIDTH * 0.5, wall_h * 0.5],
            true,
        );

        for b in 0..MAX_BUTTONS_PER_ROOM {
            let visible = b < room.num_buttons as usize;
            let pos = room.buttons[b].pos;
            emit(
                SimObject::Button,
                [pos[0], pos[1], 0.1],
                0.0,
                [BUTTON_WIDTH * 0.5, BUTTON_WIDTH * 0.5, 0.1],
                visible,
            );
        }
        for c in 0..MAX_CUBES_PER_ROOM {
            let visible = c < room.num_cubes as usize;
            let pos = room.cubes[c].pos;
            let held = room.cubes[c].held_by != GRAB_NONE;
            emit(
                SimObject::Cube,
                [pos[0], pos[1], if held { 1.5 } else { 1.0 }],
                0.0,
                [1.0; 3],
                visible,
            );
        }
    }

    emit(
        SimObject::BasketballCourt,
        [COURT_POS[0], COURT_POS[1], 0.02],
        0.0,
        [6.0, 6.0, 0.02],
        true,
    );
    emit(
        SimObject::BasketballHoop,
        [HOOP_POS[0], HOOP_POS[1], 1.5],
        0.0,
        [1.0; 3],
        true,
    );
    let ball_held = state.ball.held_by != GRAB_NONE;
    emit(
        SimObject::Basketball,
        [
            state.ball.pos[0],
            state.ball.pos[1],
            if ball_held { 1.5 } else { 0.6 },
        ],
        0.0,
        [0.6; 3],
        true,
    );

    debug_assert_eq!(slot, SLOTS_PER_WORLD);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_schema_is_fixed_size() {
        let mut slots = vec![
            InstanceXform {
                kind: SimObject::Plane,
                pos: [0.0; 3],
                yaw: 0.0,
                scale: [1.0; 3],
                visible: false,
            };
            SLOTS_PER_WORLD
        ];
        let mut state = WorldState::default();
        vivarium_sim::generate_level(&mut state, 0, 11);
        fill_world_instances(&mut slots, &state);
        // Agents occupy the documented camera slots.
        assert_eq!(slots[4].kind, SimObject::Agent);
        assert_eq!(slots[5].kind, SimObject::Agent);
        // Every generated button/cube slot for room 0 reflects num_* counts.
        let room0 = &state.rooms[0];
        let room_base = 1 + 3 + NUM_AGENTS;
        let buttons = &slots[room_base + 3..room_base + 3 + MAX_BUTTONS_PER_ROOM];
        for (b, inst) in buttons.iter().enumerate() {
            assert_eq!(inst.visible, b < room0.num_buttons as usize);
        }
    }
}
