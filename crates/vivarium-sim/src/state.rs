//! Per-world simulation state.
//!
//! `WorldState` is plain-old-data with a pinned `#[repr(C)]` layout: the
//! host backend keeps one per world in a `Vec`, the CUDA backend keeps the
//! same bytes in device memory and steps them with a kernel that declares
//! byte-compatible C structs. Worlds are created once at manager
//! construction and only ever reset in place.

use bytemuck::{Pod, Zeroable};

use crate::consts::{
    MAX_BUTTONS_PER_ROOM, MAX_CUBES_PER_ROOM, NUM_AGENTS, NUM_ROOMS, ROOM_LENGTH,
};

/// Marks an agent as holding nothing.
pub const GRAB_NONE: i32 = -1;

/// Grab-slot id of the basketball prop.
pub const GRAB_BALL: i32 = 100;

/// Rigid state of one agent. Rotation is constrained to yaw, so attitude is
/// a single angle rather than a quaternion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct AgentState {
    pub pos: [f32; 3],
    pub vel: [f32; 2],
    pub yaw: f32,
    pub yaw_vel: f32,
    /// Highest Y reached this episode; drives the progress reward.
    pub progress: f32,
    /// [`GRAB_NONE`], a cube id (`room * MAX_CUBES_PER_ROOM + index`), or
    /// [`GRAB_BALL`].
    pub grab_slot: i32,
    /// Previous step's grab input, for edge-triggered grab/release.
    pub grab_prev: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ButtonState {
    pub pos: [f32; 2],
    pub pressed: i32,
}

/// A movable prop: a room cube or the basketball.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PropState {
    pub pos: [f32; 2],
    pub vel: [f32; 2],
    /// Holding agent index, or -1 when free.
    pub held_by: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RoomState {
    /// X coordinate of the door gap in this room's separating wall.
    pub door_gap_x: f32,
    /// How far the door panel has raised: 0 closed, 1 fully open.
    pub door_open_frac: f32,
    /// Once every linked button has been pressed at the same time the door
    /// stays open for the rest of the episode.
    pub door_latched: i32,
    pub num_buttons: i32,
    pub num_cubes: i32,
    pub buttons: [ButtonState; MAX_BUTTONS_PER_ROOM],
    pub cubes: [PropState; MAX_CUBES_PER_ROOM],
}

/// One independent world instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct WorldState {
    /// Episode counter; part of the per-episode RNG key.
    pub episode: u32,
    pub steps_remaining: i32,
    pub agents: [AgentState; NUM_AGENTS],
    pub rooms: [RoomState; NUM_ROOMS],
    pub ball: PropState,
}

impl WorldState {
    /// Room index containing the given Y coordinate.
    #[inline]
    pub fn room_of(y: f32) -> usize {
        ((y / ROOM_LENGTH) as i32).clamp(0, NUM_ROOMS as i32 - 1) as usize
    }

    /// Y coordinate of the separating wall at the far end of a room.
    #[inline]
    pub fn wall_y(room: usize) -> f32 {
        (room as f32 + 1.0) * ROOM_LENGTH
    }
}
