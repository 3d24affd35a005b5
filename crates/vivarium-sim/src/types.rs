//! Interchange records exported to the training code.
//!
//! Every record here is `#[repr(C)]` plain-old-data: backends store them in
//! flat arenas (host `Vec`s or device buffers) and the manager reinterprets
//! those arenas as numeric tensors without copying. Layouts are pinned by
//! the static assertions at the bottom of this module; the CUDA step kernel
//! declares byte-compatible C structs.

use bytemuck::{Pod, Zeroable};

use crate::consts;

/// Per-world reset request. The caller writes a truthy value; the backend
/// consumes it on the next step by regenerating that world's episode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct WorldReset {
    pub reset: i32,
}

/// Discrete per-agent action. Ranges are defined by the bucket counts in
/// [`consts`], repeated here for clarity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Action {
    /// [0, 3]
    pub move_amount: i32,
    /// [0, 7]
    pub move_angle: i32,
    /// [-2, 2]
    pub rotate: i32,
    /// 0 = do nothing, 1 = grab / release
    pub grab: i32,
}

/// Per-agent reward, exported as a `[W, A, 1]` float tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Reward {
    pub v: f32,
}

/// Per-agent episode-finished flag. Exported as i32 rather than bool so the
/// tensor element type stays a fixed-size integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Done {
    pub v: i32,
}

/// Number of steps remaining in the agent's episode. Lets non-recurrent
/// policies track the progression of time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StepsRemaining {
    pub t: i32,
}

/// Observation state for the current agent. Positions are rescaled to the
/// bounds of the play area to assist training.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SelfObservation {
    pub room_x: f32,
    pub room_y: f32,
    pub global_x: f32,
    pub global_y: f32,
    pub global_z: f32,
    pub max_y: f32,
    pub theta: f32,
    pub is_grabbing: f32,
}

/// Egocentric polar coordinates: distance normalized by the world length,
/// angle off the agent's forward axis normalized by pi.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PolarObservation {
    pub r: f32,
    pub theta: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PartnerObservation {
    pub polar: PolarObservation,
    pub is_grabbing: f32,
}

/// Egocentric observations of the other agents, exported as
/// `[W, A, NUM_AGENTS - 1, 3]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PartnerObservations {
    pub obs: [PartnerObservation; consts::NUM_AGENTS - 1],
}

/// One observable entity in the agent's current room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityObservation {
    pub polar: PolarObservation,
    pub encoded_type: f32,
}

/// Egocentric observations of the interactable entities in the agent's
/// current room, exported as `[W, A, MAX_ENTITIES_PER_ROOM, 3]`. Unused
/// slots are zeroed ([`EntityType::None`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RoomEntityObservations {
    pub obs: [EntityObservation; consts::MAX_ENTITIES_PER_ROOM],
}

/// Observation of the current room's door: relative position and how far
/// the panel has raised (0 closed, 1 fully open).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DoorObservation {
    pub polar: PolarObservation,
    pub open_fraction: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct LidarSample {
    /// Hit distance normalized by the lidar range; 0 on a miss.
    pub depth: f32,
    pub encoded_type: f32,
}

/// Linear depth values and entity types in a circle around the agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Lidar {
    pub samples: [LidarSample; consts::NUM_LIDAR_SAMPLES],
}

/// Classifies what a lidar ray or room-entity slot refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum EntityType {
    #[default]
    None = 0,
    Button,
    Cube,
    Wall,
    Agent,
    Door,
    BasketballHoop,
    Basketball,
    BasketballCourt,
}

impl EntityType {
    pub const COUNT: usize = 9;

    /// Encoding used inside observation tensors: the type id scaled into
    /// [0, 1].
    #[inline]
    pub fn encoded(self) -> f32 {
        self as u32 as f32 / (Self::COUNT - 1) as f32
    }
}

// Tensor reinterpretation depends on these exact layouts.
const _: () = assert!(
    std::mem::size_of::<Action>() == 4 * std::mem::size_of::<i32>(),
    "Action must export as [4] i32"
);
const _: () = assert!(
    std::mem::size_of::<SelfObservation>() == 8 * std::mem::size_of::<f32>(),
    "SelfObservation must export as [8] f32"
);
const _: () = assert!(
    std::mem::size_of::<PartnerObservations>()
        == std::mem::size_of::<f32>() * (consts::NUM_AGENTS - 1) * 3,
    "PartnerObservations must export as [A-1, 3] f32"
);
const _: () = assert!(
    std::mem::size_of::<RoomEntityObservations>()
        == std::mem::size_of::<f32>() * consts::MAX_ENTITIES_PER_ROOM * 3,
    "RoomEntityObservations must export as [MAX_ENTITIES_PER_ROOM, 3] f32"
);
const _: () = assert!(
    std::mem::size_of::<Lidar>() == std::mem::size_of::<f32>() * consts::NUM_LIDAR_SAMPLES * 2,
    "Lidar must export as [NUM_LIDAR_SAMPLES, 2] f32"
);
