//! Vivarium Sim - Multi-room escape-world engine.
//!
//! Per-world simulation logic for the vivarium execution manager. Each
//! world is a corridor of challenge rooms: agents press buttons (or weigh
//! them down with cubes) to raise the door at the end of each room and are
//! rewarded for forward progress; the final room holds a basketball court
//! with a hoop and a ball.
//!
//! This crate owns everything that happens inside one tick of one world:
//! discrete-action dynamics, collision response against the room layout,
//! button/door logic, grab constraints, episode generation, and the
//! encoding of every exported observation. It owns no buffers and spawns
//! no threads; the execution backends hand [`step_world`] a mutable
//! [`WorldState`] and that world's slice of each interchange arena
//! ([`WorldIo`]) and may do so for many worlds in parallel.
//!
//! State is `#[repr(C)]` plain-old-data throughout so the CUDA backend can
//! hold the same bytes in device memory and step them with a mirrored
//! kernel.

pub mod consts;
pub mod level;
pub mod rng;
pub mod state;
pub mod types;
pub mod world;

pub use level::generate_level;
pub use rng::EpisodeRng;
pub use state::{AgentState, ButtonState, PropState, RoomState, WorldState, GRAB_BALL, GRAB_NONE};
pub use types::{
    Action, Done, DoorObservation, EntityObservation, EntityType, Lidar, LidarSample,
    PartnerObservation, PartnerObservations, PolarObservation, Reward, RoomEntityObservations,
    SelfObservation, StepsRemaining, WorldReset,
};
pub use world::{step_world, SimConfig, WorldIo};
