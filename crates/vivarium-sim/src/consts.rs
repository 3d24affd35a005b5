//! Fixed world, episode, and dynamics parameters.
//!
//! Generated levels assume these values; the exported tensor shapes are
//! derived from them, so they are compile-time constants rather than
//! configuration.

// ============================================================================
// World Layout
// ============================================================================

/// Each world is a corridor of challenge rooms the agents traverse in +Y.
pub const NUM_ROOMS: usize = 6;

/// Generated levels assume 2 agents.
pub const NUM_AGENTS: usize = 2;

/// Maximum number of observable entities per room. Sizes the fixed
/// room-entity observation tensor.
pub const MAX_ENTITIES_PER_ROOM: usize = 6;

/// Upper bounds used to size the per-room state arrays.
pub const MAX_BUTTONS_PER_ROOM: usize = 2;
pub const MAX_CUBES_PER_ROOM: usize = 2;

pub const WORLD_LENGTH: f32 = 80.0;
pub const WORLD_WIDTH: f32 = 20.0;
pub const HALF_WIDTH: f32 = WORLD_WIDTH * 0.5;
pub const ROOM_LENGTH: f32 = WORLD_LENGTH / NUM_ROOMS as f32;

pub const WALL_WIDTH: f32 = 1.0;
pub const BUTTON_WIDTH: f32 = 1.3;

/// Half-width of the gap each separating wall leaves for its door.
pub const DOOR_HALF_WIDTH: f32 = 3.0;

/// Vertical travel of a door panel between closed and fully raised.
pub const DOOR_TRAVEL: f32 = 4.5;

/// Speed at which doors raise and lower, world units per second.
pub const DOOR_SPEED: f32 = 30.0;

// ============================================================================
// Episode / Actions
// ============================================================================

/// Steps per episode.
pub const EPISODE_LEN: i32 = 200;

/// How many discrete options for each action field.
pub const NUM_MOVE_AMOUNT_BUCKETS: i32 = 4;
pub const NUM_MOVE_ANGLE_BUCKETS: i32 = 8;
pub const NUM_TURN_BUCKETS: i32 = 5;

/// Number of lidar samples, arranged in a circle around each agent.
pub const NUM_LIDAR_SAMPLES: usize = 30;

/// Maximum lidar ray length; depths are normalized by this.
pub const LIDAR_RANGE: f32 = 20.0;

// ============================================================================
// Rewards
// ============================================================================

/// Each unit of new distance forward (+Y) rewards the agent by this amount.
pub const REWARD_PER_DIST: f32 = 0.05;

/// Small penalty for steps without additional progress.
pub const SLACK_REWARD: f32 = -0.005;

// ============================================================================
// Dynamics
// ============================================================================

/// Time (seconds) per step.
pub const DELTA_T: f32 = 0.04;

/// Number of integration substeps per step.
pub const NUM_PHYSICS_SUBSTEPS: u32 = 4;

/// Translational force per move-amount bucket.
pub const MOVE_FORCE_PER_BUCKET: f32 = 30.0;

/// Yaw torque per turn bucket.
pub const TURN_TORQUE_PER_BUCKET: f32 = 10.0;

/// Ground-friction scaling applied to a body's dynamic friction
/// coefficient to produce per-substep velocity damping.
pub const GROUND_FRICTION: f32 = 16.0;

/// Angular velocity damping rate (1/s).
pub const ANGULAR_DAMPING: f32 = 10.0;

/// Impulse given to a prop when a body pushes through it.
pub const PUSH_IMPULSE: f32 = 2.0;

/// Reach of the grab action, measured from the agent center.
pub const GRAB_RANGE: f32 = 2.5;

/// Distance in front of the agent at which a held prop is carried.
pub const HOLD_DISTANCE: f32 = 2.0;

// ============================================================================
// Spawns / Props
// ============================================================================

/// Y coordinate agents spawn at inside the first room.
pub const AGENT_SPAWN_Y: f32 = 1.5;

/// Lateral spacing between agent spawn positions.
pub const AGENT_SPAWN_SPACING: f32 = 4.0;

/// The basketball hoop is anchored at the far end of the final room.
pub const HOOP_POS: [f32; 2] = [0.0, WORLD_LENGTH - 2.0];

/// The court prop is centered in the final room.
pub const COURT_POS: [f32; 2] = [0.0, WORLD_LENGTH - ROOM_LENGTH * 0.5];
