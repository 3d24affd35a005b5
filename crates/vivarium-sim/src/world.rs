//! Per-world step logic.
//!
//! [`step_world`] advances one world by exactly one tick: it consumes the
//! world's reset flag, runs the discrete-action dynamics over a fixed number
//! of integration substeps, updates buttons and doors, accrues the progress
//! reward, and encodes every observation tensor for the step. Worlds are
//! fully independent; backends may run this function across worlds in any
//! order or in parallel.
//!
//! The CUDA step kernel mirrors this module statement-for-statement; any
//! behavioral change here must be replicated there.

use std::f32::consts::{PI, TAU};

use vivarium_core::{ObjectTable, SimObject};

use crate::consts::*;
use crate::level::generate_level;
use crate::state::{AgentState, PropState, RoomState, WorldState, GRAB_BALL, GRAB_NONE};
use crate::types::*;

/// Global configuration shared by every world.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    /// Re-arm a world's reset flag automatically when its episode finishes.
    pub auto_reset: bool,
    /// Base seed all episode RNG streams derive from.
    pub base_seed: u64,
}

/// One world's slice of every interchange arena.
///
/// Backends carve these out of their flat export buffers; the slices are
/// disjoint across worlds, which is what makes the parallel fan-out safe.
pub struct WorldIo<'a> {
    pub reset: &'a mut WorldReset,
    pub actions: &'a [Action],
    pub rewards: &'a mut [Reward],
    pub dones: &'a mut [Done],
    pub self_obs: &'a mut [SelfObservation],
    pub partner_obs: &'a mut [PartnerObservations],
    pub room_ent_obs: &'a mut [RoomEntityObservations],
    pub door_obs: &'a mut [DoorObservation],
    pub lidar: &'a mut [Lidar],
    pub steps_remaining: &'a mut [StepsRemaining],
}

/// Collision radii derived from the registered rigid-body table.
#[derive(Clone, Copy, Debug)]
struct Radii {
    agent: f32,
    cube: f32,
    ball: f32,
    hoop: f32,
}

impl Radii {
    fn from_table(objects: &ObjectTable) -> Self {
        let radius = |obj: SimObject| {
            let he = objects.get(obj).half_extents;
            he[0].max(he[1]).max(0.25)
        };
        Self {
            agent: radius(SimObject::Agent),
            cube: radius(SimObject::Cube),
            ball: radius(SimObject::Basketball),
            hoop: radius(SimObject::BasketballHoop),
        }
    }
}

/// Advance one world by one tick.
pub fn step_world(
    world_idx: u32,
    state: &mut WorldState,
    io: &mut WorldIo<'_>,
    cfg: &SimConfig,
    objects: &ObjectTable,
) {
    debug_assert_eq!(io.actions.len(), NUM_AGENTS);
    debug_assert_eq!(io.rewards.len(), NUM_AGENTS);

    let radii = Radii::from_table(objects);

    // A pending reset consumes the whole tick: the episode is regenerated
    // and fresh observations are emitted in place of a dynamics update.
    if io.reset.reset != 0 {
        io.reset.reset = 0;
        state.episode = state.episode.wrapping_add(1);
        generate_level(state, world_idx, cfg.base_seed);
        for a in 0..NUM_AGENTS {
            io.rewards[a].v = 0.0;
            io.dones[a].v = 0;
            io.steps_remaining[a].t = state.steps_remaining;
        }
        write_observations(state, io, &radii);
        return;
    }

    let agent_meta = *objects.get(SimObject::Agent);
    let cube_mu_d = objects.get(SimObject::Cube).mu_d;
    let ball_mu_d = objects.get(SimObject::Basketball).mu_d;

    // Translate discrete buckets into accelerations and handle the grab
    // toggle before integration; the action record is read exactly once.
    let mut accels = [[0.0f32; 2]; NUM_AGENTS];
    let mut yaw_accels = [0.0f32; NUM_AGENTS];
    for a in 0..NUM_AGENTS {
        let act = io.actions[a];
        let move_amount = act.move_amount.clamp(0, NUM_MOVE_AMOUNT_BUCKETS - 1);
        let move_angle = act.move_angle.clamp(0, NUM_MOVE_ANGLE_BUCKETS - 1);
        let rotate = act.rotate.clamp(-(NUM_TURN_BUCKETS / 2), NUM_TURN_BUCKETS / 2);
        let grab = act.grab.clamp(0, 1);

        let force = move_amount as f32 * MOVE_FORCE_PER_BUCKET;
        let angle = state.agents[a].yaw
            + move_angle as f32 * (TAU / NUM_MOVE_ANGLE_BUCKETS as f32);
        accels[a] = [
            angle.sin() * force * agent_meta.inv_mass,
            angle.cos() * force * agent_meta.inv_mass,
        ];
        yaw_accels[a] = rotate as f32 * TURN_TORQUE_PER_BUCKET * agent_meta.inv_inertia[2];

        if grab == 1 && state.agents[a].grab_prev == 0 {
            toggle_grab(state, a, &radii);
        }
        state.agents[a].grab_prev = grab;
    }

    let h = DELTA_T / NUM_PHYSICS_SUBSTEPS as f32;
    for _ in 0..NUM_PHYSICS_SUBSTEPS {
        integrate_substep(
            state,
            &accels,
            &yaw_accels,
            &radii,
            agent_meta.mu_d,
            cube_mu_d,
            ball_mu_d,
            h,
        );
    }

    update_buttons(state, &radii);
    update_doors(state);

    for a in 0..NUM_AGENTS {
        let agent = &mut state.agents[a];
        let new_progress = agent.progress.max(agent.pos[1]);
        let delta = new_progress - agent.progress;
        agent.progress = new_progress;
        io.rewards[a].v = if delta > 0.0 {
            delta * REWARD_PER_DIST
        } else {
            SLACK_REWARD
        };
    }

    state.steps_remaining -= 1;
    let done = state.steps_remaining <= 0;
    for a in 0..NUM_AGENTS {
        io.dones[a].v = done as i32;
        io.steps_remaining[a].t = state.steps_remaining;
    }
    if done && cfg.auto_reset {
        io.reset.reset = 1;
    }

    write_observations(state, io, &radii);
}

// ============================================================================
// Grab
// ============================================================================

/// Release the held prop, or pick up the nearest free prop in front of the
/// agent and within reach.
fn toggle_grab(state: &mut WorldState, agent_idx: usize, radii: &Radii) {
    let slot = state.agents[agent_idx].grab_slot;
    if slot != GRAB_NONE {
        let vel = state.agents[agent_idx].vel;
        if let Some(prop) = prop_by_slot(state, slot) {
            prop.held_by = GRAB_NONE;
            prop.vel = vel;
        }
        state.agents[agent_idx].grab_slot = GRAB_NONE;
        return;
    }

    let pos = [state.agents[agent_idx].pos[0], state.agents[agent_idx].pos[1]];
    let yaw = state.agents[agent_idx].yaw;
    let fwd = [yaw.sin(), yaw.cos()];

    let mut best_slot = GRAB_NONE;
    let mut best_dist = GRAB_RANGE + radii.cube.max(radii.ball);
    let mut consider = |slot: i32, prop: &PropState| {
        if prop.held_by != GRAB_NONE {
            return;
        }
        let rel = [prop.pos[0] - pos[0], prop.pos[1] - pos[1]];
        let dist = (rel[0] * rel[0] + rel[1] * rel[1]).sqrt();
        let facing = rel[0] * fwd[0] + rel[1] * fwd[1];
        if dist < best_dist && facing > 0.0 {
            best_dist = dist;
            best_slot = slot;
        }
    };
    for (i, room) in state.rooms.iter().enumerate() {
        for c in 0..room.num_cubes as usize {
            consider((i * MAX_CUBES_PER_ROOM + c) as i32, &room.cubes[c]);
        }
    }
    consider(GRAB_BALL, &state.ball);

    if best_slot != GRAB_NONE {
        state.agents[agent_idx].grab_slot = best_slot;
        if let Some(prop) = prop_by_slot(state, best_slot) {
            prop.held_by = agent_idx as i32;
        }
    }
}

fn prop_by_slot(state: &mut WorldState, slot: i32) -> Option<&mut PropState> {
    if slot == GRAB_BALL {
        return Some(&mut state.ball);
    }
    if slot < 0 {
        return None;
    }
    let room = slot as usize / MAX_CUBES_PER_ROOM;
    let cube = slot as usize % MAX_CUBES_PER_ROOM;
    state.rooms.get_mut(room).map(|r| &mut r.cubes[cube])
}

// ============================================================================
// Dynamics
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn integrate_substep(
    state: &mut WorldState,
    accels: &[[f32; 2]; NUM_AGENTS],
    yaw_accels: &[f32; NUM_AGENTS],
    radii: &Radii,
    agent_mu_d: f32,
    cube_mu_d: f32,
    ball_mu_d: f32,
    h: f32,
) {
    for a in 0..NUM_AGENTS {
        let agent = &mut state.agents[a];
        agent.vel[0] += accels[a][0] * h;
        agent.vel[1] += accels[a][1] * h;
        let damp = 1.0 - (agent_mu_d * GROUND_FRICTION * h).min(0.95);
        agent.vel[0] *= damp;
        agent.vel[1] *= damp;

        agent.yaw_vel += yaw_accels[a] * h;
        agent.yaw_vel *= 1.0 - (ANGULAR_DAMPING * h).min(0.95);
        agent.yaw = wrap_pi(agent.yaw + agent.yaw_vel * h);

        let old_y = agent.pos[1];
        agent.pos[0] += agent.vel[0] * h;
        agent.pos[1] += agent.vel[1] * h;
        let mut pos = [agent.pos[0], agent.pos[1]];
        collide_with_layout(&mut pos, &mut agent.vel, old_y, radii.agent, &state.rooms);
        state.agents[a].pos[0] = pos[0];
        state.agents[a].pos[1] = pos[1];
    }

    // Agents push each other apart symmetrically.
    for a in 0..NUM_AGENTS {
        for b in (a + 1)..NUM_AGENTS {
            let (pa, pb) = {
                let pa = [state.agents[a].pos[0], state.agents[a].pos[1]];
                let pb = [state.agents[b].pos[0], state.agents[b].pos[1]];
                (pa, pb)
            };
            if let Some((n, depth)) = circle_overlap(pa, pb, radii.agent * 2.0) {
                let half = depth * 0.5;
                state.agents[a].pos[0] -= n[0] * half;
                state.agents[a].pos[1] -= n[1] * half;
                state.agents[b].pos[0] += n[0] * half;
                state.agents[b].pos[1] += n[1] * half;
            }
        }
    }

    // Free props integrate and take pushes; held props ride their holder.
    for room_i in 0..NUM_ROOMS {
        for c in 0..state.rooms[room_i].num_cubes as usize {
            if state.rooms[room_i].cubes[c].held_by != GRAB_NONE {
                continue;
            }
            let mut prop = state.rooms[room_i].cubes[c];
            step_free_prop(&mut prop, radii.cube, cube_mu_d, h, &state.rooms);
            push_prop_from_agents(&mut prop, &state.agents, radii.agent + radii.cube);
            state.rooms[room_i].cubes[c] = prop;
        }
    }
    if state.ball.held_by == GRAB_NONE {
        let mut ball = state.ball;
        step_free_prop(&mut ball, radii.ball, ball_mu_d, h, &state.rooms);
        push_prop_from_agents(&mut ball, &state.agents, radii.agent + radii.ball);
        state.ball = ball;
    }

    for a in 0..NUM_AGENTS {
        let slot = state.agents[a].grab_slot;
        if slot == GRAB_NONE {
            continue;
        }
        let carry = {
            let agent = &state.agents[a];
            let fwd = [agent.yaw.sin(), agent.yaw.cos()];
            (
                [
                    agent.pos[0] + fwd[0] * HOLD_DISTANCE,
                    agent.pos[1] + fwd[1] * HOLD_DISTANCE,
                ],
                agent.vel,
            )
        };
        if let Some(prop) = prop_by_slot(state, slot) {
            prop.pos = carry.0;
            prop.vel = carry.1;
        }
    }

    // The hoop is immovable scenery; agents slide off it.
    for a in 0..NUM_AGENTS {
        let pos = [state.agents[a].pos[0], state.agents[a].pos[1]];
        if let Some((n, depth)) = circle_overlap(HOOP_POS, pos, radii.agent + radii.hoop) {
            state.agents[a].pos[0] += n[0] * depth;
            state.agents[a].pos[1] += n[1] * depth;
        }
    }
}

fn step_free_prop(prop: &mut PropState, radius: f32, mu_d: f32, h: f32, rooms: &[RoomState]) {
    let damp = 1.0 - (mu_d * GROUND_FRICTION * h).min(0.95);
    prop.vel[0] *= damp;
    prop.vel[1] *= damp;
    let old_y = prop.pos[1];
    prop.pos[0] += prop.vel[0] * h;
    prop.pos[1] += prop.vel[1] * h;
    collide_with_layout(&mut prop.pos, &mut prop.vel, old_y, radius, rooms);
}

fn push_prop_from_agents(prop: &mut PropState, agents: &[AgentState], min_dist: f32) {
    for agent in agents {
        let apos = [agent.pos[0], agent.pos[1]];
        if let Some((n, depth)) = circle_overlap(apos, prop.pos, min_dist) {
            prop.pos[0] += n[0] * depth;
            prop.pos[1] += n[1] * depth;
            prop.vel[0] += n[0] * PUSH_IMPULSE;
            prop.vel[1] += n[1] * PUSH_IMPULSE;
        }
    }
}

/// Overlap test between circles centered at `a` and `b` with combined
/// radius `min_dist`. Returns the push normal (a -> b) and depth.
fn circle_overlap(a: [f32; 2], b: [f32; 2], min_dist: f32) -> Option<([f32; 2], f32)> {
    let rel = [b[0] - a[0], b[1] - a[1]];
    let dist_sq = rel[0] * rel[0] + rel[1] * rel[1];
    if dist_sq >= min_dist * min_dist {
        return None;
    }
    let dist = dist_sq.sqrt();
    let n = if dist > 1e-6 {
        [rel[0] / dist, rel[1] / dist]
    } else {
        [1.0, 0.0]
    };
    Some((n, min_dist - dist))
}

/// Clamp a body against the border walls and the separating walls. A body
/// may only cross a separating wall through its door gap while the door is
/// raised past the passable threshold.
fn collide_with_layout(
    pos: &mut [f32; 2],
    vel: &mut [f32; 2],
    old_y: f32,
    radius: f32,
    rooms: &[RoomState],
) {
    if pos[0] < -HALF_WIDTH + radius {
        pos[0] = -HALF_WIDTH + radius;
        vel[0] = 0.0;
    } else if pos[0] > HALF_WIDTH - radius {
        pos[0] = HALF_WIDTH - radius;
        vel[0] = 0.0;
    }
    if pos[1] < radius {
        pos[1] = radius;
        vel[1] = 0.0;
    } else if pos[1] > WORLD_LENGTH - radius {
        pos[1] = WORLD_LENGTH - radius;
        vel[1] = 0.0;
    }

    for (i, room) in rooms.iter().enumerate() {
        let wall_y = WorldState::wall_y(i);
        let margin = WALL_WIDTH * 0.5 + radius;
        if (pos[1] - wall_y).abs() >= margin {
            continue;
        }
        let in_gap = (pos[0] - room.door_gap_x).abs() < DOOR_HALF_WIDTH - radius;
        let passable = room.door_open_frac >= DOOR_PASSABLE_FRAC;
        if in_gap && passable {
            continue;
        }
        if old_y < wall_y {
            pos[1] = wall_y - margin;
        } else {
            pos[1] = wall_y + margin;
        }
        vel[1] = 0.0;
    }
}

/// Door panels count as open once raised past this fraction.
const DOOR_PASSABLE_FRAC: f32 = 0.5;

// ============================================================================
// Buttons & Doors
// ============================================================================

fn update_buttons(state: &mut WorldState, radii: &Radii) {
    for room_i in 0..NUM_ROOMS {
        for b in 0..state.rooms[room_i].num_buttons as usize {
            let bpos = state.rooms[room_i].buttons[b].pos;
            let mut pressed = false;
            for agent in &state.agents {
                pressed |= within(bpos, [agent.pos[0], agent.pos[1]], BUTTON_WIDTH + radii.agent);
            }
            for room in &state.rooms {
                for c in 0..room.num_cubes as usize {
                    pressed |= within(bpos, room.cubes[c].pos, BUTTON_WIDTH + radii.cube);
                }
            }
            pressed |= within(bpos, state.ball.pos, BUTTON_WIDTH + radii.ball);
            state.rooms[room_i].buttons[b].pressed = pressed as i32;
        }
    }
}

fn update_doors(state: &mut WorldState) {
    for room in state.rooms.iter_mut() {
        let all_pressed = room.num_buttons > 0
            && (0..room.num_buttons as usize).all(|b| room.buttons[b].pressed != 0);
        if all_pressed {
            room.door_latched = 1;
        }
        let target = if room.door_latched != 0 { 1.0 } else { 0.0 };
        let rate = DOOR_SPEED / DOOR_TRAVEL * DELTA_T;
        if room.door_open_frac < target {
            room.door_open_frac = (room.door_open_frac + rate).min(target);
        } else if room.door_open_frac > target {
            room.door_open_frac = (room.door_open_frac - rate).max(target);
        }
    }
}

#[inline]
fn within(a: [f32; 2], b: [f32; 2], dist: f32) -> bool {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy < dist * dist
}

// ============================================================================
// Observations
// ============================================================================

fn write_observations(state: &WorldState, io: &mut WorldIo<'_>, radii: &Radii) {
    for a in 0..NUM_AGENTS {
        let agent = &state.agents[a];
        let room_idx = WorldState::room_of(agent.pos[1]);
        let room = &state.rooms[room_idx];
        let is_grabbing = (agent.grab_slot != GRAB_NONE) as i32 as f32;

        io.self_obs[a] = SelfObservation {
            room_x: (agent.pos[0] + HALF_WIDTH) / WORLD_WIDTH,
            room_y: (agent.pos[1] - room_idx as f32 * ROOM_LENGTH) / ROOM_LENGTH,
            global_x: (agent.pos[0] + HALF_WIDTH) / WORLD_WIDTH,
            global_y: agent.pos[1] / WORLD_LENGTH,
            global_z: agent.pos[2],
            max_y: agent.progress / WORLD_LENGTH,
            theta: agent.yaw / PI,
            is_grabbing,
        };

        let mut partners = PartnerObservations::default();
        let mut slot = 0;
        for (o, other) in state.agents.iter().enumerate() {
            if o == a {
                continue;
            }
            partners.obs[slot] = PartnerObservation {
                polar: polar_obs(agent, [other.pos[0], other.pos[1]]),
                is_grabbing: (other.grab_slot != GRAB_NONE) as i32 as f32,
            };
            slot += 1;
        }
        io.partner_obs[a] = partners;

        let mut entities = RoomEntityObservations::default();
        let mut slot = 0;
        for b in 0..room.num_buttons as usize {
            entities.obs[slot] = EntityObservation {
                polar: polar_obs(agent, room.buttons[b].pos),
                encoded_type: EntityType::Button.encoded(),
            };
            slot += 1;
        }
        for c in 0..room.num_cubes as usize {
            entities.obs[slot] = EntityObservation {
                polar: polar_obs(agent, room.cubes[c].pos),
                encoded_type: EntityType::Cube.encoded(),
            };
            slot += 1;
        }
        if room_idx == NUM_ROOMS - 1 {
            entities.obs[slot] = EntityObservation {
                polar: polar_obs(agent, HOOP_POS),
                encoded_type: EntityType::BasketballHoop.encoded(),
            };
            slot += 1;
            entities.obs[slot] = EntityObservation {
                polar: polar_obs(agent, state.ball.pos),
                encoded_type: EntityType::Basketball.encoded(),
            };
        }
        io.room_ent_obs[a] = entities;

        io.door_obs[a] = DoorObservation {
            polar: polar_obs(agent, [room.door_gap_x, WorldState::wall_y(room_idx)]),
            open_fraction: room.door_open_frac,
        };

        let mut lidar = Lidar::default();
        for (k, sample) in lidar.samples.iter_mut().enumerate() {
            *sample = lidar_sample(state, a, k, radii);
        }
        io.lidar[a] = lidar;
    }
}

fn polar_obs(agent: &AgentState, target: [f32; 2]) -> PolarObservation {
    let rel = [target[0] - agent.pos[0], target[1] - agent.pos[1]];
    let r = (rel[0] * rel[0] + rel[1] * rel[1]).sqrt();
    let world_angle = rel[0].atan2(rel[1]);
    PolarObservation {
        r: r / WORLD_LENGTH,
        theta: wrap_pi(world_angle - agent.yaw) / PI,
    }
}

/// Cast one lidar ray and classify the nearest hit.
fn lidar_sample(state: &WorldState, agent_idx: usize, k: usize, radii: &Radii) -> LidarSample {
    let agent = &state.agents[agent_idx];
    let angle = agent.yaw + k as f32 * (TAU / NUM_LIDAR_SAMPLES as f32);
    let origin = [agent.pos[0], agent.pos[1]];
    let dir = [angle.sin(), angle.cos()];

    let mut best_t = LIDAR_RANGE;
    let mut best_type = EntityType::None;
    let mut consider = |t: f32, ty: EntityType| {
        if t > 1e-4 && t < best_t {
            best_t = t;
            best_type = ty;
        }
    };

    // Border walls.
    if dir[0].abs() > 1e-6 {
        let bound = if dir[0] > 0.0 { HALF_WIDTH } else { -HALF_WIDTH };
        consider((bound - origin[0]) / dir[0], EntityType::Wall);
    }
    if dir[1].abs() > 1e-6 {
        let bound = if dir[1] > 0.0 { WORLD_LENGTH } else { 0.0 };
        consider((bound - origin[1]) / dir[1], EntityType::Wall);

        // Separating walls and their doors.
        for (i, room) in state.rooms.iter().enumerate() {
            let t = (WorldState::wall_y(i) - origin[1]) / dir[1];
            if t <= 1e-4 {
                continue;
            }
            let hit_x = origin[0] + dir[0] * t;
            if hit_x.abs() > HALF_WIDTH {
                continue;
            }
            if (hit_x - room.door_gap_x).abs() < DOOR_HALF_WIDTH {
                if room.door_open_frac < DOOR_PASSABLE_FRAC {
                    consider(t, EntityType::Door);
                }
            } else {
                consider(t, EntityType::Wall);
            }
        }
    }

    for room in &state.rooms {
        for c in 0..room.num_cubes as usize {
            if let Some(t) = ray_circle(origin, dir, room.cubes[c].pos, radii.cube) {
                consider(t, EntityType::Cube);
            }
        }
    }
    if let Some(t) = ray_circle(origin, dir, state.ball.pos, radii.ball) {
        consider(t, EntityType::Basketball);
    }
    if let Some(t) = ray_circle(origin, dir, HOOP_POS, radii.hoop) {
        consider(t, EntityType::BasketballHoop);
    }
    for (o, other) in state.agents.iter().enumerate() {
        if o == agent_idx {
            continue;
        }
        if let Some(t) = ray_circle(origin, dir, [other.pos[0], other.pos[1]], radii.agent) {
            consider(t, EntityType::Agent);
        }
    }

    if best_type == EntityType::None {
        LidarSample::default()
    } else {
        LidarSample {
            depth: best_t / LIDAR_RANGE,
            encoded_type: best_type.encoded(),
        }
    }
}

fn ray_circle(origin: [f32; 2], dir: [f32; 2], center: [f32; 2], radius: f32) -> Option<f32> {
    let m = [center[0] - origin[0], center[1] - origin[1]];
    let b = m[0] * dir[0] + m[1] * dir[1];
    let c = m[0] * m[0] + m[1] * m[1] - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = b - disc.sqrt();
    (t > 1e-4).then_some(t)
}

#[inline]
fn wrap_pi(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

// ============================================================================
// Test support
// ============================================================================

/// Reference rigid-body table for tests and benchmarks that step the world
/// engine without running the asset pipeline. Values match the load-time
/// policy applied to the shipped asset set.
pub mod testing {
    use vivarium_core::{ObjectTable, RigidBodyMetadata, SimObject};

    pub fn object_table() -> ObjectTable {
        let body = |inv_mass: f32, mu: f32, inv_iz: f32, he: [f32; 3]| RigidBodyMetadata {
            inv_mass,
            mu_s: mu,
            mu_d: mu,
            inv_inertia: [0.0, 0.0, inv_iz],
            half_extents: he,
        };
        let mut metadata = [RigidBodyMetadata::fixed(); SimObject::COUNT];
        metadata[SimObject::Cube.index()] = body(0.075, 0.75, 0.11, [1.0, 1.0, 1.0]);
        metadata[SimObject::Agent.index()] = body(1.0, 0.5, 1.5, [1.0, 1.0, 1.0]);
        metadata[SimObject::Basketball.index()] = body(0.5, 0.4, 0.75, [1.0, 1.0, 1.0]);
        metadata[SimObject::BasketballHoop.index()].half_extents = [1.0, 1.0, 1.0];
        metadata[SimObject::Wall.index()].half_extents = [1.0, 0.5, 2.0];
        metadata[SimObject::Door.index()].half_extents = [1.0, 0.5, 2.0];
        ObjectTable { metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_core::ObjectTable;

    /// Single-world step harness mirroring the arena slicing the backends do.
    struct Harness {
        state: WorldState,
        reset: WorldReset,
        actions: [Action; NUM_AGENTS],
        rewards: [Reward; NUM_AGENTS],
        dones: [Done; NUM_AGENTS],
        self_obs: [SelfObservation; NUM_AGENTS],
        partner_obs: [PartnerObservations; NUM_AGENTS],
        room_ent_obs: [RoomEntityObservations; NUM_AGENTS],
        door_obs: [DoorObservation; NUM_AGENTS],
        lidar: [Lidar; NUM_AGENTS],
        steps: [StepsRemaining; NUM_AGENTS],
        cfg: SimConfig,
        objects: ObjectTable,
    }

    impl Harness {
        fn new(seed: u64) -> Self {
            let mut h = Self {
                state: WorldState::default(),
                reset: WorldReset { reset: 1 },
                actions: Default::default(),
                rewards: Default::default(),
                dones: Default::default(),
                self_obs: Default::default(),
                partner_obs: Default::default(),
                room_ent_obs: Default::default(),
                door_obs: Default::default(),
                lidar: Default::default(),
                steps: Default::default(),
                cfg: SimConfig {
                    auto_reset: false,
                    base_seed: seed,
                },
                objects: testing::object_table(),
            };
            // Warm-up: consume the initial reset so the first visible step
            // starts from a fresh episode, as the manager does.
            h.step();
            h
        }

        fn step(&mut self) {
            let mut io = WorldIo {
                reset: &mut self.reset,
                actions: &self.actions,
                rewards: &mut self.rewards,
                dones: &mut self.dones,
                self_obs: &mut self.self_obs,
                partner_obs: &mut self.partner_obs,
                room_ent_obs: &mut self.room_ent_obs,
                door_obs: &mut self.door_obs,
                lidar: &mut self.lidar,
                steps_remaining: &mut self.steps,
            };
            step_world(0, &mut self.state, &mut io, &self.cfg, &self.objects);
        }
    }

    fn assert_obs_finite_and_in_range(h: &Harness) {
        for a in 0..NUM_AGENTS {
            let s = &h.self_obs[a];
            for v in [
                s.room_x, s.room_y, s.global_x, s.global_y, s.global_z, s.max_y, s.theta,
                s.is_grabbing,
            ] {
                assert!(v.is_finite(), "non-finite self observation");
            }
            assert!((0.0..=1.0).contains(&s.room_x));
            assert!((-0.001..=1.001).contains(&s.room_y));
            assert!((0.0..=1.0).contains(&s.global_y));
            assert!((-1.0..=1.0).contains(&s.theta));
            for sample in &h.lidar[a].samples {
                assert!((0.0..=1.0).contains(&sample.depth), "lidar depth out of range");
                assert!((0.0..=1.0).contains(&sample.encoded_type));
            }
            for ent in &h.room_ent_obs[a].obs {
                assert!(ent.polar.r.is_finite());
                assert!((-1.0..=1.0).contains(&ent.polar.theta));
            }
        }
    }

    #[test]
    fn test_warmup_produces_fresh_episode() {
        let h = Harness::new(42);
        assert_eq!(h.reset.reset, 0, "reset flag must be consumed");
        for a in 0..NUM_AGENTS {
            assert_eq!(h.dones[a].v, 0);
            assert_eq!(h.steps[a].t, EPISODE_LEN);
            assert_eq!(h.rewards[a].v, 0.0);
        }
        assert_obs_finite_and_in_range(&h);
    }

    #[test]
    fn test_first_step_counts_down() {
        let mut h = Harness::new(42);
        h.step();
        for a in 0..NUM_AGENTS {
            assert_eq!(h.dones[a].v, 0);
            assert_eq!(h.steps[a].t, EPISODE_LEN - 1);
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let mut a = Harness::new(7);
        let mut b = Harness::new(7);
        for step in 0..50 {
            a.actions[0] = Action { move_amount: 3, move_angle: 0, rotate: 1, grab: 0 };
            b.actions[0] = a.actions[0];
            a.step();
            b.step();
            assert_eq!(a.state, b.state, "state diverged at step {step}");
            assert_eq!(a.rewards, b.rewards);
            assert_eq!(a.self_obs, b.self_obs);
        }
    }

    #[test]
    fn test_forward_action_moves_agent_forward() {
        let mut h = Harness::new(1);
        let start_y = h.state.agents[0].pos[1];
        h.actions[0] = Action { move_amount: 3, move_angle: 0, rotate: 0, grab: 0 };
        for _ in 0..10 {
            h.step();
        }
        assert!(
            h.state.agents[0].pos[1] > start_y + 0.5,
            "agent should advance: {} -> {}",
            start_y,
            h.state.agents[0].pos[1]
        );
        assert!(h.rewards[0].v > 0.0, "progress should be rewarded");
    }

    #[test]
    fn test_idle_agent_accrues_slack_penalty() {
        let mut h = Harness::new(1);
        h.step();
        assert_eq!(h.rewards[1].v, SLACK_REWARD);
    }

    #[test]
    fn test_action_only_affects_its_agent() {
        let mut a = Harness::new(5);
        let mut b = Harness::new(5);
        a.actions[0] = Action { move_amount: 2, move_angle: 2, rotate: -1, grab: 0 };
        b.actions[0] = a.actions[0];
        // Perturbing agent 1's action must not change agent 0's outcome
        // while the two are apart.
        b.actions[1] = Action { move_amount: 1, move_angle: 4, rotate: 2, grab: 0 };
        a.step();
        b.step();
        assert_eq!(a.state.agents[0].pos, b.state.agents[0].pos);
        assert_ne!(a.state.agents[1].pos, b.state.agents[1].pos);
    }

    /// Pin room 0's layout so nothing can press its button while an agent
    /// drives straight at the door gap.
    fn pin_first_room(h: &mut Harness) {
        h.state.rooms[0].door_gap_x = 0.0;
        h.state.rooms[0].num_buttons = 1;
        h.state.rooms[0].buttons[0].pos = [-9.0, 12.0];
        h.state.rooms[0].buttons[0].pressed = 0;
        h.state.rooms[0].num_cubes = 1;
        h.state.rooms[0].cubes[0].pos = [9.0, 10.0];
        h.state.rooms[0].cubes[0].vel = [0.0; 2];
        h.state.agents[0].pos = [0.0, WorldState::wall_y(0) - 3.0, 0.0];
    }

    #[test]
    fn test_closed_door_blocks_crossing() {
        let mut h = Harness::new(9);
        pin_first_room(&mut h);
        h.actions[0] = Action { move_amount: 3, move_angle: 0, rotate: 0, grab: 0 };
        for _ in 0..30 {
            h.step();
        }
        assert_eq!(h.state.rooms[0].door_latched, 0);
        assert!(
            h.state.agents[0].pos[1] < WorldState::wall_y(0),
            "closed door must stop the agent"
        );
    }

    #[test]
    fn test_open_door_allows_crossing() {
        let mut h = Harness::new(9);
        pin_first_room(&mut h);
        h.state.rooms[0].door_latched = 1;
        h.state.rooms[0].door_open_frac = 1.0;
        h.actions[0] = Action { move_amount: 3, move_angle: 0, rotate: 0, grab: 0 };
        for _ in 0..30 {
            h.step();
        }
        assert!(
            h.state.agents[0].pos[1] > WorldState::wall_y(0),
            "open door must let the agent through"
        );
    }

    #[test]
    fn test_buttons_latch_door_open() {
        let mut h = Harness::new(11);
        // Teleport one body onto every button of room 0.
        let room = h.state.rooms[0];
        for b in 0..room.num_buttons as usize {
            if b == 0 {
                h.state.agents[0].pos[0] = room.buttons[b].pos[0];
                h.state.agents[0].pos[1] = room.buttons[b].pos[1];
            } else {
                h.state.agents[1].pos[0] = room.buttons[b].pos[0];
                h.state.agents[1].pos[1] = room.buttons[b].pos[1];
            }
        }
        for _ in 0..10 {
            h.step();
        }
        assert_eq!(h.state.rooms[0].door_latched, 1);
        assert!(h.state.rooms[0].door_open_frac >= DOOR_PASSABLE_FRAC);
        // Walk both agents off; the door stays open.
        h.state.agents[0].pos = [0.0, 2.0, 0.0];
        h.state.agents[1].pos = [3.0, 2.0, 0.0];
        for _ in 0..10 {
            h.step();
        }
        assert!((h.state.rooms[0].door_open_frac - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_grab_toggle_picks_up_and_releases() {
        let mut h = Harness::new(13);
        // Place a cube directly in front of agent 0 (facing +Y at yaw 0).
        let cube_pos = [h.state.agents[0].pos[0], h.state.agents[0].pos[1] + 2.0];
        h.state.rooms[0].num_cubes = 1;
        h.state.rooms[0].cubes[0].pos = cube_pos;
        h.actions[0] = Action { move_amount: 0, move_angle: 0, rotate: 0, grab: 1 };
        h.step();
        assert_eq!(h.state.agents[0].grab_slot, 0);
        assert_eq!(h.state.rooms[0].cubes[0].held_by, 0);
        assert_eq!(h.self_obs[0].is_grabbing, 1.0);

        // Holding grab down must not release (edge-triggered).
        h.step();
        assert_eq!(h.state.agents[0].grab_slot, 0);

        h.actions[0].grab = 0;
        h.step();
        h.actions[0].grab = 1;
        h.step();
        assert_eq!(h.state.agents[0].grab_slot, GRAB_NONE);
        assert_eq!(h.state.rooms[0].cubes[0].held_by, GRAB_NONE);
    }

    #[test]
    fn test_episode_expiry_sets_done_and_autoreset_rearms() {
        let mut h = Harness::new(17);
        h.cfg.auto_reset = true;
        for _ in 0..EPISODE_LEN - 1 {
            h.step();
            assert_eq!(h.dones[0].v, 0);
        }
        h.step();
        assert_eq!(h.dones[0].v, 1);
        assert_eq!(h.steps[0].t, 0);
        assert_eq!(h.reset.reset, 1, "auto-reset must re-arm the flag");
        let episode_before = h.state.episode;
        h.step();
        assert_eq!(h.state.episode, episode_before + 1);
        assert_eq!(h.dones[0].v, 0);
        assert_eq!(h.steps[0].t, EPISODE_LEN);
    }

    #[test]
    fn test_manual_reset_regenerates() {
        let mut h = Harness::new(19);
        h.actions[0] = Action { move_amount: 3, move_angle: 0, rotate: 0, grab: 0 };
        for _ in 0..20 {
            h.step();
        }
        h.actions[0] = Action::default();
        h.reset.reset = 1;
        h.step();
        assert_eq!(h.steps[0].t, EPISODE_LEN);
        assert_eq!(h.state.agents[0].pos[1], AGENT_SPAWN_Y);
        assert_obs_finite_and_in_range(&h);
    }

    #[test]
    fn test_action_extremes_stay_in_range() {
        let extremes = [
            Action { move_amount: 0, move_angle: 0, rotate: -2, grab: 0 },
            Action { move_amount: 3, move_angle: 7, rotate: 2, grab: 1 },
            Action { move_amount: 3, move_angle: 0, rotate: 0, grab: 1 },
            Action { move_amount: 0, move_angle: 7, rotate: -2, grab: 0 },
        ];
        for (i, act) in extremes.into_iter().enumerate() {
            let mut h = Harness::new(100 + i as u64);
            h.actions = [act; NUM_AGENTS];
            for _ in 0..50 {
                h.step();
                assert_obs_finite_and_in_range(&h);
                for agent in &h.state.agents {
                    assert!(agent.pos[0].abs() <= HALF_WIDTH);
                    assert!((0.0..=WORLD_LENGTH).contains(&agent.pos[1]));
                }
            }
        }
    }

    #[test]
    fn test_lidar_sees_side_walls() {
        let h = Harness::new(23);
        // At spawn, some ray must hit a side wall within range and report a
        // wall classification with a sane depth.
        let hits = h.lidar[0]
            .samples
            .iter()
            .filter(|s| s.encoded_type == EntityType::Wall.encoded())
            .count();
        assert!(hits > 0, "expected at least one wall hit at spawn");
    }

    #[test]
    fn test_partner_observation_tracks_distance() {
        let h = Harness::new(29);
        let d = AGENT_SPAWN_SPACING / WORLD_LENGTH;
        let obs = h.partner_obs[0].obs[0];
        assert!((obs.polar.r - d).abs() < 1e-3, "partner distance mismatch");
        assert_eq!(obs.is_grabbing, 0.0);
    }
}
