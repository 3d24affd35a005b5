//! Episode generation.
//!
//! Regenerates a world in place from `(base seed, world index, episode
//! counter)`. The draw order below is part of the determinism contract: the
//! CUDA step kernel replays exactly the same sequence, so reordering a draw
//! here without updating the kernel desynchronizes the backends.

use crate::consts::*;
use crate::rng::EpisodeRng;
use crate::state::{WorldState, GRAB_NONE};

/// Regenerate `state` for its current episode counter.
///
/// Everything except the episode counter itself is rewritten: room layout,
/// door state, prop placement, agent spawns, and the step budget.
pub fn generate_level(state: &mut WorldState, world_idx: u32, base_seed: u64) {
    let mut rng = EpisodeRng::new(base_seed, world_idx, state.episode);

    state.steps_remaining = EPISODE_LEN;

    let gap_span = HALF_WIDTH - DOOR_HALF_WIDTH - 1.0;
    for room in state.rooms.iter_mut() {
        room.door_gap_x = rng.uniform(-gap_span, gap_span);
        room.door_open_frac = 0.0;
        room.door_latched = 0;

        room.num_buttons = rng.range_i32(1, MAX_BUTTONS_PER_ROOM as i32);
        room.num_cubes = rng.range_i32(1, MAX_CUBES_PER_ROOM as i32);
        room.buttons = Default::default();
        room.cubes = Default::default();
        for b in 0..room.num_buttons as usize {
            room.buttons[b].pos = [
                rng.uniform(-HALF_WIDTH + 2.0, HALF_WIDTH - 2.0),
                rng.uniform(2.0, ROOM_LENGTH - 3.0),
            ];
        }
        for c in 0..room.num_cubes as usize {
            room.cubes[c].pos = [
                rng.uniform(-HALF_WIDTH + 2.0, HALF_WIDTH - 2.0),
                rng.uniform(2.0, ROOM_LENGTH - 3.0),
            ];
            room.cubes[c].held_by = GRAB_NONE;
        }
    }
    // Button/cube Y positions above are room-relative; shift into place.
    for (i, room) in state.rooms.iter_mut().enumerate() {
        let base = i as f32 * ROOM_LENGTH;
        for b in 0..room.num_buttons as usize {
            room.buttons[b].pos[1] += base;
        }
        for c in 0..room.num_cubes as usize {
            room.cubes[c].pos[1] += base;
        }
    }

    let spawn_offset = (NUM_AGENTS as f32 - 1.0) * AGENT_SPAWN_SPACING * 0.5;
    for (i, agent) in state.agents.iter_mut().enumerate() {
        agent.pos = [
            i as f32 * AGENT_SPAWN_SPACING - spawn_offset,
            AGENT_SPAWN_Y,
            0.0,
        ];
        agent.vel = [0.0; 2];
        agent.yaw = 0.0;
        agent.yaw_vel = 0.0;
        agent.progress = AGENT_SPAWN_Y;
        agent.grab_slot = GRAB_NONE;
        agent.grab_prev = 0;
    }

    state.ball.pos = [
        rng.uniform(-4.0, 4.0),
        WORLD_LENGTH - ROOM_LENGTH + rng.uniform(2.0, 5.0),
    ];
    state.ball.vel = [0.0; 2];
    state.ball.held_by = GRAB_NONE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let mut a = WorldState::default();
        let mut b = WorldState::default();
        generate_level(&mut a, 3, 99);
        generate_level(&mut b, 3, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_worlds_get_distinct_levels() {
        let mut a = WorldState::default();
        let mut b = WorldState::default();
        generate_level(&mut a, 0, 99);
        generate_level(&mut b, 1, 99);
        assert_ne!(a.rooms[0].door_gap_x, b.rooms[0].door_gap_x);
    }

    #[test]
    fn test_entities_land_inside_their_room() {
        let mut state = WorldState::default();
        generate_level(&mut state, 0, 12345);
        for (i, room) in state.rooms.iter().enumerate() {
            let lo = i as f32 * ROOM_LENGTH;
            let hi = lo + ROOM_LENGTH;
            assert!((1..=MAX_BUTTONS_PER_ROOM as i32).contains(&room.num_buttons));
            assert!((1..=MAX_CUBES_PER_ROOM as i32).contains(&room.num_cubes));
            for b in 0..room.num_buttons as usize {
                let [x, y] = room.buttons[b].pos;
                assert!(x.abs() < HALF_WIDTH, "button x out of bounds");
                assert!(y > lo && y < hi, "button not inside room {i}");
            }
            for c in 0..room.num_cubes as usize {
                let [x, y] = room.cubes[c].pos;
                assert!(x.abs() < HALF_WIDTH);
                assert!(y > lo && y < hi, "cube not inside room {i}");
            }
            assert!(room.door_gap_x.abs() <= HALF_WIDTH - DOOR_HALF_WIDTH);
        }
        let [bx, by] = state.ball.pos;
        assert!(bx.abs() <= 4.0);
        assert!(by >= WORLD_LENGTH - ROOM_LENGTH);
    }

    #[test]
    fn test_budget_and_spawns_reset() {
        let mut state = WorldState::default();
        state.steps_remaining = 3;
        generate_level(&mut state, 0, 7);
        assert_eq!(state.steps_remaining, EPISODE_LEN);
        assert_eq!(state.agents[0].pos[1], AGENT_SPAWN_Y);
        assert_eq!(state.agents[0].pos[0], -state.agents[1].pos[0]);
        assert_eq!(state.agents[0].grab_slot, GRAB_NONE);
    }
}
