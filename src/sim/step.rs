/// The tick function: advances a level by one frame.
///
/// Processing order:
///   1. Physics step (obstacle motion + contact handlers), then the
///      deferred contact outcome (goal removal / death, respawn) or,
///      failing that, boarding the most-overlapped ridable obstacle
///   2. Ride: the rider is moved onto its obstacle
///   3. Obstacle wrap-around
///   4. Level clear → advance, end of tick
///   5. Deadly tiles (skipped while riding)
///   6. Clock
///   7. Session over (time up / no lives), end of tick
///   8. Out of bounds (skipped while riding)
///
/// Ticks after the session is over do nothing.

use crate::domain::rules;
use super::collision::{self, ContactOutcome};
use super::event::{DeathCause, EndReason, GameEvent};
use super::world::{Level, Phase};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn tick(level: &mut Level, dt: f32) -> Vec<GameEvent> {
    if level.phase != Phase::Playing { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();

    resolve_physics(level, dt, &mut events);
    resolve_ride(level);
    resolve_wrap(level);
    if resolve_level_clear(level, &mut events) { return events; }
    resolve_deadly_tiles(level, &mut events);
    level.clock.advance(dt);
    if resolve_session_over(level, &mut events) { return events; }
    resolve_out_of_bounds(level, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// 1. Physics + deferred contact outcome
// ══════════════════════════════════════════════════════════════

fn resolve_physics(level: &mut Level, dt: f32, events: &mut Vec<GameEvent>) {
    level.physics.step(dt, &mut level.session);
    let candidates = std::mem::take(&mut level.session.ride_candidates);

    match level.take_outcome() {
        Some(ContactOutcome::Collected(goal)) => {
            if level.remove_goal(goal) {
                level.score += level.rules.goal_score;
                let remaining = level.session.goals.len();
                log::debug!("goal collected, {remaining} left");
                events.push(GameEvent::GoalCollected { goal, remaining });
            }
            level.reset_level(false);
        }
        Some(ContactOutcome::Killed(cause)) => kill_player(level, cause, events),
        None => {
            if let Some(obstacle) = collision::choose_ride(&level.physics, &level.session, &candidates) {
                level.session.player.rides_on = Some(obstacle);
                log::debug!("ride started on {obstacle:?}");
                events.push(GameEvent::RideStarted { obstacle });
            }
        }
    }
}

/// Lose a life and respawn. The session-over check happens in step 7.
fn kill_player(level: &mut Level, cause: DeathCause, events: &mut Vec<GameEvent>) {
    let player = &mut level.session.player;
    player.lives = player.lives.saturating_sub(1);
    let lives_left = player.lives;
    log::debug!("player killed by {cause:?}, {lives_left} lives left");
    events.push(GameEvent::PlayerKilled { cause, lives_left });
    level.reset_level(false);
}

// ══════════════════════════════════════════════════════════════
// 2. Ride
// ══════════════════════════════════════════════════════════════

fn resolve_ride(level: &mut Level) {
    let Some(id) = level.session.player.rides_on else { return };
    let ridden = level.session.obstacles.get(id)
        .and_then(|o| level.physics.position(o.body));
    match ridden {
        Some(pos) => level.physics.set_position(level.session.player.body, pos),
        None => level.session.player.rides_on = None,
    }
}

// ══════════════════════════════════════════════════════════════
// 3. Wrap
// ══════════════════════════════════════════════════════════════

fn resolve_wrap(level: &mut Level) {
    let geo = level.layers.geometry;
    for (_, obstacle) in level.session.obstacles.iter() {
        let Some(body) = level.physics.body(obstacle.body) else { continue };
        if let Some(to) = rules::wrap_position(&geo, body.position, body.velocity) {
            level.physics.set_position(obstacle.body, to);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// 4. Level clear
// ══════════════════════════════════════════════════════════════

fn resolve_level_clear(level: &mut Level, events: &mut Vec<GameEvent>) -> bool {
    if !level.session.goals.is_empty() { return false; }
    level.score += level.rules.level_clear_bonus;
    events.push(GameEvent::LevelCleared { level: level.level_number });
    level.advance_level();
    true
}

// ══════════════════════════════════════════════════════════════
// 5. Deadly tiles / 8. Out of bounds
// ══════════════════════════════════════════════════════════════

fn resolve_deadly_tiles(level: &mut Level, events: &mut Vec<GameEvent>) {
    if level.session.player.is_riding() { return; }
    let cell = level.layers.geometry.cell_of(level.player_position());
    if level.layers.is_deadly_cell(cell) {
        kill_player(level, DeathCause::DeadlyTile, events);
    }
}

fn resolve_out_of_bounds(level: &mut Level, events: &mut Vec<GameEvent>) {
    if level.session.player.is_riding() { return; }
    if rules::out_of_bounds(&level.layers.geometry, level.player_position()) {
        kill_player(level, DeathCause::OutOfBounds, events);
    }
}

// ══════════════════════════════════════════════════════════════
// 7. Session over
// ══════════════════════════════════════════════════════════════

fn resolve_session_over(level: &mut Level, events: &mut Vec<GameEvent>) -> bool {
    let reason = if level.session.player.lives == 0 {
        EndReason::OutOfLives
    } else if level.clock.expired() {
        EndReason::TimeUp
    } else {
        return false;
    };
    level.phase = Phase::SessionOver(reason);
    log::info!("Session over ({reason:?}), final score {}", level.score);
    events.push(GameEvent::SessionOver { score: level.score, reason });
    true
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::domain::entity::{Action, InputEvent, MoveDir};
    use crate::sim::map::{embedded_map, parse_map};
    use crate::sim::world::tests::{on_spawn, put_player, time_remaining};
    use glam::Vec2;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 30.0;

    fn start(map: &str, seed: u64) -> Level {
        Level::start_level(&parse_map(map).unwrap(), RulesConfig::default(), Some(seed)).unwrap()
    }

    fn center(col: i32, row: i32) -> Vec2 {
        Vec2::new((col as f32 + 0.5) * 32.0, (row as f32 + 0.5) * 32.0)
    }

    // ── Goals and level loop ──

    const FIELD: &str = r#"
        [layers]
        start-pos = ["......", "......", "......", "S.S.S."]
        goal = [".G..G."]
        deadly = []
        moving-objects = []
    "#;

    #[test]
    fn collecting_every_goal_advances_level() {
        let mut level = start(FIELD, 1);
        assert_eq!((level.lives(), level.time_display(), level.goal_count()), (3, 60, 2));

        // Burn some clock so the reset is observable.
        tick(&mut level, 10.0);
        assert_eq!(level.time_display(), 50);

        put_player(&mut level, center(1, 0));
        let ev = tick(&mut level, DT);
        assert!(matches!(ev[..], [GameEvent::GoalCollected { remaining: 1, .. }]));
        assert_eq!(level.goal_count(), 1);
        assert_eq!(level.score(), 100);
        assert!(on_spawn(&level));

        put_player(&mut level, center(4, 0));
        let ev = tick(&mut level, DT);
        assert!(ev.contains(&GameEvent::LevelCleared { level: 1 }));
        assert_eq!(level.goal_count(), 2);
        assert_eq!(time_remaining(&level), 60.0);
        assert_eq!(level.level_number(), 2);
        assert_eq!(level.score(), 100 + 100 + 500);
        assert_eq!(level.lives(), 3);
        assert_eq!(level.phase(), Phase::Playing);
    }

    #[test]
    fn goal_touch_fires_once() {
        let mut level = start(FIELD, 2);
        put_player(&mut level, center(1, 0));
        tick(&mut level, DT);
        // Respawned elsewhere; standing still never collects again.
        for _ in 0..10 {
            assert!(tick(&mut level, DT).is_empty());
        }
        assert_eq!(level.goal_count(), 1);
    }

    // ── Lethal obstacle ──

    const ROAD: &str = r#"
        [layers]
        start-pos = ["....", "....", "S..S"]
        goal = ["G..."]
        deadly = []
        moving-objects = ["....", "c..c", "...."]

        [properties.moving-objects.c]
        x-speed = 0
    "#;

    #[test]
    fn non_ridable_contact_kills() {
        let mut level = start(ROAD, 3);
        level.move_player(MoveDir::Up);
        let ev = tick(&mut level, DT);
        assert!(ev.contains(&GameEvent::PlayerKilled { cause: DeathCause::Obstacle, lives_left: 2 }));
        assert_eq!(level.lives(), 2);
        assert!(on_spawn(&level));
        assert_eq!(level.session.obstacles.len(), 2);
    }

    #[test]
    fn last_life_ends_session() {
        let mut level = start(ROAD, 4);
        let mut last = vec![];
        for _ in 0..3 {
            level.move_player(MoveDir::Up);
            last = tick(&mut level, DT);
        }
        assert_eq!(level.lives(), 0);
        assert_eq!(level.phase(), Phase::SessionOver(EndReason::OutOfLives));
        assert!(last.contains(&GameEvent::SessionOver { score: 0, reason: EndReason::OutOfLives }));
    }

    // ── Clock ──

    #[test]
    fn clock_reaching_zero_ends_session() {
        let mut level = start(FIELD, 5);
        level.score = 250;
        let ev = tick(&mut level, 59.0);
        assert!(ev.is_empty());
        let ev = tick(&mut level, 1.0);
        assert_eq!(ev, vec![GameEvent::SessionOver { score: 250, reason: EndReason::TimeUp }]);
        assert_eq!(level.time_display(), 0);
    }

    #[test]
    fn clock_at_exactly_zero_ends_on_next_tick() {
        let mut level = start(FIELD, 5);
        level.clock.advance(60.0);
        assert_eq!(time_remaining(&level), 0.0);
        let ev = tick(&mut level, 0.0);
        assert_eq!(ev, vec![GameEvent::SessionOver { score: 0, reason: EndReason::TimeUp }]);
    }

    #[test]
    fn ticks_after_session_over_do_nothing() {
        let mut level = start(FIELD, 5);
        level.handle_input(InputEvent::KeyDown(Action::Quit));
        let pos = level.player_position();
        assert!(tick(&mut level, 1.0).is_empty());
        level.move_player(MoveDir::Up);
        assert_eq!(level.player_position(), pos);
    }

    // ── Riding through the wrap ──

    const RIVER: &str = r#"
        [layers]
        start-pos = ["....", "....", "S..."]
        goal = ["...G"]
        deadly = ["", "~~~~"]
        moving-objects = ["", "L...", ""]

        [properties.moving-objects.L]
        x-speed = 32
        ridable = true
    "#;

    #[test]
    fn rider_follows_obstacle() {
        let mut level = start(RIVER, 6);
        level.move_player(MoveDir::Up);
        let ev = tick(&mut level, 0.25);
        assert!(matches!(ev[..], [GameEvent::RideStarted { .. }]));
        assert!(level.player().is_riding());
        assert_eq!(level.player_position(), center(0, 1) + Vec2::new(8.0, 0.0));

        // Over water, but riding: no death.
        tick(&mut level, 0.5);
        assert_eq!(level.lives(), 3);
        assert_eq!(level.player_position(), center(0, 1) + Vec2::new(24.0, 0.0));
    }

    #[test]
    fn rider_wraps_with_obstacle() {
        let mut level = start(RIVER, 7);
        level.move_player(MoveDir::Up);
        tick(&mut level, 0.0);
        assert!(level.player().is_riding());

        // 16 → 144 puts the log past the right edge (128), so it wraps.
        tick(&mut level, 4.0);
        let (_, log_pos) = level.obstacles().next().unwrap();
        assert_eq!(log_pos, Vec2::new(-16.0, 48.0));
        assert_eq!(level.lives(), 3);

        tick(&mut level, 0.0);
        assert_eq!(level.player_position(), Vec2::new(-16.0, 48.0));
        assert!(level.player().is_riding());
        assert_eq!(level.lives(), 3);
    }

    #[test]
    fn stepping_off_a_log_into_water_kills() {
        let mut level = start(RIVER, 8);
        level.move_player(MoveDir::Up);
        tick(&mut level, 0.0);
        level.move_player(MoveDir::Right);
        let ev = tick(&mut level, 0.0);
        assert!(ev.contains(&GameEvent::PlayerKilled { cause: DeathCause::DeadlyTile, lives_left: 2 }));
        assert!(!level.player().is_riding());
    }

    const LONG_LOG: &str = r#"
        [layers]
        start-pos = ["....", "....", "S..."]
        goal = ["...G"]
        deadly = ["", "~~~~"]
        moving-objects = ["", "LL..", ""]

        [properties.moving-objects.L]
        x-speed = 32
        ridable = true
    "#;

    fn ridden_position(level: &Level) -> Option<Vec2> {
        let id = level.player().rides_on?;
        let obstacle = level.session.obstacles.get(id)?;
        level.physics.position(obstacle.body)
    }

    #[test]
    fn walking_along_a_long_log() {
        let mut level = start(LONG_LOG, 10);
        level.move_player(MoveDir::Up);
        tick(&mut level, 0.25);
        // Logs at x = 24 and 56; riding the rear one.
        assert_eq!(level.player_position(), Vec2::new(24.0, 48.0));

        // Snaps to x = 48, which still grazes the rear tile.
        level.move_player(MoveDir::Right);
        let ev = tick(&mut level, 0.0);
        assert!(matches!(ev[..], [GameEvent::RideStarted { .. }]));
        assert_eq!(level.player_position(), Vec2::new(56.0, 48.0));
        assert_eq!(ridden_position(&level), Some(Vec2::new(56.0, 48.0)));

        level.move_player(MoveDir::Left);
        tick(&mut level, 0.0);
        assert_eq!(level.player_position(), Vec2::new(24.0, 48.0));
        assert_eq!(ridden_position(&level), Some(Vec2::new(24.0, 48.0)));
        assert_eq!(level.lives(), 3);
    }

    // ── Boundary ──

    #[test]
    fn leaving_the_screen_kills() {
        let mut level = start(FIELD, 9);
        put_player(&mut level, center(0, 3));
        level.move_player(MoveDir::Left);
        let ev = tick(&mut level, DT);
        assert!(ev.contains(&GameEvent::PlayerKilled { cause: DeathCause::OutOfBounds, lives_left: 2 }));
        assert!(on_spawn(&level));
    }

    #[test]
    fn screen_edge_itself_is_in_bounds() {
        let mut level = start(FIELD, 9);
        put_player(&mut level, Vec2::new(0.0, 100.0));
        assert!(tick(&mut level, DT).is_empty());
        assert_eq!(level.lives(), 3);
    }

    // ── Properties ──

    fn input_strategy() -> impl Strategy<Value = Option<MoveDir>> {
        prop_oneof![
            3 => Just(None),
            1 => Just(Some(MoveDir::Up)),
            1 => Just(Some(MoveDir::Down)),
            1 => Just(Some(MoveDir::Left)),
            1 => Just(Some(MoveDir::Right)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn random_play_keeps_invariants(
            seed in any::<u64>(),
            moves in proptest::collection::vec((input_strategy(), 0.0f32..0.2), 1..200),
        ) {
            let map = embedded_map().unwrap();
            let mut level = Level::start_level(&map, RulesConfig::default(), Some(seed)).unwrap();
            let mut score = 0;

            for (mv, dt) in moves {
                if let Some(dir) = mv { level.move_player(dir); }
                let before = (level.goal_count(), level.lives(), time_remaining(&level));
                let events = tick(&mut level, dt);

                // Rides never dangle.
                if let Some(id) = level.player().rides_on {
                    prop_assert!(level.session.obstacles.contains_key(id));
                }
                // Score never decreases.
                prop_assert!(level.score() >= score);
                score = level.score();

                match level.phase() {
                    Phase::Playing => {}
                    Phase::SessionOver(reason) => {
                        prop_assert!(level.lives() == 0 || before.2 - dt <= 0.0,
                            "ended with {:?} from {:?}", reason, before);
                        let reported = events.iter().any(|e| matches!(e, GameEvent::SessionOver { .. }));
                        prop_assert!(reported);
                        break;
                    }
                }
            }
        }
    }
}
