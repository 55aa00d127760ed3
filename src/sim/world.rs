/// Level: the complete state of a running play session.
///
/// ## Ownership
///
/// The level owns every entity. Entities live in slot maps inside
/// `Session`, keyed by versioned ids that go stale once removed; the physics world holds bodies that point back at their owner
/// through a non-owning `EntityRef`. `Session` is kept separate from the
/// physics world so that `physics.step(dt, &mut session)` can hand the
/// entity set to collision handlers while the world itself is borrowed.
///
/// ## Lifecycle
///
///   - `start_level`: validate the map, create the player, install
///     handlers, full reset
///   - `reset_level`: respawn the player, recreate obstacles, optionally
///     recreate goals, restart the clock
///   - `advance_level`: next level on the same map (fresh goals and clock)
///
/// Lives and score persist across resets; position and riding do not.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use slotmap::SlotMap;

use crate::config::RulesConfig;
use crate::domain::entity::{
    Action, CollisionType, EntityRef, Goal, GoalId, InputEvent, MoveDir, Obstacle, ObstacleId, Player,
};
use crate::domain::physics::PhysicsWorld;
use crate::domain::rules;
use crate::domain::tile::TileGeometry;
use super::collision::{self, ContactOutcome};
use super::event::{EndReason, GameEvent};
use super::map::{LevelLayers, MapError, TileMap};

/// Player hitbox as a fraction of the tile size (half-extent).
const PLAYER_HALF_FRACTION: f32 = 0.4;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    SessionOver(EndReason),
}

/// Countdown for the current level.
#[derive(Clone, Copy, Debug)]
pub struct LevelClock {
    duration: f32,
    remaining: f32,
}

impl LevelClock {
    pub fn new(duration: f32) -> Self {
        LevelClock { duration, remaining: duration }
    }

    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    pub fn advance(&mut self, dt: f32) {
        self.remaining -= dt;
    }

    pub fn expired(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Whole seconds left, rounded up, never below zero.
    pub fn display_secs(&self) -> u32 {
        self.remaining.max(0.0).ceil() as u32
    }
}

/// Live entity set, the context collision handlers operate on.
pub struct Session {
    pub player: Player,
    pub obstacles: SlotMap<ObstacleId, Obstacle>,
    pub goals: SlotMap<GoalId, Goal>,
    /// Destructive result of the current physics step, applied afterwards.
    pub outcome: Option<ContactOutcome>,
    /// Ridable obstacles touched during the current physics step.
    pub ride_candidates: Vec<ObstacleId>,
}

impl Session {
    pub fn new(player: Player) -> Self {
        Session {
            player,
            obstacles: SlotMap::with_key(),
            goals: SlotMap::with_key(),
            outcome: None,
            ride_candidates: Vec::new(),
        }
    }
}

pub struct Level {
    pub(super) physics: PhysicsWorld<Session>,
    pub(super) session: Session,
    pub(super) layers: LevelLayers,
    pub(super) rules: RulesConfig,
    pub(super) clock: LevelClock,
    pub(super) score: u32,
    pub(super) level_number: u32,
    pub(super) phase: Phase,
    rng: Pcg32,
    seed: u64,
}

// ── Construction / reset ──

impl Level {
    /// Begin a play session on `map`. Fails fast on invalid layers.
    pub fn start_level(map: &TileMap, rules: RulesConfig, seed: Option<u64>) -> Result<Level, MapError> {
        let layers = LevelLayers::from_map(map)?;
        let seed = seed.unwrap_or_else(rand::random);

        let mut physics = PhysicsWorld::new();
        let half = Vec2::splat(layers.geometry.tile_size * PLAYER_HALF_FRACTION);
        let spawn = layers.spawns.get(0);
        let body = physics.add_body(EntityRef::Player, CollisionType::Player, spawn, half);
        collision::install(&mut physics);

        let mut level = Level {
            physics,
            session: Session::new(Player::new(body, rules.starting_lives)),
            clock: LevelClock::new(rules.level_time_secs),
            layers,
            rules,
            score: 0,
            level_number: 1,
            phase: Phase::Playing,
            rng: Pcg32::seed_from_u64(seed),
            seed,
        };
        level.reset_level(true);
        log::info!(
            "Session started on '{}' (seed {seed}, {} lives)",
            level.layers.name, level.session.player.lives,
        );
        Ok(level)
    }

    /// Respawn the player on a random start tile and recreate obstacles
    /// (and goals, if asked). Restarts the clock. Lives and score persist.
    pub fn reset_level(&mut self, respawn_goals: bool) {
        // Never leave the ride pointing into the set about to be destroyed.
        self.session.player.rides_on = None;
        self.session.outcome = None;
        self.session.ride_candidates.clear();

        for obstacle in self.session.obstacles.values() {
            self.physics.remove_body(obstacle.body);
        }
        self.session.obstacles.clear();
        let half = Vec2::splat(self.layers.geometry.half_tile());
        for spec in &self.layers.obstacles {
            let physics = &mut self.physics;
            self.session.obstacles.insert_with_key(|id| {
                let body = physics.add_body(EntityRef::Obstacle(id), CollisionType::Object, spec.position, half);
                physics.set_velocity(body, spec.props.velocity());
                Obstacle { body, props: spec.props, glyph: spec.glyph }
            });
        }

        if respawn_goals {
            for goal in self.session.goals.values() {
                self.physics.remove_body(goal.body);
            }
            self.session.goals.clear();
            for spec in &self.layers.goals {
                let physics = &mut self.physics;
                self.session.goals.insert_with_key(|id| {
                    let body = physics.add_body(EntityRef::Goal(id), CollisionType::Goal, spec.position, half);
                    Goal { body, glyph: spec.glyph }
                });
            }
        }

        let pick = self.rng.random_range(0..self.layers.spawns.len());
        let spawn = self.layers.spawns.get(pick);
        let body = self.session.player.body;
        self.physics.set_position(body, spawn);
        self.physics.set_velocity(body, Vec2::ZERO);
        self.physics.clear_contacts(body);
        self.session.player.facing = MoveDir::Up;

        self.clock.reset();
    }

    /// The same map again with a fresh goal set and clock.
    pub fn advance_level(&mut self) {
        self.level_number += 1;
        log::info!("Advancing to level {} (score {})", self.level_number, self.score);
        self.reset_level(true);
    }
}

// ── Player control ──

impl Level {
    /// One-tile move, snapped to the grid. Cancels any ride.
    pub fn move_player(&mut self, dir: MoveDir) {
        if self.phase != Phase::Playing { return; }
        let body = self.session.player.body;
        let Some(from) = self.physics.position(body) else { return };

        self.session.player.rides_on = None;
        self.session.player.facing = dir;
        let to = rules::move_target(&self.layers.geometry, from, dir);
        self.physics.set_position(body, to);
        // Whatever the player lands on counts as a fresh contact.
        self.physics.clear_contacts(body);
    }

    /// End the session at the player's request.
    pub fn quit(&mut self) -> Option<GameEvent> {
        if self.phase != Phase::Playing { return None; }
        self.phase = Phase::SessionOver(EndReason::Quit);
        log::info!("Session quit (score {})", self.score);
        Some(GameEvent::SessionOver { score: self.score, reason: EndReason::Quit })
    }

    /// Forward one input event. Only key presses drive the level.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<GameEvent> {
        match event {
            InputEvent::KeyDown(Action::Move(dir)) => {
                self.move_player(dir);
                None
            }
            InputEvent::KeyDown(Action::Quit) => self.quit(),
            InputEvent::KeyDown(Action::Fire) | InputEvent::KeyUp(_) => None,
        }
    }

    /// Take the deferred outcome recorded by the last physics step.
    pub(super) fn take_outcome(&mut self) -> Option<ContactOutcome> {
        self.session.outcome.take()
    }

    /// Remove a goal and its body. Returns false if it was already gone.
    pub(super) fn remove_goal(&mut self, goal: GoalId) -> bool {
        match self.session.goals.remove(goal) {
            Some(g) => {
                self.physics.remove_body(g.body);
                true
            }
            None => false,
        }
    }
}

// ── Read-only view for the shell ──

impl Level {
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.session.player.lives
    }

    pub fn time_display(&self) -> u32 {
        self.clock.display_secs()
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn geometry(&self) -> &TileGeometry {
        &self.layers.geometry
    }

    pub fn layers(&self) -> &LevelLayers {
        &self.layers
    }

    pub fn player(&self) -> &Player {
        &self.session.player
    }

    pub fn player_position(&self) -> Vec2 {
        self.physics.position(self.session.player.body).unwrap_or(Vec2::ZERO)
    }

    pub fn goal_count(&self) -> usize {
        self.session.goals.len()
    }

    /// Live obstacles with their current positions.
    pub fn obstacles(&self) -> impl Iterator<Item = (&Obstacle, Vec2)> + '_ {
        self.session.obstacles.values().filter_map(|o| {
            self.physics.position(o.body).map(|p| (o, p))
        })
    }

    /// Live goals with their positions.
    pub fn goals(&self) -> impl Iterator<Item = (&Goal, Vec2)> + '_ {
        self.session.goals.values().filter_map(|g| {
            self.physics.position(g.body).map(|p| (g, p))
        })
    }

    /// The obstacle being ridden, if any and still alive.
    pub fn ridden_obstacle(&self) -> Option<&Obstacle> {
        self.session.player.rides_on.and_then(|id| self.session.obstacles.get(id))
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
