/// Entities: Player, Obstacle (moving object), Goal.
/// Positions live in the physics world; entities hold their body handle.

use glam::Vec2;
use slotmap::new_key_type;

use super::physics::BodyHandle;

new_key_type! {
    /// Key of a live obstacle. Goes stale when the obstacle set is rebuilt.
    pub struct ObstacleId;
    pub struct GoalId;
}

/// Discrete move direction (one tile per key press).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
}

impl MoveDir {
    /// Unit step in world space (y grows downward).
    pub fn unit(self) -> Vec2 {
        match self {
            MoveDir::Left => Vec2::new(-1.0, 0.0),
            MoveDir::Right => Vec2::new(1.0, 0.0),
            MoveDir::Up => Vec2::new(0.0, -1.0),
            MoveDir::Down => Vec2::new(0.0, 1.0),
        }
    }
}

/// Discrete key actions the input source can report.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    Move(MoveDir),
    Fire,
    Quit,
}

/// Input events forwarded by the presentation shell.
/// Only `KeyDown` drives the level; `KeyUp` exists for completeness.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputEvent {
    KeyDown(Action),
    KeyUp(MoveDir),
}

/// Collision-type tag carried by every physics body.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CollisionType {
    Player,
    Object,
    Goal,
}

/// Non-owning reference from a physics body back to its owner.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum EntityRef {
    Player,
    Obstacle(ObstacleId),
    Goal(GoalId),
}

/// Typed per-tile schema of the `moving-objects` layer,
/// resolved once at map-load time.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ObstacleProperties {
    pub x_speed: f32,
    pub y_speed: f32,
    pub ridable: bool,
}

impl ObstacleProperties {
    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.x_speed, self.y_speed)
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub body: BodyHandle,
    pub lives: u32,
    pub facing: MoveDir,
    /// Obstacle the player is slaved to, if any.
    /// Cleared on every move and before the obstacle set is destroyed.
    pub rides_on: Option<ObstacleId>,
}

impl Player {
    pub fn new(body: BodyHandle, lives: u32) -> Self {
        Player { body, lives, facing: MoveDir::Up, rides_on: None }
    }

    pub fn is_riding(&self) -> bool {
        self.rides_on.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Obstacle {
    pub body: BodyHandle,
    pub props: ObstacleProperties,
    pub glyph: char,
}

#[derive(Clone, Debug)]
pub struct Goal {
    pub body: BodyHandle,
    pub glyph: char,
}
