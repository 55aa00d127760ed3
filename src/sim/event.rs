/// Events emitted during a simulation tick.
/// The presentation layer consumes these for messages and screen changes.

use crate::domain::entity::{GoalId, ObstacleId};

/// What killed the player.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    /// Contact with a non-ridable moving object.
    Obstacle,
    /// Standing on a deadly tile without riding anything.
    DeadlyTile,
    /// Left the screen.
    OutOfBounds,
}

/// Why a session ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndReason {
    TimeUp,
    OutOfLives,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    GoalCollected { goal: GoalId, remaining: usize },
    RideStarted { obstacle: ObstacleId },
    PlayerKilled { cause: DeathCause, lives_left: u32 },
    LevelCleared { level: u32 },
    SessionOver { score: u32, reason: EndReason },
}
