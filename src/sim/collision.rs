/// Collision handlers installed on the physics world.
///
/// Handlers run inside `PhysicsWorld::step` and only see the level's entity
/// set (`Session`). They never destroy anything: a goal pickup or a lethal
/// contact is recorded as the step's `ContactOutcome` and applied by the
/// level once the physics step has returned. After an outcome is recorded,
/// every later contact of the same step is ignored, since the player is
/// about to be respawned.
///
/// Ridable contacts are only collected as candidates. A player standing
/// across two tiles of a log touches both, so the ride is chosen after the
/// step by `choose_ride`, not by whichever contact fired first.
///
/// Both handlers return `Response::Suppress`: entities pass through each
/// other and the handler's side effects are the only consequence.

use crate::domain::entity::{CollisionType, EntityRef, GoalId, ObstacleId};
use crate::domain::physics::{PhysicsWorld, Response};
use super::event::DeathCause;
use super::world::Session;

/// Deferred destructive result of one physics step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContactOutcome {
    /// Remove the goal, award points, respawn the player.
    Collected(GoalId),
    /// Lose a life, respawn the player.
    Killed(DeathCause),
}

pub fn install(physics: &mut PhysicsWorld<Session>) {
    physics.register_handler(CollisionType::Player, CollisionType::Object, player_hits_object);
    physics.register_handler(CollisionType::Player, CollisionType::Goal, player_reaches_goal);
}

/// player ↔ object: note a ridable obstacle, die on anything else.
/// A player already riding ignores further obstacles.
pub fn player_hits_object(session: &mut Session, _player: EntityRef, other: EntityRef) -> Response {
    let EntityRef::Obstacle(id) = other else { return Response::Suppress };
    if session.outcome.is_some() || session.player.is_riding() {
        return Response::Suppress;
    }
    let Some(obstacle) = session.obstacles.get(id) else { return Response::Suppress };

    if obstacle.props.ridable {
        session.ride_candidates.push(id);
    } else {
        session.outcome = Some(ContactOutcome::Killed(DeathCause::Obstacle));
    }
    Response::Suppress
}

/// player ↔ goal: collect it.
pub fn player_reaches_goal(session: &mut Session, _player: EntityRef, other: EntityRef) -> Response {
    let EntityRef::Goal(id) = other else { return Response::Suppress };
    if session.outcome.is_some() || !session.goals.contains_key(id) {
        return Response::Suppress;
    }
    session.outcome = Some(ContactOutcome::Collected(id));
    Response::Suppress
}

/// The candidate the player overlaps most. Ties keep the earlier candidate.
pub fn choose_ride(
    physics: &PhysicsWorld<Session>,
    session: &Session,
    candidates: &[ObstacleId],
) -> Option<ObstacleId> {
    let player = physics.body(session.player.body)?;
    let mut best: Option<(ObstacleId, f32)> = None;
    for &id in candidates {
        let Some(obstacle) = session.obstacles.get(id) else { continue };
        let Some(body) = physics.body(obstacle.body) else { continue };
        let Some(depth) = player.penetration(body) else { continue };
        let area = depth.x * depth.y;
        if best.map_or(true, |(_, a)| area > a) {
            best = Some((id, area));
        }
    }
    best.map(|(id, _)| id)
}
