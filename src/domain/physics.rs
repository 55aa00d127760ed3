/// Physics substrate: axis-aligned bodies, integration, contact dispatch.
///
/// ## Architecture
///
///   - BODIES: position, velocity and extent, stored in a `SlotMap`
///   - HANDLERS: per type-pair callbacks owned by the level, not the bodies
///
/// A body only knows its owner through an `EntityRef`; it never owns the
/// entity. The context type `C` is whatever the handlers mutate (the level's
/// session state), passed into `step` so the world and its context can be
/// borrowed side by side.
///
/// ## Contacts
///
/// Two bodies are IN CONTACT when their boxes overlap strictly
/// (touching edges do not count). Only type pairs with a registered handler
/// are tested. A handler fires on the FIRST step a contact exists
/// (edge-triggered); a contact held across steps stays silent until the
/// bodies separate or `clear_contacts` forgets it.
///
/// A handler returns `Response::Apply` to let the substrate push the first
/// body out along the axis of least penetration, or `Response::Suppress` to
/// let the bodies pass through each other.

use std::collections::HashSet;

use glam::Vec2;
use slotmap::{new_key_type, SlotMap};

use super::entity::{CollisionType, EntityRef};

new_key_type! {
    pub struct BodyHandle;
}

/// Handler verdict: whether the substrate applies its own response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Response {
    Apply,
    Suppress,
}

/// Owners arrive in registration order: `(type_a, type_b)`.
pub type CollisionHandler<C> = fn(&mut C, EntityRef, EntityRef) -> Response;

#[derive(Clone, Debug)]
pub struct Body {
    pub owner: EntityRef,
    pub kind: CollisionType,
    pub position: Vec2,
    pub velocity: Vec2,
    pub half_extents: Vec2,
}

impl Body {
    /// Overlap depth on each axis, or `None` when the boxes don't overlap.
    pub fn penetration(&self, other: &Body) -> Option<Vec2> {
        let reach = self.half_extents + other.half_extents;
        let gap = (self.position - other.position).abs();
        let depth = reach - gap;
        if depth.x > 0.0 && depth.y > 0.0 {
            Some(depth)
        } else {
            None
        }
    }
}

pub struct PhysicsWorld<C> {
    bodies: SlotMap<BodyHandle, Body>,
    handlers: Vec<(CollisionType, CollisionType, CollisionHandler<C>)>,
    contacts: HashSet<(BodyHandle, BodyHandle)>,
}

impl<C> Default for PhysicsWorld<C> {
    fn default() -> Self {
        PhysicsWorld::new()
    }
}

impl<C> PhysicsWorld<C> {
    pub fn new() -> Self {
        PhysicsWorld {
            bodies: SlotMap::with_key(),
            handlers: Vec::new(),
            contacts: HashSet::new(),
        }
    }

    // ── Registration ──

    pub fn add_body(
        &mut self,
        owner: EntityRef,
        kind: CollisionType,
        position: Vec2,
        half_extents: Vec2,
    ) -> BodyHandle {
        self.bodies.insert(Body {
            owner,
            kind,
            position,
            velocity: Vec2::ZERO,
            half_extents,
        })
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        self.contacts.retain(|&(a, b)| a != handle && b != handle);
        self.bodies.remove(handle)
    }

    /// Install a handler for a type pair, replacing any previous one.
    pub fn register_handler(
        &mut self,
        type_a: CollisionType,
        type_b: CollisionType,
        handler: CollisionHandler<C>,
    ) {
        self.handlers.retain(|&(a, b, _)| !(a == type_a && b == type_b));
        self.handlers.push((type_a, type_b, handler));
    }

    // ── Direct overrides (outside the integration step) ──

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.position = position;
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.velocity = velocity;
        }
    }

    /// Forget every cached contact of a body, so overlaps it currently has
    /// are reported again on the next step.
    pub fn clear_contacts(&mut self, handle: BodyHandle) {
        self.contacts.retain(|&(a, b)| a != handle && b != handle);
    }

    // ── Queries ──

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| b.position)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    // ── Step ──

    /// Advance every body by `dt`, then detect contacts and dispatch
    /// handlers for the new ones. Handlers run synchronously, in body order.
    pub fn step(&mut self, dt: f32, ctx: &mut C) {
        for body in self.bodies.values_mut() {
            body.position += body.velocity * dt;
        }

        let handles: Vec<BodyHandle> = self.bodies.keys().collect();
        let mut current: HashSet<(BodyHandle, BodyHandle)> = HashSet::new();

        for i in 0..self.handlers.len() {
            let (type_a, type_b, handler) = self.handlers[i];
            for &a in &handles {
                for &b in &handles {
                    if a == b { continue; }
                    // Re-read each time: an applied response may have moved `a`.
                    let (body_a, body_b) = match (self.bodies.get(a), self.bodies.get(b)) {
                        (Some(x), Some(y)) => (x, y),
                        _ => continue,
                    };
                    if body_a.kind != type_a || body_b.kind != type_b { continue; }
                    if type_a == type_b && current.contains(&(b, a)) { continue; }
                    if body_a.penetration(body_b).is_none() { continue; }

                    current.insert((a, b));
                    if self.contacts.contains(&(a, b)) { continue; }

                    let (owner_a, owner_b) = (body_a.owner, body_b.owner);
                    if handler(ctx, owner_a, owner_b) == Response::Apply {
                        self.separate(a, b);
                    }
                }
            }
        }

        self.contacts = current;
    }

    /// Push `a` out of `b` along the axis of least penetration and stop
    /// its motion on that axis.
    fn separate(&mut self, a: BodyHandle, b: BodyHandle) {
        let (depth, delta) = match (self.bodies.get(a), self.bodies.get(b)) {
            (Some(x), Some(y)) => match x.penetration(y) {
                Some(d) => (d, x.position - y.position),
                None => return,
            },
            _ => return,
        };
        let Some(body) = self.bodies.get_mut(a) else { return };
        if depth.x < depth.y {
            let sign = if delta.x < 0.0 { -1.0 } else { 1.0 };
            body.position.x += sign * depth.x;
            body.velocity.x = 0.0;
        } else {
            let sign = if delta.y < 0.0 { -1.0 } else { 1.0 };
            body.position.y += sign * depth.y;
            body.velocity.y = 0.0;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::GoalId;

    /// Records every handler call; answers with a fixed response.
    #[derive(Default)]
    struct Log {
        calls: Vec<(EntityRef, EntityRef)>,
        apply: bool,
    }

    fn record(log: &mut Log, a: EntityRef, b: EntityRef) -> Response {
        log.calls.push((a, b));
        if log.apply { Response::Apply } else { Response::Suppress }
    }

    fn half() -> Vec2 {
        Vec2::splat(16.0)
    }

    fn goal_ref() -> EntityRef {
        let mut goals: SlotMap<GoalId, ()> = SlotMap::with_key();
        EntityRef::Goal(goals.insert(()))
    }

    fn in_contact<C>(w: &PhysicsWorld<C>, a: BodyHandle, b: BodyHandle) -> bool {
        w.contacts.contains(&(a, b)) || w.contacts.contains(&(b, a))
    }

    fn world_with_handler() -> PhysicsWorld<Log> {
        let mut w = PhysicsWorld::new();
        w.register_handler(CollisionType::Player, CollisionType::Object, record);
        w
    }

    #[test]
    fn penetration_is_strict() {
        let a = Body {
            owner: EntityRef::Player,
            kind: CollisionType::Player,
            position: Vec2::new(16.0, 16.0),
            velocity: Vec2::ZERO,
            half_extents: half(),
        };
        let mut b = a.clone();
        b.position = Vec2::new(48.0, 16.0); // edges touch exactly
        assert!(a.penetration(&b).is_none());
        b.position = Vec2::new(40.0, 16.0);
        assert_eq!(a.penetration(&b), Some(Vec2::new(8.0, 32.0)));
    }

    #[test]
    fn step_integrates_velocity() {
        let mut w: PhysicsWorld<Log> = PhysicsWorld::new();
        let h = w.add_body(EntityRef::Player, CollisionType::Object, Vec2::ZERO, half());
        w.set_velocity(h, Vec2::new(10.0, -4.0));
        w.step(0.5, &mut Log::default());
        assert_eq!(w.position(h), Some(Vec2::new(5.0, -2.0)));
    }

    #[test]
    fn handler_fires_once_per_contact() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        let gref = goal_ref();
        let p = w.add_body(EntityRef::Player, CollisionType::Player, Vec2::new(16.0, 16.0), half());
        let _o = w.add_body(gref, CollisionType::Object, Vec2::new(20.0, 16.0), half());

        w.step(0.016, &mut log);
        w.step(0.016, &mut log);
        w.step(0.016, &mut log);
        assert_eq!(log.calls, vec![(EntityRef::Player, gref)]);

        // Separate, then touch again: a new contact.
        w.set_position(p, Vec2::new(200.0, 16.0));
        w.step(0.016, &mut log);
        w.set_position(p, Vec2::new(16.0, 16.0));
        w.step(0.016, &mut log);
        assert_eq!(log.calls.len(), 2);
    }

    #[test]
    fn owners_arrive_in_registration_order() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        let gref = goal_ref();
        // Object inserted first; player must still be argument one.
        w.add_body(gref, CollisionType::Object, Vec2::new(20.0, 16.0), half());
        w.add_body(EntityRef::Player, CollisionType::Player, Vec2::new(16.0, 16.0), half());
        w.step(0.0, &mut log);
        assert_eq!(log.calls, vec![(EntityRef::Player, gref)]);
    }

    #[test]
    fn unregistered_pairs_are_ignored() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        w.add_body(EntityRef::Player, CollisionType::Player, Vec2::ZERO, half());
        w.add_body(goal_ref(), CollisionType::Goal, Vec2::ZERO, half());
        w.step(0.0, &mut log);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn clear_contacts_refires() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        let p = w.add_body(EntityRef::Player, CollisionType::Player, Vec2::ZERO, half());
        w.add_body(goal_ref(), CollisionType::Object, Vec2::ZERO, half());
        w.step(0.0, &mut log);
        w.clear_contacts(p);
        w.step(0.0, &mut log);
        assert_eq!(log.calls.len(), 2);
    }

    #[test]
    fn suppress_leaves_positions() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        let p = w.add_body(EntityRef::Player, CollisionType::Player, Vec2::new(10.0, 0.0), half());
        w.add_body(goal_ref(), CollisionType::Object, Vec2::ZERO, half());
        w.step(0.0, &mut log);
        assert_eq!(w.position(p), Some(Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn apply_pushes_out_along_shallow_axis() {
        let mut w = world_with_handler();
        let mut log = Log { apply: true, ..Log::default() };
        let p = w.add_body(EntityRef::Player, CollisionType::Player, Vec2::new(28.0, 2.0), half());
        w.set_velocity(p, Vec2::new(-5.0, 0.0));
        w.add_body(goal_ref(), CollisionType::Object, Vec2::ZERO, half());
        w.step(0.0, &mut log);
        // x depth 4 < y depth 30 → pushed right to x = 32, x-velocity killed.
        assert_eq!(w.position(p), Some(Vec2::new(32.0, 2.0)));
        assert_eq!(w.bodies[p].velocity, Vec2::ZERO);
    }

    #[test]
    fn removed_body_drops_contacts() {
        let mut w = world_with_handler();
        let mut log = Log::default();
        let p = w.add_body(EntityRef::Player, CollisionType::Player, Vec2::ZERO, half());
        let o = w.add_body(goal_ref(), CollisionType::Object, Vec2::ZERO, half());
        w.step(0.0, &mut log);
        assert!(in_contact(&w, p, o));
        w.remove_body(o);
        assert!(!in_contact(&w, p, o));
        assert!(w.position(o).is_none());
        assert_eq!(w.bodies.len(), 1);
    }
}
