/// Movement and boundary rules, pure functions over `TileGeometry`.
///
/// These encode the tile-granular rules of the game so the level
/// simulation and its tests share one definition:
///   - a player move is one tile in the requested direction, snapped
///   - an obstacle wraps to the far side when it leaves the screen
///     in the direction it is travelling

use glam::Vec2;

use super::entity::MoveDir;
use super::tile::TileGeometry;

/// Target of a discrete player move: one tile over, snapped to a tile center.
pub fn move_target(geo: &TileGeometry, from: Vec2, dir: MoveDir) -> Vec2 {
    geo.snap(from + dir.unit() * geo.tile_size)
}

/// Wrap-around for a moving obstacle.
///
/// Moving right past `x > width` reappears at `x = -T/2`; moving left past
/// `x < 0` reappears at `x = width + T/2`. Same vertically. Returns `None`
/// when no wrap is needed.
pub fn wrap_position(geo: &TileGeometry, pos: Vec2, vel: Vec2) -> Option<Vec2> {
    let half = geo.half_tile();
    let mut out = pos;
    let mut wrapped = false;

    if vel.x > 0.0 && pos.x > geo.screen_width() {
        out.x = -half;
        wrapped = true;
    } else if vel.x < 0.0 && pos.x < 0.0 {
        out.x = geo.screen_width() + half;
        wrapped = true;
    }

    if vel.y > 0.0 && pos.y > geo.screen_height() {
        out.y = -half;
        wrapped = true;
    } else if vel.y < 0.0 && pos.y < 0.0 {
        out.y = geo.screen_height() + half;
        wrapped = true;
    }

    if wrapped { Some(out) } else { None }
}

/// Is the player position outside the screen?
pub fn out_of_bounds(geo: &TileGeometry, pos: Vec2) -> bool {
    !geo.contains(pos)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::tests::opposite;
    use proptest::prelude::*;

    fn geo() -> TileGeometry {
        TileGeometry::new(32.0, 15, 18)
    }

    // ── Moves ──

    #[test]
    fn move_is_one_tile() {
        let g = geo();
        let start = g.center_of(7, 17);
        assert_eq!(move_target(&g, start, MoveDir::Up), g.center_of(7, 16));
        assert_eq!(move_target(&g, start, MoveDir::Left), g.center_of(6, 17));
        assert_eq!(move_target(&g, start, MoveDir::Right), g.center_of(8, 17));
        assert_eq!(move_target(&g, start, MoveDir::Down), g.center_of(7, 18));
    }

    #[test]
    fn move_from_off_center_snaps() {
        let g = geo();
        // Carried 10px right of the tile center by a log.
        let from = g.center_of(4, 3) + Vec2::new(10.0, 0.0);
        assert_eq!(move_target(&g, from, MoveDir::Up), g.center_of(4, 2));
    }

    #[test]
    fn move_off_left_edge_leaves_screen() {
        let g = geo();
        let to = move_target(&g, g.center_of(0, 5), MoveDir::Left);
        assert!(out_of_bounds(&g, to));
    }

    // ── Wrap ──

    #[test]
    fn wrap_right_edge_to_left() {
        let g = geo();
        let w = wrap_position(&g, Vec2::new(481.0, 48.0), Vec2::new(40.0, 0.0));
        assert_eq!(w, Some(Vec2::new(-16.0, 48.0)));
    }

    #[test]
    fn wrap_left_edge_to_right() {
        let g = geo();
        let w = wrap_position(&g, Vec2::new(-0.5, 48.0), Vec2::new(-40.0, 0.0));
        assert_eq!(w, Some(Vec2::new(496.0, 48.0)));
    }

    #[test]
    fn freshly_wrapped_obstacle_stays_put() {
        let g = geo();
        // Just re-entered on the left, still moving right: no second wrap.
        assert_eq!(wrap_position(&g, Vec2::new(-16.0, 48.0), Vec2::new(40.0, 0.0)), None);
        assert_eq!(wrap_position(&g, Vec2::new(496.0, 48.0), Vec2::new(-40.0, 0.0)), None);
    }

    #[test]
    fn wrap_vertical() {
        let g = geo();
        let w = wrap_position(&g, Vec2::new(48.0, 577.0), Vec2::new(0.0, 10.0));
        assert_eq!(w, Some(Vec2::new(48.0, -16.0)));
    }

    #[test]
    fn stationary_never_wraps() {
        let g = geo();
        assert_eq!(wrap_position(&g, Vec2::new(900.0, -50.0), Vec2::ZERO), None);
    }

    // ── Properties ──

    fn dir_strategy() -> impl Strategy<Value = MoveDir> {
        prop_oneof![
            Just(MoveDir::Left),
            Just(MoveDir::Right),
            Just(MoveDir::Up),
            Just(MoveDir::Down),
        ]
    }

    proptest! {
        #[test]
        fn move_then_reverse_returns_to_tile(
            col in 0i32..15,
            row in 0i32..18,
            dir in dir_strategy(),
        ) {
            let g = geo();
            let start = g.center_of(col, row);
            let there = move_target(&g, start, dir);
            let back = move_target(&g, there, opposite(dir));
            prop_assert_eq!(back, start);
        }

        #[test]
        fn wrapped_obstacle_lands_just_off_screen(
            x in 481.0f32..2000.0,
            y in 0.0f32..576.0,
            speed in 1.0f32..300.0,
        ) {
            let g = geo();
            let w = wrap_position(&g, Vec2::new(x, y), Vec2::new(speed, 0.0));
            prop_assert_eq!(w, Some(Vec2::new(-16.0, y)));
        }
    }
}
