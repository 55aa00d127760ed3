/// Tile grid geometry and layer semantics.
/// Layer roles are queried via methods, not scattered string compares,
/// so layer semantics are centralized here.

use glam::Vec2;

/// The four map layers the level simulation understands.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum LayerKind {
    StartPos,
    Goal,
    Deadly,
    MovingObjects,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::StartPos,
        LayerKind::Goal,
        LayerKind::Deadly,
        LayerKind::MovingObjects,
    ];

    /// Layer name as it appears in a map file.
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::StartPos => "start-pos",
            LayerKind::Goal => "goal",
            LayerKind::Deadly => "deadly",
            LayerKind::MovingObjects => "moving-objects",
        }
    }

    /// Must this layer contain at least one tile?
    /// Spawning needs a start tile; an empty goal set would clear forever.
    pub fn requires_tiles(self) -> bool {
        matches!(self, LayerKind::StartPos | LayerKind::Goal)
    }
}

/// Grid dimensions and the pixel size of one tile.
///
/// World space: origin top-left, y grows downward.
/// Tile `(col, row)` is centered at `((col + 0.5) * T, (row + 0.5) * T)`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TileGeometry {
    pub tile_size: f32,
    pub cols: usize,
    pub rows: usize,
}

impl TileGeometry {
    pub fn new(tile_size: f32, cols: usize, rows: usize) -> Self {
        TileGeometry { tile_size, cols, rows }
    }

    pub fn screen_width(&self) -> f32 {
        self.cols as f32 * self.tile_size
    }

    pub fn screen_height(&self) -> f32 {
        self.rows as f32 * self.tile_size
    }

    pub fn half_tile(&self) -> f32 {
        self.tile_size * 0.5
    }

    /// World-space center of a tile. Accepts off-grid cells.
    pub fn center_of(&self, col: i32, row: i32) -> Vec2 {
        Vec2::new(
            (col as f32 + 0.5) * self.tile_size,
            (row as f32 + 0.5) * self.tile_size,
        )
    }

    /// The cell containing a world position (may lie outside the grid).
    pub fn cell_of(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.tile_size).floor() as i32,
            (pos.y / self.tile_size).floor() as i32,
        )
    }

    /// Snap to the nearest tile center.
    pub fn snap(&self, pos: Vec2) -> Vec2 {
        let (col, row) = self.cell_of(pos);
        self.center_of(col, row)
    }

    /// Is the position within `[0, width] x [0, height]`?
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0.0
            && pos.x <= self.screen_width()
            && pos.y >= 0.0
            && pos.y <= self.screen_height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> TileGeometry {
        TileGeometry::new(32.0, 15, 18)
    }

    #[test]
    fn screen_size_matches_grid() {
        assert_eq!(geo().screen_width(), 480.0);
        assert_eq!(geo().screen_height(), 576.0);
    }

    #[test]
    fn center_and_cell_agree() {
        let g = geo();
        let c = g.center_of(3, 7);
        assert_eq!(c, Vec2::new(112.0, 240.0));
        assert_eq!(g.cell_of(c), (3, 7));
    }

    #[test]
    fn snap_goes_to_containing_center() {
        let g = geo();
        assert_eq!(g.snap(Vec2::new(100.0, 250.0)), Vec2::new(112.0, 240.0));
        // Off-grid to the left snaps to the virtual column -1.
        assert_eq!(g.snap(Vec2::new(-16.0, 16.0)), Vec2::new(-16.0, 16.0));
    }

    #[test]
    fn bounds_are_closed() {
        let g = geo();
        assert!(g.contains(Vec2::new(0.0, 0.0)));
        assert!(g.contains(Vec2::new(480.0, 576.0)));
        assert!(!g.contains(Vec2::new(480.5, 10.0)));
        assert!(!g.contains(Vec2::new(10.0, -0.5)));
    }

    #[test]
    fn required_layers() {
        assert!(LayerKind::StartPos.requires_tiles());
        assert!(LayerKind::Goal.requires_tiles());
        assert!(!LayerKind::Deadly.requires_tiles());
        assert!(!LayerKind::MovingObjects.requires_tiles());
        assert_eq!(LayerKind::MovingObjects.name(), "moving-objects");
    }
}
