/// Tile map loader: named layers of tiles with per-tile properties.
///
/// ## Sources (priority order):
///   1. `map_file` from config (`.toml`)
///   2. Built-in embedded map (`maps/default.toml`)
///
/// ## Map format (TOML):
///   ```toml
///   name = "River Crossing"
///   tile_size = 32.0
///
///   [layers]
///   start-pos = ["...", "..S.."]
///   goal = [".G..G"]
///   deadly = ["~~~~~"]
///   moving-objects = [".AA..", "c...c"]
///
///   [properties.moving-objects.A]
///   x-speed = 40.0
///   ridable = true
///   ```
///
/// Each layer is a list of rows, top row first. `.` and space are empty
/// cells; any other character is a tile whose texture reference is that
/// character. `[properties.<layer>.<char>]` attaches key/value properties
/// to every tile of that character in that layer.
///
/// The grid is as wide as the longest row and as tall as the tallest
/// layer, across all layers.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::entity::ObstacleProperties;
use crate::domain::tile::{LayerKind, TileGeometry};

const EMBEDDED_MAP: &str = include_str!("../../maps/default.toml");

#[derive(Debug, Error)]
pub enum MapError {
    #[error("could not read map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed map file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required layer `{0}`")]
    MissingLayer(&'static str),
    #[error("layer `{0}` has no tiles")]
    EmptyLayer(&'static str),
    #[error("property key `{key}` in layer `{layer}` must be a single character")]
    BadGlyph { layer: String, key: String },
    #[error("tile `{glyph}` property `{key}` must be {expected}")]
    BadProperty {
        glyph: char,
        key: String,
        expected: &'static str,
    },
    #[error("tile size must be positive, got {0}")]
    BadTileSize(f32),
}

// ══════════════════════════════════════════════════════════════
// Map provider output
// ══════════════════════════════════════════════════════════════

/// One tile of a layer.
#[derive(Clone, Debug)]
pub struct TileRecord {
    pub col: usize,
    pub row: usize,
    /// World-space tile center.
    pub position: Vec2,
    /// Texture reference: the character used in the layer rows.
    pub glyph: char,
    pub properties: toml::Table,
}

#[derive(Clone, Debug)]
pub struct TileLayer {
    pub tiles: Vec<TileRecord>,
}

#[derive(Clone, Debug)]
pub struct TileMap {
    pub name: String,
    pub geometry: TileGeometry,
    pub layers: BTreeMap<String, TileLayer>,
}

impl TileMap {
    pub fn layer(&self, kind: LayerKind) -> Option<&TileLayer> {
        self.layers.get(kind.name())
    }
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load a map from a TOML file on disk.
pub fn load_map(path: &Path) -> Result<TileMap, MapError> {
    let text = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let map = parse_map(&text)?;
    log::info!(
        "Loaded map '{}' from {} ({}x{} tiles)",
        map.name, path.display(), map.geometry.cols, map.geometry.rows,
    );
    Ok(map)
}

/// The map shipped inside the binary.
pub fn embedded_map() -> Result<TileMap, MapError> {
    parse_map(EMBEDDED_MAP)
}

/// Load `path` if given, otherwise the embedded map.
pub fn load_map_or_embedded(path: Option<&Path>) -> Result<TileMap, MapError> {
    match path {
        Some(p) => load_map(p),
        None => embedded_map(),
    }
}

#[derive(Deserialize, Debug)]
struct MapFile {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_tile_size")]
    tile_size: f32,
    #[serde(default)]
    layers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    properties: BTreeMap<String, BTreeMap<String, toml::Table>>,
}

fn default_name() -> String { "Unnamed Map".into() }
fn default_tile_size() -> f32 { 32.0 }

/// Parse map text. Structural checks only; layer roles are validated by
/// `LevelLayers::from_map`.
pub fn parse_map(text: &str) -> Result<TileMap, MapError> {
    let file: MapFile = toml::from_str(text)?;
    if !(file.tile_size > 0.0) {
        return Err(MapError::BadTileSize(file.tile_size));
    }

    let rows = file.layers.values().map(|r| r.len()).max().unwrap_or(0);
    let cols = file.layers.values()
        .flat_map(|r| r.iter())
        .map(|row| row.chars().count())
        .max()
        .unwrap_or(0);
    let geometry = TileGeometry::new(file.tile_size, cols, rows);

    let mut layers = BTreeMap::new();
    for (name, grid) in &file.layers {
        let props = glyph_properties(name, file.properties.get(name))?;
        let mut tiles = vec![];
        for (row, line) in grid.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if ch == '.' || ch == ' ' { continue; }
                tiles.push(TileRecord {
                    col,
                    row,
                    position: geometry.center_of(col as i32, row as i32),
                    glyph: ch,
                    properties: props.get(&ch).cloned().unwrap_or_default(),
                });
            }
        }
        layers.insert(name.clone(), TileLayer { tiles });
    }

    Ok(TileMap { name: file.name, geometry, layers })
}

fn glyph_properties(
    layer: &str,
    raw: Option<&BTreeMap<String, toml::Table>>,
) -> Result<BTreeMap<char, toml::Table>, MapError> {
    let mut out = BTreeMap::new();
    let Some(raw) = raw else { return Ok(out) };
    for (key, table) in raw {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => { out.insert(ch, table.clone()); }
            _ => {
                return Err(MapError::BadGlyph { layer: layer.to_string(), key: key.clone() });
            }
        }
    }
    Ok(out)
}

// ══════════════════════════════════════════════════════════════
// Validated layers (what the level simulation consumes)
// ══════════════════════════════════════════════════════════════

/// Spawn points, guaranteed non-empty by construction.
#[derive(Clone, Debug)]
pub struct SpawnPoints(Vec<Vec2>);

impl SpawnPoints {
    fn new(points: Vec<Vec2>) -> Option<Self> {
        if points.is_empty() { None } else { Some(SpawnPoints(points)) }
    }

    /// Pick one with an index in `0..len`, as produced by the caller's RNG.
    pub fn get(&self, index: usize) -> Vec2 {
        self.0[index % self.0.len()]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.0.iter()
    }
}

/// A moving object as described by the map, before it is spawned.
#[derive(Clone, Debug)]
pub struct ObstacleSpec {
    pub position: Vec2,
    pub props: ObstacleProperties,
    pub glyph: char,
}

#[derive(Clone, Debug)]
pub struct GoalSpec {
    pub position: Vec2,
    pub glyph: char,
}

/// The four gameplay layers, validated and resolved to typed data.
#[derive(Clone, Debug)]
pub struct LevelLayers {
    pub name: String,
    pub geometry: TileGeometry,
    pub spawns: SpawnPoints,
    pub goals: Vec<GoalSpec>,
    pub obstacles: Vec<ObstacleSpec>,
    pub deadly: HashSet<(i32, i32)>,
    /// Deadly tiles with glyphs, for drawing.
    pub deadly_tiles: Vec<TileRecord>,
}

impl LevelLayers {
    pub fn from_map(map: &TileMap) -> Result<Self, MapError> {
        for kind in LayerKind::ALL {
            let layer = map.layer(kind).ok_or(MapError::MissingLayer(kind.name()))?;
            if kind.requires_tiles() && layer.tiles.is_empty() {
                return Err(MapError::EmptyLayer(kind.name()));
            }
        }
        let tiles = |kind: LayerKind| -> &[TileRecord] {
            map.layer(kind).map(|l| l.tiles.as_slice()).unwrap_or(&[])
        };

        let spawns = SpawnPoints::new(tiles(LayerKind::StartPos).iter().map(|t| t.position).collect())
            .ok_or(MapError::EmptyLayer(LayerKind::StartPos.name()))?;

        let goals = tiles(LayerKind::Goal).iter()
            .map(|t| GoalSpec { position: t.position, glyph: t.glyph })
            .collect();

        let obstacles = tiles(LayerKind::MovingObjects).iter()
            .map(|t| Ok(ObstacleSpec {
                position: t.position,
                props: obstacle_properties(t)?,
                glyph: t.glyph,
            }))
            .collect::<Result<Vec<_>, MapError>>()?;

        let deadly_tiles = tiles(LayerKind::Deadly).to_vec();
        let deadly = deadly_tiles.iter().map(|t| (t.col as i32, t.row as i32)).collect();

        Ok(LevelLayers {
            name: map.name.clone(),
            geometry: map.geometry,
            spawns,
            goals,
            obstacles,
            deadly,
            deadly_tiles,
        })
    }

    pub fn is_deadly_cell(&self, cell: (i32, i32)) -> bool {
        self.deadly.contains(&cell)
    }
}

/// Resolve `x-speed`, `y-speed` (default 0) and `ridable` (default false).
fn obstacle_properties(tile: &TileRecord) -> Result<ObstacleProperties, MapError> {
    let number = |key: &str| -> Result<f32, MapError> {
        match tile.properties.get(key) {
            None => Ok(0.0),
            Some(toml::Value::Float(f)) => Ok(*f as f32),
            Some(toml::Value::Integer(i)) => Ok(*i as f32),
            Some(_) => Err(MapError::BadProperty {
                glyph: tile.glyph,
                key: key.to_string(),
                expected: "a number",
            }),
        }
    };
    let ridable = match tile.properties.get("ridable") {
        None => false,
        Some(toml::Value::Boolean(b)) => *b,
        Some(_) => {
            return Err(MapError::BadProperty {
                glyph: tile.glyph,
                key: "ridable".to_string(),
                expected: "a boolean",
            });
        }
    };
    Ok(ObstacleProperties {
        x_speed: number("x-speed")?,
        y_speed: number("y-speed")?,
        ridable,
    })
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
