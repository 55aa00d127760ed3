/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD, or the
/// shared data directories. Falls back to sensible defaults if the file is
/// missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub rules: RulesConfig,
    pub timing: TimingConfig,
    pub gamepad: GamepadConfig,
    /// Map file to play. `None` selects the embedded map.
    pub map_file: Option<PathBuf>,
    /// Fixed RNG seed for a reproducible session.
    pub seed: Option<u64>,
}

/// Per-session game rules consumed by the level simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct RulesConfig {
    pub starting_lives: u32,
    pub level_time_secs: f32,
    pub goal_score: u32,
    pub level_clear_bonus: u32,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub frame_ms: u64,
    /// Upper bound for one frame's delta time (stalls, suspended terminal).
    pub max_frame_secs: f32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub fire: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            starting_lives: default_lives(),
            level_time_secs: default_level_time(),
            goal_score: default_goal_score(),
            level_clear_bonus: default_clear_bonus(),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_lives")]
    starting_lives: u32,
    #[serde(default = "default_level_time")]
    level_time_secs: f32,
    #[serde(default = "default_goal_score")]
    goal_score: u32,
    #[serde(default = "default_clear_bonus")]
    level_clear_bonus: u32,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
    #[serde(default = "default_max_frame")]
    max_frame_secs: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_fire")]
    fire: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_map_file")]
    map_file: String,
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_lives() -> u32 { 3 }
fn default_level_time() -> f32 { 60.0 }
fn default_goal_score() -> u32 { 100 }
fn default_clear_bonus() -> u32 { 500 }

fn default_frame_ms() -> u64 { 33 }      // ~30 fps
fn default_max_frame() -> f32 { 0.25 }

fn default_fire() -> Vec<String> { vec!["A".into(), "B".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into(), "A".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_map_file() -> String { "maps/default.toml".into() }

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            starting_lives: default_lives(),
            level_time_secs: default_level_time(),
            goal_score: default_goal_score(),
            level_clear_bonus: default_clear_bonus(),
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            frame_ms: default_frame_ms(),
            max_frame_secs: default_max_frame(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            fire: default_fire(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            map_file: default_map_file(),
            seed: None,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, current working directory, data dirs.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::from_toml(toml_cfg, &search_dirs)
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let map_file = resolve_map_file(&toml_cfg.general.map_file, search_dirs);
        if map_file.is_none() {
            log::info!("Map file '{}' not found, using the built-in map", toml_cfg.general.map_file);
        }

        GameConfig {
            rules: RulesConfig {
                // Zero lives would end every session on its first tick.
                starting_lives: toml_cfg.rules.starting_lives.max(1),
                level_time_secs: if toml_cfg.rules.level_time_secs > 0.0 {
                    toml_cfg.rules.level_time_secs
                } else {
                    default_level_time()
                },
                goal_score: toml_cfg.rules.goal_score,
                level_clear_bonus: toml_cfg.rules.level_clear_bonus,
            },
            timing: TimingConfig {
                frame_ms: toml_cfg.timing.frame_ms.clamp(5, 200),
                max_frame_secs: toml_cfg.timing.max_frame_secs.clamp(0.01, 1.0),
            },
            gamepad: GamepadConfig {
                fire: toml_cfg.gamepad.fire,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
            },
            map_file,
            seed: toml_cfg.general.seed,
        }
    }
}

/// Absolute paths are taken as-is; relative ones are looked up in the
/// search dirs. Returns `None` when no such file exists.
fn resolve_map_file(name: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    search_dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_file())
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/tilehop)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/tilehop");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/tilehop)
    let sys = PathBuf::from("/usr/share/tilehop");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => return parse_toml(&text),
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

fn parse_toml(text: &str) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("config.toml parse error, using default settings: {e}");
            TomlConfig::default()
        }
    }
}
