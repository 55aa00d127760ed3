/// Screen controller: which view is active, and how views change.
///
///   Intro ──any key──▶ Playing ──session over──▶ GameOver ──any key──▶ Intro
///     │
///     └──quit──▶ Exit
///
/// `transition` consumes the current screen and returns the next one; the
/// shell holds exactly one `Screen` and never reaches across views.

use crate::config::RulesConfig;
use crate::domain::entity::{Action, InputEvent};
use super::event::{EndReason, GameEvent};
use super::map::{MapError, TileMap};
use super::step;
use super::world::{Level, Phase};

/// Builds a fresh level for every new session.
pub struct Launcher {
    pub map: TileMap,
    pub rules: RulesConfig,
    pub seed: Option<u64>,
}

impl Launcher {
    pub fn new(map: TileMap, rules: RulesConfig, seed: Option<u64>) -> Self {
        Launcher { map, rules, seed }
    }

    pub fn start_session(&self) -> Result<Level, MapError> {
        Level::start_level(&self.map, self.rules.clone(), self.seed)
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ScreenEvent {
    Input(InputEvent),
    /// One frame elapsed, in seconds.
    Tick(f32),
}

pub enum Screen {
    Intro,
    Playing(Box<Level>),
    GameOver { score: u32, reason: EndReason },
    Exit,
}

impl Screen {
    pub fn transition(self, event: ScreenEvent, launcher: &Launcher) -> Result<Screen, MapError> {
        let next = match (self, event) {
            (Screen::Intro, ScreenEvent::Input(InputEvent::KeyDown(Action::Quit))) => Screen::Exit,
            (Screen::Intro, ScreenEvent::Input(InputEvent::KeyDown(_))) => {
                Screen::Playing(Box::new(launcher.start_session()?))
            }

            (Screen::Playing(mut level), ScreenEvent::Input(input)) => {
                match level.handle_input(input) {
                    Some(GameEvent::SessionOver { score, reason }) => Screen::GameOver { score, reason },
                    _ => Screen::Playing(level),
                }
            }
            (Screen::Playing(mut level), ScreenEvent::Tick(dt)) => {
                step::tick(&mut level, dt);
                match level.phase() {
                    Phase::Playing => Screen::Playing(level),
                    Phase::SessionOver(reason) => Screen::GameOver { score: level.score(), reason },
                }
            }

            (Screen::GameOver { .. }, ScreenEvent::Input(InputEvent::KeyDown(_))) => Screen::Intro,

            (screen, _) => screen,
        };
        Ok(next)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Screen::Exit)
    }
}
