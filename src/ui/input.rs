/// Keyboard input source.
///
/// Drains crossterm events once per frame and turns them into discrete
/// `InputEvent`s, in arrival order:
///   - Arrow keys / WASD  →  Move
///   - Space              →  Fire
///   - Esc / Q            →  Quit
///
/// Every Press is a move; terminals without keyboard enhancement report
/// auto-repeat as further presses, which matches tapping the key.
/// Release events are only reported when the terminal supports them.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, poll};

use crate::domain::entity::{Action, InputEvent, MoveDir};

pub struct InputState {
    /// Events decoded during the most recent `drain_events()`.
    events: Vec<InputEvent>,

    /// Raw key events collected during drain, for meta-key handling.
    raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            events: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.events.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);
                if let Some(ev) = decode(key, self.honor_release) {
                    self.events.push(ev);
                }
            }
        }
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

/// Key code → action. `None` for keys the game does not use.
pub fn map_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Action::Move(MoveDir::Up)),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Action::Move(MoveDir::Down)),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Action::Move(MoveDir::Left)),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Action::Move(MoveDir::Right)),
        KeyCode::Char(' ') => Some(Action::Fire),
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(Action::Quit),
        _ => None,
    }
}

/// Any other key still counts as a press on the intro and game-over
/// screens, so unmapped presses become `Fire`.
fn decode(key: KeyEvent, honor_release: bool) -> Option<InputEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) { return None; }
    match key.kind {
        KeyEventKind::Press => Some(InputEvent::KeyDown(map_key(key.code).unwrap_or(Action::Fire))),
        KeyEventKind::Release if honor_release => match map_key(key.code) {
            Some(Action::Move(dir)) => Some(InputEvent::KeyUp(dir)),
            _ => None,
        },
        _ => None,
    }
}
