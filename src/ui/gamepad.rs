/// Gamepad input source using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Move (one tile per press)
///   A / B                 →  Fire
///   Start / A             →  Confirm (leaves the intro / game-over screens)
///   Select                →  Quit
///
/// Only presses are reported; the core ignores releases.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::entity::{Action, InputEvent, MoveDir};

const STICK_DEADZONE: f32 = 0.5;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    Start,
    Select,
}

const BTN_COUNT: usize = 8;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Action-to-button mapping (loaded from config).
#[derive(Debug, PartialEq)]
struct ActionMap {
    fire: Vec<Btn>,
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            fire:    vec![Btn::A, Btn::B],
            confirm: vec![Btn::Start, Btn::A],
            cancel:  vec![Btn::Select],
        }
    }
}

impl ActionMap {
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse_list(action: &str, names: &[String]) -> Vec<Btn> {
            names.iter().filter_map(|s| {
                let btn = Btn::from_name(s);
                if btn.is_none() {
                    log::warn!("gamepad.{action}: unknown button name '{s}'");
                }
                btn
            }).collect()
        }
        let mut map = ActionMap::default();
        let fire = parse_list("fire", &cfg.fire);
        if !fire.is_empty() { map.fire = fire; }
        let confirm = parse_list("confirm", &cfg.confirm);
        if !confirm.is_empty() { map.confirm = confirm; }
        let cancel = parse_list("cancel", &cfg.cancel);
        if !cancel.is_empty() { map.cancel = cancel; }
        map
    }

    /// Translate this frame's fresh button presses into actions.
    /// Cancel wins over everything else; fire and confirm collapse into one.
    fn actions(&self, pressed: &[bool; BTN_COUNT]) -> Option<Action> {
        let any = |btns: &[Btn]| btns.iter().any(|&b| pressed[b as usize]);
        if any(&self.cancel) {
            Some(Action::Quit)
        } else if any(&self.fire) || any(&self.confirm) {
            Some(Action::Fire)
        } else {
            None
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    /// Buttons pressed since the last `update()`.
    just_pressed: [bool; BTN_COUNT],
    /// D-pad presses since the last `update()`.
    dpad_presses: Vec<MoveDir>,

    // Stick, digitized; a move fires when a direction crosses the deadzone.
    stick_x: f32,
    stick_y: f32,
    stick: StickEdge,

    action_map: ActionMap,
    events: Vec<InputEvent>,
    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    log::warn!("gamepad support unavailable: {e}");
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            just_pressed: [false; BTN_COUNT],
            dpad_presses: vec![],
            stick_x: 0.0,
            stick_y: 0.0,
            stick: StickEdge::default(),
            action_map: ActionMap::default(),
            events: vec![],
            connected,
        }
    }

    /// Load button mapping from config.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.action_map = ActionMap::from_config(cfg);
    }

    /// Poll the controller and rebuild this frame's events.
    pub fn update(&mut self) {
        self.just_pressed = [false; BTN_COUNT];
        self.dpad_presses.clear();
        self.events.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();

        self.events.extend(self.dpad_presses.iter().map(|&d| InputEvent::KeyDown(Action::Move(d))));
        if let Some(dir) = self.stick.update(self.stick_x, self.stick_y) {
            self.events.push(InputEvent::KeyDown(Action::Move(dir)));
        }
        if let Some(action) = self.action_map.actions(&self.just_pressed) {
            self.events.push(InputEvent::KeyDown(action));
        }
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.press(btn);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    match axis {
                        Axis::LeftStickX => self.stick_x = value,
                        Axis::LeftStickY => self.stick_y = value,
                        _ => {}
                    }
                }
                EventType::Connected => {
                    self.connected = true;
                    log::info!("gamepad connected");
                }
                EventType::Disconnected => {
                    self.connected = false;
                    self.stick_x = 0.0;
                    self.stick_y = 0.0;
                    self.stick = StickEdge::default();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn press(&mut self, gilrs_btn: Button) {
        // D-pad handled separately (not in Btn enum)
        let dir = match gilrs_btn {
            Button::DPadUp    => Some(MoveDir::Up),
            Button::DPadDown  => Some(MoveDir::Down),
            Button::DPadLeft  => Some(MoveDir::Left),
            Button::DPadRight => Some(MoveDir::Right),
            _ => None,
        };
        if let Some(dir) = dir {
            self.dpad_presses.push(dir);
        } else if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.just_pressed[btn as usize] = true;
        }
    }
}

/// Digitized stick: reports a direction only on the frame it is entered.
#[derive(Default, Debug)]
struct StickEdge {
    dir: Option<MoveDir>,
}

impl StickEdge {
    fn update(&mut self, x: f32, y: f32) -> Option<MoveDir> {
        let dir = stick_direction(x, y);
        let fresh = dir.is_some() && dir != self.dir;
        self.dir = dir;
        if fresh { dir } else { None }
    }
}

/// Dominant stick direction outside the deadzone. Stick Y is up-positive.
fn stick_direction(x: f32, y: f32) -> Option<MoveDir> {
    if x.abs() < STICK_DEADZONE && y.abs() < STICK_DEADZONE {
        return None;
    }
    Some(if x.abs() > y.abs() {
        if x < 0.0 { MoveDir::Left } else { MoveDir::Right }
    } else if y > 0.0 {
        MoveDir::Up
    } else {
        MoveDir::Down
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stick_edges_fire_once() {
        let mut stick = StickEdge::default();
        assert_eq!(stick.update(0.0, 0.9), Some(MoveDir::Up));
        assert_eq!(stick.update(0.1, 0.95), None);
        assert_eq!(stick.update(0.0, 0.1), None);
        assert_eq!(stick.update(-0.8, 0.1), Some(MoveDir::Left));
        assert_eq!(stick.update(0.0, -0.7), Some(MoveDir::Down));
    }

    #[test]
    fn config_names_map_to_buttons() {
        let cfg = GamepadConfig {
            fire: vec!["x".into(), "bogus".into()],
            confirm: vec![],
            cancel: vec!["back".into()],
        };
        let map = ActionMap::from_config(&cfg);
        assert_eq!(map.fire, vec![Btn::X]);
        assert_eq!(map.confirm, ActionMap::default().confirm);
        assert_eq!(map.cancel, vec![Btn::Select]);
    }

    #[test]
    fn cancel_beats_fire() {
        let map = ActionMap::default();
        let mut pressed = [false; BTN_COUNT];
        assert_eq!(map.actions(&pressed), None);
        pressed[Btn::A as usize] = true;
        assert_eq!(map.actions(&pressed), Some(Action::Fire));
        pressed[Btn::Select as usize] = true;
        assert_eq!(map.actions(&pressed), Some(Action::Quit));
    }
}
