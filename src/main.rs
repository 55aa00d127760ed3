/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::io::stdout;
use std::time::{Duration, Instant};

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::execute;

use config::GameConfig;
use sim::map::{self, LevelLayers};
use sim::screen::{Launcher, Screen, ScreenEvent};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = GameConfig::load();

    // Load and validate the map before touching the terminal, so a bad map
    // is reported on a normal screen.
    let tile_map = map::load_map_or_embedded(config.map_file.as_deref())?;
    LevelLayers::from_map(&tile_map)?;
    let launcher = Launcher::new(tile_map, config.rules.clone(), config.seed);

    let mut renderer = Renderer::new();
    renderer.init()?;
    let enhanced = enable_key_release();

    let result = game_loop(&mut renderer, &launcher, &config, enhanced);

    // Restore the terminal before reporting anything.
    if enhanced {
        let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
    }
    let cleanup = renderer.cleanup();
    let last_score = result?;
    cleanup?;

    println!();
    println!("Thanks for playing Tile Hop!");
    if let Some(score) = last_score {
        println!("Last Score: {score}");
    }
    Ok(())
}

/// Ask the terminal to report key releases. Returns whether it agreed.
fn enable_key_release() -> bool {
    match crossterm::terminal::supports_keyboard_enhancement() {
        Ok(true) => {
            let pushed = execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            );
            match pushed {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("keyboard enhancement failed: {e}");
                    false
                }
            }
        }
        _ => false,
    }
}

/// Runs until the player quits from the intro screen or presses Ctrl+C.
/// Returns the score of the last finished session, if any.
fn game_loop(
    renderer: &mut Renderer,
    launcher: &Launcher,
    config: &GameConfig,
    honor_release: bool,
) -> Result<Option<u32>, Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);

    let frame_period = Duration::from_millis(config.timing.frame_ms);
    let mut screen = Screen::Intro;
    let mut last_score = None;
    let mut last_frame = Instant::now();

    loop {
        let frame_start = Instant::now();
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        for &input in kb.events().iter().chain(gp.events()) {
            screen = screen.transition(ScreenEvent::Input(input), launcher)?;
            if screen.is_exit() {
                return Ok(last_score);
            }
        }

        // Real elapsed time, clamped so a stalled terminal can't skip a lane.
        let dt = frame_start
            .duration_since(last_frame)
            .as_secs_f32()
            .min(config.timing.max_frame_secs);
        last_frame = frame_start;
        screen = screen.transition(ScreenEvent::Tick(dt), launcher)?;

        if let Screen::GameOver { score, .. } = &screen {
            last_score = Some(*score);
        }

        renderer.render(&screen, gp.connected)?;

        let spent = frame_start.elapsed();
        if spent < frame_period {
            std::thread::sleep(frame_period - spent);
        }
    }

    Ok(last_score)
}
