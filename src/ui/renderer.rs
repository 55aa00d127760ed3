/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.
///
/// One map tile is two terminal columns wide, so moving entities are
/// placed with half-tile horizontal precision.

use std::io::{self, BufWriter, Write};
use std::mem::Discriminant;

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use glam::Vec2;

use crate::domain::entity::MoveDir;
use crate::domain::tile::TileGeometry;
use crate::sim::event::EndReason;
use crate::sim::screen::Screen;
use crate::sim::world::Level;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool,    // true = this char occupies 2 terminal columns
    cont: bool,    // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, also used
    /// for `Clear`, so inter-row gaps match the cell color.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 4],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::from_char(c, fg, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or("")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    /// Write a string horizontally centered within `width` columns.
    fn put_centered(&mut self, width: usize, y: usize, s: &str, fg: Color) {
        let x = width.saturating_sub(s.chars().count()) / 2;
        self.put_str(x, y, s, fg, Color::Reset);
    }
}

// ── Placement ──

/// Total terminal columns per map tile.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Terminal cell (column, row) of the left half of a tile-sized box centered
/// at `pos`, relative to the map origin. `None` when any part is off-map.
fn screen_cell(geo: &TileGeometry, pos: Vec2) -> Option<(usize, usize)> {
    let half = geo.half_tile();
    let col = ((pos.x - half) / half).round();
    let row = (pos.y / geo.tile_size).floor();
    let max_col = (geo.cols * CELL_W) as f32 - 2.0;
    if col < 0.0 || row < 0.0 || col > max_col || row >= geo.rows as f32 {
        return None;
    }
    Some((col as usize, row as usize))
}

/// Like `screen_cell`, but pinned to the map edge. A rider carried past the
/// edge by a wrapping log stays visible.
fn player_cell(geo: &TileGeometry, pos: Vec2) -> Option<(usize, usize)> {
    let half = geo.half_tile();
    let x = pos.x.clamp(half, geo.screen_width() - half);
    let y = pos.y.clamp(half, geo.screen_height() - half);
    screen_cell(geo, Vec2::new(x, y))
}

/// Colors for a deadly tile, keyed by its glyph.
fn deadly_style(glyph: char) -> (char, Color, Color) {
    match glyph {
        '~' => ('~', Color::Rgb { r: 90, g: 140, b: 255 }, Color::Rgb { r: 20, g: 40, b: 110 }),
        '#' => ('▒', Color::Rgb { r: 40, g: 140, b: 40 }, Color::Rgb { r: 10, g: 60, b: 10 }),
        other => (other, Color::Rgb { r: 255, g: 80, b: 80 }, Color::Rgb { r: 80, g: 0, b: 0 }),
    }
}

/// Colors for a moving object: logs are brown, cars take a color per glyph.
fn obstacle_style(glyph: char, ridable: bool) -> (char, Color, Color) {
    if ridable {
        return ('═', Color::Rgb { r: 230, g: 190, b: 130 }, Color::Rgb { r: 110, g: 70, b: 30 });
    }
    let palette = [
        Color::Rgb { r: 230, g: 60, b: 60 },
        Color::Rgb { r: 240, g: 200, b: 40 },
        Color::Rgb { r: 80, g: 200, b: 255 },
        Color::Rgb { r: 220, g: 120, b: 255 },
    ];
    let bg = palette[glyph as usize % palette.len()];
    ('█', bg, bg)
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<Discriminant<Screen>>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, screen: &Screen, gamepad_connected: bool) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Screen change → clear for clean transition
        let kind = std::mem::discriminant(screen);
        if self.last_screen != Some(kind) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(kind);
        }

        self.front.clear();

        match screen {
            Screen::Intro => self.compose_intro(gamepad_connected),
            Screen::Playing(level) => self.compose_game(level),
            Screen::GameOver { score, reason } => self.compose_game_over(*score, *reason),
            Screen::Exit => {}
        }

        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors, never ResetColor (terminal default may differ).
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                // Skip continuation cells (right half of wide emoji)
                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                // For wide cells, also check if the continuation changed
                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, level: &Level) {
        let buf_w = self.front.width;
        let geo = *level.geometry();
        let map_w = geo.cols * CELL_W;

        // ── HUD row ──
        let hud_bg = Color::Rgb { r: 20, g: 20, b: 60 };
        let hud = format!(
            " Level {:<2}  Score {:<6}  ♥×{}  Time {:>2} ",
            level.level_number(), level.score(), level.lives(), level.time_display(),
        );
        for x in 0..buf_w {
            self.front.set(x, HUD_ROW, Cell::from_char(' ', Color::White, hud_bg));
        }
        self.front.put_str(0, HUD_ROW, &hud, Color::White, hud_bg);

        // ── Ground ──
        let ground = Color::Rgb { r: 30, g: 30, b: 30 };
        for row in 0..geo.rows {
            for col in 0..map_w {
                self.front.set(col, MAP_ROW + row, Cell::from_char(' ', Color::White, ground));
            }
        }
        for tile in &level.layers().deadly_tiles {
            let (ch, fg, bg) = deadly_style(tile.glyph);
            let col = tile.col * CELL_W;
            self.front.set(col, MAP_ROW + tile.row, Cell::from_char(ch, fg, bg));
            self.front.set(col + 1, MAP_ROW + tile.row, Cell::from_char(ch, fg, bg));
        }

        let pad = Color::Rgb { r: 60, g: 40, b: 90 };
        for &spawn in level.layers().spawns.iter() {
            if let Some((col, row)) = screen_cell(&geo, spawn) {
                self.front.set(col, MAP_ROW + row, Cell::from_char('░', Color::DarkMagenta, pad));
                self.front.set(col + 1, MAP_ROW + row, Cell::from_char('░', Color::DarkMagenta, pad));
            }
        }

        // ── Goals ──
        for (goal, pos) in level.goals() {
            let Some((col, row)) = screen_cell(&geo, pos) else { continue };
            if goal.glyph == 'G' {
                self.front.set(col, MAP_ROW + row, Cell::from_char_wide('⭐', Color::Reset, ground));
                self.front.set(col + 1, MAP_ROW + row, Cell::WIDE_CONT);
            } else {
                self.front.set(col, MAP_ROW + row, Cell::from_char(goal.glyph, Color::Yellow, ground));
                self.front.set(col + 1, MAP_ROW + row, Cell::from_char(' ', Color::Yellow, ground));
            }
        }

        // ── Moving objects ──
        for (obstacle, pos) in level.obstacles() {
            if let Some((col, row)) = screen_cell(&geo, pos) {
                let (ch, fg, bg) = obstacle_style(obstacle.glyph, obstacle.props.ridable);
                self.front.set(col, MAP_ROW + row, Cell::from_char(ch, fg, bg));
                self.front.set(col + 1, MAP_ROW + row, Cell::from_char(ch, fg, bg));
            }
        }

        // ── Player ──
        if let Some((col, row)) = player_cell(&geo, level.player_position()) {
            let ch = match level.player().facing {
                MoveDir::Up => '▲',
                MoveDir::Down => '▼',
                MoveDir::Left => '◀',
                MoveDir::Right => '▶',
            };
            let fg = Color::Rgb { r: 80, g: 255, b: 80 };
            // Riding: keep the log's colour under the player.
            let bg = match level.ridden_obstacle() {
                Some(o) => obstacle_style(o.glyph, o.props.ridable).2,
                None => Color::Rgb { r: 0, g: 90, b: 0 },
            };
            self.front.set(col, MAP_ROW + row, Cell::from_char(ch, fg, bg));
            self.front.set(col + 1, MAP_ROW + row, Cell::from_char(ch, fg, bg));
        }

        // ── Help bar ──
        let help_row = MAP_ROW + geo.rows + 1;
        if help_row < self.front.height {
            let help = format!(" Arrows/WASD: Hop  Esc: Quit  Seed {}", level.seed());
            self.front.put_str(0, help_row, &help, Color::DarkGrey, Color::Reset);
        }
    }

    // ── Static screens ──

    fn compose_intro(&mut self, gamepad_connected: bool) {
        let w = self.front.width.min(60);
        let title = [
            r" _____ _ _      _  _            ",
            r"|_   _(_) |___ | || |___ _ __   ",
            r"  | | | | / -_)| __ / _ \ '_ \  ",
            r"  |_| |_|_\___||_||_\___/ .__/  ",
            r"                        |_|     ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_centered(w, 2 + i, line, Color::Rgb { r: 80, g: 255, b: 80 });
        }

        let dim = Color::DarkGrey;
        let lines = [
            ("Cross the road, ride the logs over the river,", Color::White),
            ("and fill every goal bay before time runs out.", Color::White),
            ("", dim),
            ("Arrows / WASD   hop one tile", dim),
            ("Esc             give up", dim),
        ];
        for (i, (text, fg)) in lines.iter().enumerate() {
            self.front.put_centered(w, 9 + i, text, *fg);
        }

        self.front.put_centered(w, 16, "▸ Press any key to start ◂", Color::Rgb { r: 255, g: 220, b: 50 });
        if gamepad_connected {
            self.front.put_centered(w, 18, "Gamepad connected", dim);
        }
    }

    fn compose_game_over(&mut self, score: u32, reason: EndReason) {
        let w = self.front.width.min(60);
        let box_art = [
            "╔══════════════════════════════╗",
            "║          GAME  OVER          ║",
            "╚══════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_centered(w, 4 + i, l, Color::Rgb { r: 255, g: 60, b: 60 });
        }
        let why = match reason {
            EndReason::TimeUp => "Time ran out",
            EndReason::OutOfLives => "No lives left",
            EndReason::Quit => "You gave up",
        };
        self.front.put_centered(w, 8, why, Color::DarkGrey);
        self.front.put_centered(w, 10, &format!("Your score: {score}"), Color::White);
        self.front.put_centered(w, 13, "▸ Press any key ◂", Color::Rgb { r: 80, g: 255, b: 80 });
    }
}
