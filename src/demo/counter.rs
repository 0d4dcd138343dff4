use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;

use canvas_core::ipc::protocol::StatePayload;
use canvas_core::CanvasModel;

const WIDTH: u16 = 40;
const HEIGHT: u16 = 5;

/// Editing mode of the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keys change the counter
    Normal,
    /// Keys edit the label buffer
    Insert,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Insert => "insert",
        }
    }
}

/// Mutable state behind the demo model
#[derive(Debug, Clone)]
pub struct CounterState {
    pub count: i64,
    pub label: String,
    pub mode: Mode,
    /// Label being typed in insert mode
    pub buffer: String,
    pub focused: bool,
}

impl Default for CounterState {
    fn default() -> Self {
        Self {
            count: 0,
            label: "Counter".to_string(),
            mode: Mode::Normal,
            buffer: String::new(),
            focused: true,
        }
    }
}

impl CounterState {
    /// Apply a key press
    ///
    /// Normal mode: `up`/`k`/`+` increment, `down`/`j`/`-` decrement, `r`
    /// resets, `i` enters insert mode. Insert mode: characters extend the
    /// buffer, `backspace` trims it, `enter` commits it as the label and
    /// `esc` discards it.
    pub fn handle_key(&mut self, key: &str, rune: Option<char>) -> Result<()> {
        let ch = rune.or_else(|| single_char(key));
        match self.mode {
            Mode::Normal => match (key, ch) {
                ("up", _) | (_, Some('k' | '+')) => self.step(1)?,
                ("down", _) | (_, Some('j' | '-')) => self.step(-1)?,
                (_, Some('r')) => self.count = 0,
                (_, Some('i')) => {
                    self.mode = Mode::Insert;
                    self.buffer.clear();
                }
                _ => bail!("unbound key in normal mode: {}", key),
            },
            Mode::Insert => match (key, ch) {
                ("enter", _) => {
                    self.label = std::mem::take(&mut self.buffer);
                    self.mode = Mode::Normal;
                }
                ("esc", _) => {
                    self.buffer.clear();
                    self.mode = Mode::Normal;
                }
                ("backspace", _) => {
                    self.buffer.pop();
                }
                (_, Some(c)) => self.buffer.push(c),
                _ => bail!("unbound key in insert mode: {}", key),
            },
        }
        Ok(())
    }

    fn step(&mut self, delta: i64) -> Result<()> {
        match self.count.checked_add(delta) {
            Some(n) => self.count = n,
            None => bail!("counter overflow"),
        }
        Ok(())
    }

    /// Apply literal text: sets the counter when numeric, otherwise types
    /// into the label buffer (insert mode only)
    pub fn handle_input(&mut self, text: &str) -> Result<()> {
        if let Ok(n) = text.trim().parse::<i64>() {
            self.count = n;
            return Ok(());
        }
        if self.mode != Mode::Insert {
            bail!("not a number: {:?}", text);
        }
        self.buffer.push_str(text);
        Ok(())
    }

    pub fn snapshot(&self) -> StatePayload {
        let mut state = StatePayload::default()
            .with_custom("count", self.count)
            .with_custom("label", self.label.clone())
            .with_size(WIDTH, HEIGHT)
            .with_mode(self.mode.as_str())
            .with_focus(self.focused);
        if self.mode == Mode::Insert {
            state = state.with_input(self.buffer.clone(), self.buffer.chars().count());
        }
        state
    }

    /// Render the counter box with ANSI styling
    pub fn render(&self) -> String {
        let inner = usize::from(WIDTH) - 2;
        let border = "─".repeat(inner);
        let title = format!(" {} ", self.label);
        let value = format!("\x1b[1m{}\x1b[0m", self.count);
        let pad = inner.saturating_sub(self.count.to_string().len() + 2);

        let mut out = String::new();
        out.push_str(&format!("┌{}┐\n", border));
        out.push_str(&format!("│{:<inner$}│\n", title, inner = inner));
        out.push_str(&format!("│  {}{}│\n", value, " ".repeat(pad)));
        match self.mode {
            Mode::Normal => out.push_str(&format!(
                "│{:<inner$}│\n",
                " k/j: +/-  r: reset  i: rename",
                inner = inner
            )),
            Mode::Insert => out.push_str(&format!(
                "│{:<inner$}│\n",
                format!(" > {}_", self.buffer),
                inner = inner
            )),
        }
        out.push_str(&format!("└{}┘\n", border));
        out
    }
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Counter exposed as a canvas model with all four capabilities
#[derive(Debug, Clone, Default)]
pub struct Counter {
    state: Arc<Mutex<CounterState>>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn current(&self) -> CounterState {
        self.state.lock().clone()
    }

    /// Build the model; every callback shares this counter's state
    pub fn model(&self) -> CanvasModel {
        let state = self.state.clone();
        let view = self.state.clone();
        let keys = self.state.clone();
        let input = self.state.clone();

        CanvasModel::new()
            .with_state(move || state.lock().snapshot())
            .with_view(move || view.lock().render())
            .with_key_handler(move |key, rune| keys.lock().handle_key(key, rune))
            .with_input_handler(move |text| input.lock().handle_input(text))
    }
}
