use fuelbot::{ChatLog, Config, Exchange, Location, Outcome, Submission};
use ratatui::layout::Rect;
use tracing::debug;

pub struct App {
    pub should_quit: bool,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars, not bytes

    // Conversation
    pub log: ChatLog,
    pub exchange: Exchange,
    pub suggestions: Vec<String>,

    // Chat pane scrolling, updated during render
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub max_scroll: u16,
    pub chat_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for typing dots
    pub location: Option<Location>,
    pub backend_url: String,
}

impl App {
    pub fn new(config: &Config, exchange: Exchange) -> Self {
        let location = exchange.location().get();
        let backend_url = exchange.client().base_url().to_string();

        Self {
            should_quit: false,

            input: String::new(),
            cursor: 0,

            log: ChatLog::new(),
            exchange,
            suggestions: config.suggestions.iter().take(4).cloned().collect(),

            chat_scroll: 0,
            follow_bottom: true,
            max_scroll: 0,
            chat_area: None,

            animation_frame: 0,
            location,
            backend_url,
        }
    }

    /// Enter: shows the current input and returns the submission to send.
    /// Blank input does nothing.
    pub fn submit_input(&mut self) -> Option<Submission> {
        let submission = self.exchange.begin(&mut self.log, &self.input)?;
        self.input.clear();
        self.cursor = 0;
        self.follow_bottom = true;
        Some(submission)
    }

    /// F1..F4: puts suggestion `number` in the input and submits it.
    pub fn submit_suggestion(&mut self, number: u8) -> Option<Submission> {
        let index = usize::from(number).checked_sub(1)?;
        let text = self.suggestions.get(index)?.clone();
        self.input = text;
        self.cursor = self.input.chars().count();
        self.submit_input()
    }

    pub fn receive_reply(&mut self, outcome: Outcome) {
        let state = outcome.apply(&mut self.log);
        debug!(?state, pending = self.log.pending(), "reply rendered");
        self.follow_bottom = true;
    }

    pub fn located(&mut self, location: Location) {
        self.location = Some(location);
    }

    pub fn is_waiting(&self) -> bool {
        self.log.pending() > 0
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.min(self.max_scroll).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll);
        if self.chat_scroll == self.max_scroll {
            self.follow_bottom = true;
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.max_scroll;
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
