use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use fuelbot::Submission;
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::app::App;
use crate::tui::AppEvent;

const PAGE: u16 = 10;

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Reply(outcome) => app.receive_reply(outcome),
        AppEvent::Located(location) => app.located(location),
    }
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Enter => {
            if let Some(submission) = app.submit_input() {
                spawn_delivery(app, submission, tx);
            }
        }
        KeyCode::F(n @ 1..=4) => {
            if let Some(submission) = app.submit_suggestion(n) {
                spawn_delivery(app, submission, tx);
            }
        }

        // Input editing
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_to_bottom(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),

        // Chat scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(PAGE),
        KeyCode::PageDown => app.scroll_down(PAGE),

        _ => {}
    }
}

/// Sends the request in the background. The reply comes back through the
/// event queue so only the UI loop touches the log. Earlier submissions still
/// in flight are left alone.
fn spawn_delivery(app: &App, submission: Submission, tx: &UnboundedSender<AppEvent>) {
    let client = app.exchange.client().clone();
    let tx = tx.clone();
    debug!(typing = ?submission.typing, in_flight = app.log.pending(), "spawning chat request");

    tokio::spawn(async move {
        let outcome = submission.deliver(&client).await;
        let _ = tx.send(AppEvent::Reply(outcome));
    });
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
