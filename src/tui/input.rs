use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::console::Command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiAction {
    Command(Command),
    Pad(usize),
    Nudge(i32),
    ToggleDim,
    Drag { column: u16, row: u16 }, // left button down or dragging, screen cells
    Reset,
    Quit,
}

// blocking: run on its own thread, ends once the receiver is gone
pub fn forward_keys(tx: UnboundedSender<UiAction>) {
    loop {
        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("terminal input failed: {e}");
                let _ = tx.send(UiAction::Quit);
                return;
            }
        };
        if let Some(action) = handle_event(event)
            && tx.send(action).is_err()
        {
            return;
        }
    }
}

pub fn handle_event(event: Event) -> Option<UiAction> {
    match event {
        Event::Key(key) => handle_key(key),
        Event::Mouse(mouse) => handle_mouse(mouse),
        _ => None,
    }
}

fn handle_mouse(mouse: MouseEvent) -> Option<UiAction> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
            Some(UiAction::Drag {
                column: mouse.column,
                row: mouse.row,
            })
        }
        _ => None,
    }
}

pub fn handle_key(key: KeyEvent) -> Option<UiAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        // raw mode swallows the signal, so ctrl-c has to quit by hand
        return matches!(key.code, KeyCode::Char('c')).then_some(UiAction::Quit);
    }
    let action = match key.code {
        KeyCode::Char(' ') => UiAction::Command(Command::Go),
        KeyCode::Up => UiAction::Command(Command::SelectPrevious),
        KeyCode::Down => UiAction::Command(Command::SelectNext),
        KeyCode::Char('s') => UiAction::Command(Command::StopSelected),
        KeyCode::Esc => UiAction::Command(Command::StopAll),
        KeyCode::Char('p') => UiAction::Command(Command::TogglePause),

        // pads 1..9
        KeyCode::Char(c @ '1'..='9') => UiAction::Pad(c as usize - '1' as usize),

        // master fader
        KeyCode::Char('-') => UiAction::Nudge(-1),
        KeyCode::Char('=') | KeyCode::Char('+') => UiAction::Nudge(1),
        KeyCode::Char('d') => UiAction::ToggleDim,

        // reload media from disk
        KeyCode::Char('r') => UiAction::Reset,

        KeyCode::Char('q') => UiAction::Quit,
        _ => return None,
    };
    Some(action)
}
