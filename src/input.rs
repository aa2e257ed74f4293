//! Input thread: forwards terminal key events to the UI loop so the loop can
//! multiplex them with the message queue.

use std::thread;

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Backspace,
    Submit,
    Quit,
    Resize,
}

/// Blocks on terminal events and forwards the ones the loop cares about.
/// Exits when the receiving side goes away.
pub fn spawn_input_thread(tx: Sender<InputEvent>) {
    let result = thread::Builder::new()
        .name("input".to_string())
        .spawn(move || loop {
            let event = match event::read() {
                Ok(event) => event,
                Err(err) => {
                    log_debug(&format!("input read failed: {err}"));
                    break;
                }
            };
            let mapped = match event {
                Event::Key(key) if key.kind != KeyEventKind::Release => map_key(key),
                Event::Resize(_, _) => Some(InputEvent::Resize),
                _ => None,
            };
            if let Some(mapped) = mapped {
                if tx.send(mapped).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = result {
        log_debug(&format!("couldn't spawn input thread: {err}"));
    }
}

fn map_key(key: KeyEvent) -> Option<InputEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => Some(InputEvent::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(c) => Some(InputEvent::Char(c)),
        KeyCode::Backspace => Some(InputEvent::Backspace),
        KeyCode::Enter => Some(InputEvent::Submit),
        _ => None,
    }
}
