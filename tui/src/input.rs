//! Input Sources
//!
//! [`KeyboardInput`] maps the four LCD buttons onto keys. [`ScriptedInput`]
//! presses the buttons for a headless run and closes after a fixed time.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use picalc_core::{Algorithm, InputEvent, InputPoll, InputSource, SurfaceError};

/// What a key press means
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// One of the four buttons
    Press(InputEvent),
    /// Leave the application
    Quit,
}

/// Map a key to a button
///
/// Left or `1` selects Leibniz, Right or `2` selects Nilakantha, Space or
/// `s` starts and stops, `r` resets. `q`, Esc and Ctrl-C quit.
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Esc | KeyCode::Char('q' | 'Q') => KeyAction::Quit,
        KeyCode::Left | KeyCode::Char('1') => KeyAction::Press(InputEvent::SelectLeft),
        KeyCode::Right | KeyCode::Char('2') => KeyAction::Press(InputEvent::SelectRight),
        KeyCode::Char(' ' | 's' | 'S') => KeyAction::Press(InputEvent::StartStop),
        KeyCode::Char('r' | 'R') => KeyAction::Press(InputEvent::Reset),
        _ => return None,
    };
    Some(action)
}

/// Reads pending key presses from the terminal without blocking
#[derive(Debug, Default)]
pub struct KeyboardInput {
    closed: bool,
}

impl KeyboardInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for KeyboardInput {
    fn poll(&mut self) -> Result<InputPoll, SurfaceError> {
        if self.closed {
            return Ok(InputPoll::Closed);
        }

        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            match map_key(&key) {
                Some(KeyAction::Press(input)) => events.push(input),
                Some(KeyAction::Quit) => {
                    self.closed = true;
                    break;
                }
                None => {}
            }
        }

        // Presses read before the quit key still count.
        if self.closed && events.is_empty() {
            return Ok(InputPoll::Closed);
        }
        Ok(InputPoll::Events(events))
    }
}

/// Selects one algorithm, starts it and closes after `run_for`
#[derive(Debug)]
pub struct ScriptedInput {
    algorithm: Algorithm,
    run_for: Duration,
    started: Option<Instant>,
}

impl ScriptedInput {
    pub fn new(algorithm: Algorithm, run_for: Duration) -> Self {
        Self {
            algorithm,
            run_for,
            started: None,
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Result<InputPoll, SurfaceError> {
        let Some(started) = self.started else {
            self.started = Some(Instant::now());
            let select = match self.algorithm {
                Algorithm::Leibniz => InputEvent::SelectLeft,
                Algorithm::Nilakantha => InputEvent::SelectRight,
            };
            return Ok(InputPoll::Events(vec![select, InputEvent::StartStop]));
        };

        if started.elapsed() >= self.run_for {
            Ok(InputPoll::Closed)
        } else {
            Ok(InputPoll::Events(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyEventState;
    use pretty_assertions::assert_eq;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_button_keys() {
        assert_eq!(
            map_key(&press(KeyCode::Left)),
            Some(KeyAction::Press(InputEvent::SelectLeft))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('2'))),
            Some(KeyAction::Press(InputEvent::SelectRight))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char(' '))),
            Some(KeyAction::Press(InputEvent::StartStop))
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('r'))),
            Some(KeyAction::Press(InputEvent::Reset))
        );
        assert_eq!(map_key(&press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(map_key(&press(KeyCode::Esc)), Some(KeyAction::Quit));
        assert_eq!(map_key(&press(KeyCode::Char('q'))), Some(KeyAction::Quit));
        assert_eq!(
            map_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        );
    }

    #[test]
    fn test_release_is_ignored() {
        let release = KeyEvent {
            code: KeyCode::Left,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(map_key(&release), None);
    }

    #[test]
    fn test_scripted_input_runs_then_closes() {
        let mut input = ScriptedInput::new(Algorithm::Nilakantha, Duration::from_millis(20));

        match input.poll().unwrap() {
            InputPoll::Events(events) => {
                assert_eq!(events, vec![InputEvent::SelectRight, InputEvent::StartStop]);
            }
            InputPoll::Closed => panic!("closed before starting"),
        }
        assert!(matches!(input.poll().unwrap(), InputPoll::Events(e) if e.is_empty()));

        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(input.poll().unwrap(), InputPoll::Closed));
    }
}
