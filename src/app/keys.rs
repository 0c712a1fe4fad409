// SPDX-License-Identifier: GPL-3.0-only

//! Keyboard shortcuts

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// User actions reachable from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SavePhoto,
    ToggleRecording,
    ToggleOverlay,
    SwitchCamera,
    Quit,
}

/// Map a key press to an action
///
/// Letters are matched case-insensitively. Key releases and repeats are
/// ignored so one press triggers one action.
pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::Quit)
        }
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::SavePhoto),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'v' => Some(Action::ToggleRecording),
            't' => Some(Action::ToggleOverlay),
            'c' => Some(Action::SwitchCamera),
            'q' => Some(Action::Quit),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_letters_are_case_insensitive() {
        for c in ['v', 'V'] {
            let key = press(KeyCode::Char(c), KeyModifiers::NONE);
            assert_eq!(action_for(&key), Some(Action::ToggleRecording));
        }
        let key = press(KeyCode::Char('Q'), KeyModifiers::SHIFT);
        assert_eq!(action_for(&key), Some(Action::Quit));
    }

    #[test]
    fn test_ctrl_c_quits_instead_of_switching() {
        let key = press(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(action_for(&key), Some(Action::Quit));
        let key = press(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(action_for(&key), Some(Action::SwitchCamera));
    }

    #[test]
    fn test_space_and_escape() {
        assert_eq!(
            action_for(&press(KeyCode::Char(' '), KeyModifiers::NONE)),
            Some(Action::SavePhoto)
        );
        assert_eq!(action_for(&press(KeyCode::Esc, KeyModifiers::NONE)), Some(Action::Quit));
        assert_eq!(action_for(&press(KeyCode::Char('x'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_release_is_ignored() {
        let mut key = press(KeyCode::Char('v'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(action_for(&key), None);
    }
}
