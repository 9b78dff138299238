use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::InputMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    AddSubscription,
    RefreshSelected,
    RefreshAll,
    DeleteSelected,
    ConfirmDelete,
    CancelDelete,
    OpenWebsite,
    ShowHelp,
    HideHelp,
    // URL / name input actions
    InputChar(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
}

pub fn handle_key_event(key: KeyEvent, input_mode: InputMode, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    match input_mode {
        InputMode::Url | InputMode::Name => {
            return match key.code {
                KeyCode::Enter => Some(AppAction::InputConfirm),
                KeyCode::Esc => Some(AppAction::InputCancel),
                KeyCode::Backspace => Some(AppAction::InputBackspace),
                KeyCode::Char(c) => Some(AppAction::InputChar(c)),
                _ => None,
            };
        }
        InputMode::ConfirmDelete => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(AppAction::ConfirmDelete),
                _ => Some(AppAction::CancelDelete),
            };
        }
        InputMode::Normal => {}
    }

    // Normal mode
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),
        (KeyCode::Char('<'), _) | (KeyCode::Home, _) => Some(AppAction::MoveToTop),
        (KeyCode::Char('>'), _) | (KeyCode::End, _) => Some(AppAction::MoveToBottom),

        (KeyCode::Char('a'), _) => Some(AppAction::AddSubscription),
        (KeyCode::Char('r'), KeyModifiers::NONE) => Some(AppAction::RefreshSelected),
        (KeyCode::Char('R'), _) => Some(AppAction::RefreshAll),
        (KeyCode::Char('d'), _) => Some(AppAction::DeleteSelected),
        (KeyCode::Char('o'), _) => Some(AppAction::OpenWebsite),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_bindings() {
        let normal = |code| handle_key_event(key(code), InputMode::Normal, false);
        assert_eq!(normal(KeyCode::Char('r')), Some(AppAction::RefreshSelected));
        assert_eq!(
            handle_key_event(
                KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT),
                InputMode::Normal,
                false
            ),
            Some(AppAction::RefreshAll)
        );
        assert_eq!(normal(KeyCode::Char('d')), Some(AppAction::DeleteSelected));
        assert_eq!(normal(KeyCode::Char('a')), Some(AppAction::AddSubscription));
        assert_eq!(normal(KeyCode::Char('x')), None);
    }

    #[test]
    fn delete_needs_explicit_yes() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('y')), InputMode::ConfirmDelete, false),
            Some(AppAction::ConfirmDelete)
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Char('d')), InputMode::ConfirmDelete, false),
            Some(AppAction::CancelDelete)
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Enter), InputMode::ConfirmDelete, false),
            Some(AppAction::CancelDelete)
        );
    }

    #[test]
    fn input_mode_captures_characters() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('q')), InputMode::Url, false),
            Some(AppAction::InputChar('q'))
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Esc), InputMode::Name, false),
            Some(AppAction::InputCancel)
        );
    }

    #[test]
    fn help_closes_on_any_key() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('q')), InputMode::Normal, true),
            Some(AppAction::HideHelp)
        );
    }
}
