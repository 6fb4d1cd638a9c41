use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use fbview_core::Key;

pub const ENTER: Key = Key::Char('\n');
pub const ESCAPE: Key = Key::Char('\u{1b}');
pub const BACKSPACE: Key = Key::Char('\u{8}');
pub const TAB: Key = Key::Char('\t');

/// What the terminal delivered, after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    Key(Key),
    /// The terminal changed size (columns, rows) and must be repainted.
    Resize(u16, u16),
}

/// Translates a crossterm event. Key releases, mouse and focus events are
/// dropped.
pub fn decode_event(event: Event) -> Option<TermEvent> {
    match event {
        Event::Key(key) => decode_key(key).map(TermEvent::Key),
        Event::Resize(cols, rows) => Some(TermEvent::Resize(cols, rows)),
        _ => None,
    }
}

pub fn decode_key(event: KeyEvent) -> Option<Key> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let key = match (event.code, event.modifiers) {
        (KeyCode::Char(c), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Ctrl(c.to_ascii_lowercase())
        }
        (KeyCode::Char(c), _) => Key::Char(c),
        (KeyCode::Enter, _) => ENTER,
        (KeyCode::Esc, _) => ESCAPE,
        (KeyCode::Backspace, _) => BACKSPACE,
        (KeyCode::Tab, _) => TAB,
        (KeyCode::Left, _) => Key::Left,
        (KeyCode::Right, _) => Key::Right,
        (KeyCode::Up, _) => Key::Up,
        (KeyCode::Down, _) => Key::Down,
        (KeyCode::PageUp, _) => Key::PageUp,
        (KeyCode::PageDown, _) => Key::PageDown,
        (KeyCode::Home, _) => Key::Home,
        (KeyCode::End, _) => Key::End,
        _ => return None,
    };
    Some(key)
}

/// Collects the decimal count typed before a command key.
#[derive(Debug, Default)]
pub struct RepeatAccumulator {
    pending: Option<u32>,
    digits: String,
}

impl RepeatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `key` if it is a digit.
    pub fn accept(&mut self, key: Key) -> bool {
        let Key::Char(c) = key else {
            return false;
        };
        let Some(digit) = c.to_digit(10) else {
            return false;
        };
        let current = self.pending.unwrap_or(0);
        self.pending = Some(current.saturating_mul(10).saturating_add(digit));
        self.digits.push(c);
        true
    }

    /// The accumulated count, or `None` when no digit was typed.
    pub fn take(&mut self) -> Option<u32> {
        self.digits.clear();
        self.pending.take()
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.digits.clear();
    }

    pub fn pending_input(&self) -> Option<&str> {
        if self.digits.is_empty() {
            None
        } else {
            Some(&self.digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key_event(code: KeyCode) -> KeyEvent {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn digits_accumulate_into_decimal_repeat() {
        let mut repeat = RepeatAccumulator::new();
        assert!(repeat.accept(Key::Char('1')));
        assert!(repeat.accept(Key::Char('2')));
        assert_eq!(repeat.pending_input(), Some("12"));
        assert!(!repeat.accept(Key::Char('j')));
        assert_eq!(repeat.take(), Some(12));
        assert!(repeat.pending_input().is_none());
    }

    #[test]
    fn repeat_is_none_without_digits_and_resets_after_use() {
        let mut repeat = RepeatAccumulator::new();
        assert_eq!(repeat.take(), None);
        repeat.accept(Key::Char('3'));
        assert_eq!(repeat.take(), Some(3));
        assert_eq!(repeat.take(), None);
    }

    #[test]
    fn zero_is_a_valid_repeat() {
        let mut repeat = RepeatAccumulator::new();
        repeat.accept(Key::Char('0'));
        assert_eq!(repeat.take(), Some(0));
    }

    #[test]
    fn huge_repeat_saturates() {
        let mut repeat = RepeatAccumulator::new();
        for _ in 0..20 {
            repeat.accept(Key::Char('9'));
        }
        assert_eq!(repeat.take(), Some(u32::MAX));
    }

    #[test]
    fn control_letters_decode_to_ctrl_keys() {
        let event = key_event_with_modifiers(KeyCode::Char('F'), KeyModifiers::CONTROL);
        assert_eq!(decode_key(event), Some(Key::Ctrl('f')));
        assert_eq!(
            decode_key(key_event_with_modifiers(
                KeyCode::Char('G'),
                KeyModifiers::SHIFT
            )),
            Some(Key::Char('G'))
        );
    }

    #[test]
    fn navigation_keys_decode() {
        assert_eq!(decode_key(key_event(KeyCode::PageDown)), Some(Key::PageDown));
        assert_eq!(decode_key(key_event(KeyCode::Tab)), Some(TAB));
        assert_eq!(decode_key(key_event(KeyCode::Enter)), Some(ENTER));
        assert_eq!(decode_key(key_event(KeyCode::F(5))), None);
    }

    #[test]
    fn releases_are_ignored_and_resize_is_reported() {
        let mut release = key_event(KeyCode::Char('j'));
        release.kind = KeyEventKind::Release;
        assert_eq!(decode_key(release), None);
        assert_eq!(
            decode_event(Event::Resize(80, 24)),
            Some(TermEvent::Resize(80, 24))
        );
        assert_eq!(
            decode_event(Event::Key(key_event(KeyCode::Char('j')))),
            Some(TermEvent::Key(Key::Char('j')))
        );
    }
}
