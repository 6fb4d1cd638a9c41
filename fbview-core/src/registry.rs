use std::collections::HashMap;

use tracing::debug;

use crate::command::{Command, Effect};
use crate::state::NavigationState;

/// A key as seen by the registry, after terminal decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
}

impl Key {
    /// Synthesised by the slideshow timer and the "forward" button.
    pub const ADVANCE: Key = Key::Char('J');
    /// Synthesised by the "backward" button.
    pub const BACK: Key = Key::Char('K');
    pub const FIRST_PAGE: Key = Key::Char('g');
    pub const LAST_PAGE: Key = Key::Char('G');
}

/// Saved navigation snapshots, addressed by the numeric repeat.
#[derive(Debug, Default, Clone)]
pub struct Registers {
    saved: HashMap<u32, NavigationState>,
}

impl Registers {
    pub fn save(&mut self, register: u32, state: NavigationState) {
        self.saved.insert(register, state);
    }

    pub fn get(&self, register: u32) -> Option<&NavigationState> {
        self.saved.get(&register)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

/// Key to command table. Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Registry {
    bindings: HashMap<Key, Command>,
}

impl Registry {
    pub fn new(bindings: impl IntoIterator<Item = (Key, Command)>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }

    pub fn with_default_bindings() -> Self {
        use Command::*;

        Self::new([
            (Key::Char('q'), Exit),
            (Key::Char('h'), MoveLeft),
            (Key::Left, MoveLeft),
            (Key::Char('j'), MoveDown),
            (Key::Down, MoveDown),
            (Key::Char('k'), MoveUp),
            (Key::Up, MoveUp),
            (Key::Char('l'), MoveRight),
            (Key::Right, MoveRight),
            (Key::Char(' '), ScreenDown),
            (Key::Ctrl('f'), ScreenDown),
            (Key::Ctrl('b'), ScreenUp),
            (Key::Char('J'), PageDown),
            (Key::PageDown, PageDown),
            (Key::Char('K'), PageUp),
            (Key::PageUp, PageUp),
            (Key::Char('='), ZoomIn),
            (Key::Char('+'), ZoomIn),
            (Key::Char('-'), ZoomOut),
            (Key::Char('z'), SetZoom),
            (Key::Char('s'), ZoomToWidth),
            (Key::Char('a'), ZoomToFit),
            (Key::Char('r'), SetRotation),
            (Key::Char('>'), Rotate { increment: 90 }),
            (Key::Char('.'), Rotate { increment: 90 }),
            (Key::Char('<'), Rotate { increment: -90 }),
            (Key::Char(','), Rotate { increment: -90 }),
            (Key::Char('g'), GoToPage { default_page: 1 }),
            (Key::Home, GoToPage { default_page: 1 }),
            (Key::Char('G'), GoToPage { default_page: u32::MAX }),
            (Key::End, GoToPage { default_page: u32::MAX }),
            (Key::Char('\t'), ShowOutline),
            (Key::Char('/'), ShowSearch),
            (Key::Char('m'), SaveState),
            (Key::Char('`'), RestoreState),
            (Key::Char('e'), Reload),
            (Key::Char('I'), ToggleInverted),
            (Key::Char('S'), ToggleSepia),
        ])
    }

    pub fn lookup(&self, key: Key) -> Option<Command> {
        self.bindings.get(&key).copied()
    }

    /// Runs the command bound to `key`. Unbound keys are ignored.
    pub fn dispatch(
        &self,
        key: Key,
        repeat: Option<u32>,
        state: &mut NavigationState,
        registers: &mut Registers,
    ) -> Effect {
        let Some(command) = self.lookup(key) else {
            debug!(?key, "no command bound");
            return Effect::Render;
        };
        debug!(?key, ?command, ?repeat, "dispatching command");
        let effect = command.execute(repeat, state, registers);
        state.clamp_page();
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Zoom;

    fn state() -> NavigationState {
        NavigationState {
            page: 3,
            num_pages: 10,
            screen_width: 640,
            screen_height: 480,
            page_width: 640,
            page_height: 900,
            ..NavigationState::default()
        }
    }

    #[test]
    fn unbound_key_is_a_silent_no_op() {
        let registry = Registry::with_default_bindings();
        let mut registers = Registers::default();
        let mut nav = state();
        let before = nav.clone();
        let effect = registry.dispatch(Key::Char('~'), Some(4), &mut nav, &mut registers);
        assert_eq!(effect, Effect::Render);
        assert_eq!(nav, before);
    }

    #[test]
    fn arrow_keys_share_commands_with_letters() {
        let registry = Registry::with_default_bindings();
        assert_eq!(registry.lookup(Key::Down), registry.lookup(Key::Char('j')));
        assert_eq!(registry.lookup(Key::End), registry.lookup(Key::Char('G')));
        assert_eq!(registry.lookup(Key::Ctrl('f')), Some(Command::ScreenDown));
    }

    #[test]
    fn save_then_restore_reproduces_snapshot() {
        let registry = Registry::with_default_bindings();
        let mut registers = Registers::default();
        let mut nav = state();
        nav.x_offset = 17;
        nav.y_offset = 230;
        nav.zoom = Zoom::Ratio(1.5);
        nav.actual_zoom = 1.5;

        let effect = registry.dispatch(Key::Char('m'), None, &mut nav, &mut registers);
        assert_eq!(effect, Effect::SkipRender);
        let saved = nav.clone();

        registry.dispatch(Key::Char('G'), None, &mut nav, &mut registers);
        registry.dispatch(Key::Char('+'), Some(2), &mut nav, &mut registers);
        registry.dispatch(Key::Char('I'), None, &mut nav, &mut registers);
        assert_ne!(nav, saved);

        registry.dispatch(Key::Char('`'), None, &mut nav, &mut registers);
        assert_eq!(nav, saved);
    }

    #[test]
    fn registers_are_addressed_by_repeat() {
        let registry = Registry::with_default_bindings();
        let mut registers = Registers::default();
        let mut nav = state();

        registry.dispatch(Key::Char('m'), Some(7), &mut nav, &mut registers);
        let at_seven = nav.clone();
        registry.dispatch(Key::Char('J'), None, &mut nav, &mut registers);
        registry.dispatch(Key::Char('m'), None, &mut nav, &mut registers);
        assert_eq!(registers.len(), 2);

        registry.dispatch(Key::Char('`'), Some(7), &mut nav, &mut registers);
        assert_eq!(nav, at_seven);

        let before_missing = nav.clone();
        registry.dispatch(Key::Char('`'), Some(99), &mut nav, &mut registers);
        assert_eq!(nav, before_missing);
    }

    #[test]
    fn page_stays_in_bounds_for_any_command_sequence() {
        let registry = Registry::with_default_bindings();
        let mut registers = Registers::default();
        let mut nav = state();
        let keys = [
            Key::Char('J'),
            Key::Char('K'),
            Key::Char('j'),
            Key::Char('k'),
            Key::Char(' '),
            Key::Ctrl('b'),
            Key::Char('G'),
            Key::Char('g'),
            Key::Char('+'),
            Key::Char('-'),
        ];
        let repeats = [None, Some(0), Some(1), Some(3), Some(25), Some(u32::MAX)];

        let mut seed = 0x2545_f491_u32;
        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let key = keys[seed as usize % keys.len()];
            let repeat = repeats[(seed >> 8) as usize % repeats.len()];
            registry.dispatch(key, repeat, &mut nav, &mut registers);
            assert!(nav.page < nav.num_pages, "page {} escaped after {:?}", nav.page, key);
        }
    }
}
