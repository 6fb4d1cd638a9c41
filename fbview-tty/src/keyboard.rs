use std::time::Duration;

use anyhow::Result;
use crossterm::event;

use crate::keys::{decode_event, TermEvent};

/// Anything that produces terminal events.
pub trait KeySource {
    /// Waits at most `timeout` for the next event. A zero timeout only
    /// checks for input that is already queued.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<TermEvent>>;
}

/// Reads the controlling terminal through crossterm. Expects raw mode to be
/// enabled by the caller.
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl TerminalKeys {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for TerminalKeys {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<TermEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(decode_event(event::read()?))
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::*;

    /// Replays events; `None` entries simulate an idle poll.
    pub struct ScriptedKeys(VecDeque<Option<TermEvent>>);

    impl ScriptedKeys {
        pub fn new(events: impl IntoIterator<Item = Option<TermEvent>>) -> Box<Self> {
            Box::new(Self(events.into_iter().collect()))
        }

        pub fn remaining(&self) -> usize {
            self.0.len()
        }
    }

    impl KeySource for ScriptedKeys {
        fn next_event(&mut self, _timeout: Duration) -> Result<Option<TermEvent>> {
            Ok(self.0.pop_front().flatten())
        }
    }

    pub fn key(c: char) -> Option<TermEvent> {
        Some(TermEvent::Key(fbview_core::Key::Char(c)))
    }
}
