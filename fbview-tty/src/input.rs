//! Resolves keyboard, buttons, the slideshow timer, redraw notifications and
//! the reload flag into one action for the main loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, trace};

use fbview_core::slideshow::{tick_count, TICK};
use fbview_core::Key;

use crate::buttons::{ButtonAction, ButtonSource};
use crate::keyboard::KeySource;
use crate::keys::{RepeatAccumulator, TermEvent};

/// How long a manual-mode read blocks before rechecking the flags.
pub const KEY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run the command bound to `key`.
    Dispatch { key: Key, repeat: Option<u32> },
    /// Repaint without running a command.
    Redraw,
    Quit,
    /// Leave so a supervisor can restart the viewer.
    Reload,
}

pub struct InputMux {
    keys: Box<dyn KeySource>,
    buttons: Option<Box<dyn ButtonSource>>,
    redraw: Option<Receiver<()>>,
    reload: Arc<AtomicBool>,
    repeat: RepeatAccumulator,
    tick: Duration,
}

impl InputMux {
    pub fn new(keys: Box<dyn KeySource>, reload: Arc<AtomicBool>) -> Self {
        Self {
            keys,
            buttons: None,
            redraw: None,
            reload,
            repeat: RepeatAccumulator::new(),
            tick: TICK,
        }
    }

    pub fn with_buttons(mut self, buttons: Box<dyn ButtonSource>) -> Self {
        self.buttons = Some(buttons);
        self
    }

    pub fn with_redraw(mut self, redraw: Receiver<()>) -> Self {
        self.redraw = Some(redraw);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn keys(&mut self) -> &mut dyn KeySource {
        self.keys.as_mut()
    }

    /// Digits typed so far for the next command.
    pub fn pending_repeat(&self) -> Option<&str> {
        self.repeat.pending_input()
    }

    fn reload_requested(&self) -> bool {
        self.reload.load(Ordering::Relaxed)
    }

    fn redraw_requested(&mut self) -> bool {
        let Some(redraw) = &self.redraw else {
            return false;
        };
        match redraw.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                debug!("redraw notifier went away");
                self.redraw = None;
                false
            }
        }
    }

    /// Blocks until a key completes a command or something else needs the
    /// loop. Digits accumulate into the repeat count and survive redraws.
    pub fn next_manual(&mut self) -> Result<Action> {
        loop {
            if self.reload_requested() {
                return Ok(Action::Reload);
            }
            if self.redraw_requested() {
                return Ok(Action::Redraw);
            }
            match self.keys.next_event(KEY_POLL)? {
                None => {}
                Some(TermEvent::Resize(..)) => return Ok(Action::Redraw),
                Some(TermEvent::Key(key)) => {
                    if self.repeat.accept(key) {
                        trace!(pending = ?self.repeat.pending_input(), "repeat digit");
                        continue;
                    }
                    return Ok(Action::Dispatch {
                        key,
                        repeat: self.repeat.take(),
                    });
                }
            }
        }
    }

    /// Waits out one slideshow page. `on_tick(tick, ticks)` runs once per
    /// tick before the sleep. Expiry advances; `q` quits and `r` reloads;
    /// other keys are swallowed. A held pause button stops the clock until
    /// it is released.
    pub fn wait_slideshow(
        &mut self,
        duration: Duration,
        mut on_tick: impl FnMut(u32, u32),
    ) -> Result<Action> {
        self.repeat.reset();
        let ticks = tick_count(duration);
        for tick in 0..ticks {
            while let Some(event) = self.keys.next_event(Duration::ZERO)? {
                match event {
                    TermEvent::Key(Key::Char('q')) => return Ok(Action::Quit),
                    TermEvent::Key(Key::Char('r')) => return Ok(Action::Reload),
                    TermEvent::Resize(..) => return Ok(Action::Redraw),
                    TermEvent::Key(key) => trace!(?key, "ignored during slideshow"),
                }
            }
            if self.reload_requested() {
                return Ok(Action::Reload);
            }
            if self.redraw_requested() {
                return Ok(Action::Redraw);
            }

            on_tick(tick, ticks);
            thread::sleep(self.tick);

            if let Some(action) = self.poll_buttons() {
                return Ok(action);
            }
        }
        Ok(Action::Dispatch {
            key: Key::ADVANCE,
            repeat: None,
        })
    }

    fn poll_buttons(&mut self) -> Option<Action> {
        let buttons = self.buttons.as_mut()?;
        let mut action = buttons.poll();
        while action == ButtonAction::Pause {
            action = buttons.poll();
        }
        let key = match action {
            ButtonAction::Advance => Key::ADVANCE,
            ButtonAction::Back => Key::BACK,
            ButtonAction::Pause | ButtonAction::None => return None,
        };
        debug!(?key, "button pressed");
        Some(Action::Dispatch { key, repeat: None })
    }
}
