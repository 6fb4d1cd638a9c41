//! Everything that reads from the outside world: terminal keys, GPIO
//! buttons, console switches, plus the text overlays shown on the console.

pub mod buttons;
pub mod input;
pub mod keyboard;
pub mod keys;
pub mod overlay;
pub mod vt;

pub use buttons::{ButtonAction, ButtonReader, ButtonSource, ButtonStatus, GpioConfig};
pub use input::{Action, InputMux};
pub use keyboard::{KeySource, TerminalKeys};
pub use keys::{decode_event, decode_key, RepeatAccumulator, TermEvent};
pub use overlay::{search_pages, OutlineView, SearchHit, SearchView};
pub use vt::{spawn_vt_watcher, DEFAULT_CONSOLE};
