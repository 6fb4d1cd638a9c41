//! Watches the Linux virtual console for the viewer's console becoming active
//! again, so the page can be repainted after another console drew over it.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub const DEFAULT_CONSOLE: &str = "/dev/tty";

const VT_GETSTATE: libc::c_ulong = 0x5603;
const VT_WAITACTIVE: libc::c_ulong = 0x5607;
const VT_WAITEVENT: libc::c_ulong = 0x560E;
const VT_EVENT_SWITCH: libc::c_uint = 0x0001;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct VtStat {
    v_active: libc::c_ushort,
    v_signal: libc::c_ushort,
    v_state: libc::c_ushort,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct VtEvent {
    event: libc::c_uint,
    oldev: libc::c_uint,
    newev: libc::c_uint,
    pad: [libc::c_uint; 4],
}

/// The console operations the watch loop needs.
pub trait ConsoleEvents {
    /// Number of the currently active console.
    fn active_console(&mut self) -> io::Result<u32>;
    /// Blocks until any console switch and returns the new console.
    fn wait_switch(&mut self) -> io::Result<u32>;
    /// Blocks until `console` is active.
    fn wait_active(&mut self, console: u32) -> io::Result<()>;
}

/// A console device driven through the `VT_*` ioctls.
pub struct VirtualConsole {
    path: PathBuf,
    file: File,
}

impl VirtualConsole {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open console {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
        // SAFETY: `arg` is a live value of the type the request expects.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl ConsoleEvents for VirtualConsole {
    fn active_console(&mut self) -> io::Result<u32> {
        let mut stat = VtStat::default();
        self.ioctl(VT_GETSTATE, &mut stat)?;
        Ok(u32::from(stat.v_active))
    }

    fn wait_switch(&mut self) -> io::Result<u32> {
        let mut event = VtEvent {
            event: VT_EVENT_SWITCH,
            ..VtEvent::default()
        };
        self.ioctl(VT_WAITEVENT, &mut event)?;
        Ok(event.newev)
    }

    fn wait_active(&mut self, console: u32) -> io::Result<()> {
        // SAFETY: VT_WAITACTIVE takes the console number by value.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                VT_WAITACTIVE as _,
                libc::c_ulong::from(console),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl std::fmt::Debug for VirtualConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualConsole")
            .field("path", &self.path)
            .finish()
    }
}

/// Sends `()` every time the console that was active at start becomes active
/// again. Pending notifications are coalesced. Returns when the receiver is
/// gone or the console stops answering.
pub fn watch<C: ConsoleEvents>(console: &mut C, notify: &SyncSender<()>) -> io::Result<()> {
    let ours = console.active_console()?;
    debug!(console = ours, "watching console switches");
    loop {
        let switched_to = console.wait_switch()?;
        if switched_to != ours {
            continue;
        }
        console.wait_active(ours)?;
        match notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("console watcher has no listener, stopping");
                return Ok(());
            }
        }
    }
}

/// Starts the watch loop on a background thread and returns the receiving
/// end of its notifications.
pub fn spawn_vt_watcher(path: &Path) -> Result<Receiver<()>> {
    let mut console = VirtualConsole::open(path)?;
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("vt-watcher".into())
        .spawn(move || {
            if let Err(err) = watch(&mut console, &tx) {
                warn!(%err, "console watcher stopped");
            }
        })
        .context("failed to spawn console watcher")?;
    info!(console = ?path, "console watcher started");
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedConsole {
        active: u32,
        switches: VecDeque<u32>,
        waited: Vec<u32>,
    }

    impl ScriptedConsole {
        fn new(active: u32, switches: &[u32]) -> Self {
            Self {
                active,
                switches: switches.iter().copied().collect(),
                waited: Vec::new(),
            }
        }
    }

    impl ConsoleEvents for ScriptedConsole {
        fn active_console(&mut self) -> io::Result<u32> {
            Ok(self.active)
        }

        fn wait_switch(&mut self) -> io::Result<u32> {
            self.switches
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "console closed"))
        }

        fn wait_active(&mut self, console: u32) -> io::Result<()> {
            self.waited.push(console);
            Ok(())
        }
    }

    #[test]
    fn notifies_only_when_our_console_returns() {
        let mut console = ScriptedConsole::new(2, &[3, 2]);
        let (tx, rx) = mpsc::sync_channel(1);
        let result = watch(&mut console, &tx);

        assert!(result.is_err());
        assert_eq!(console.waited, vec![2]);
        assert_eq!(rx.try_recv(), Ok(()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn notifications_coalesce_while_unread() {
        let mut console = ScriptedConsole::new(1, &[1, 4, 1, 1]);
        let (tx, rx) = mpsc::sync_channel(1);
        let _ = watch(&mut console, &tx);

        assert_eq!(console.waited.len(), 3);
        assert_eq!(rx.try_recv(), Ok(()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stops_once_the_listener_is_gone() {
        let mut console = ScriptedConsole::new(1, &[1, 1, 1]);
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);

        assert!(watch(&mut console, &tx).is_ok());
        assert_eq!(console.switches.len(), 2);
    }
}
