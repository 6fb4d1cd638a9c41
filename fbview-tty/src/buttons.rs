//! Three push buttons on sysfs GPIO lines: advance, pause and back.
//!
//! Lines are wired active low with the pull-up enabled, so a value of `0`
//! means the button is held down.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_PULL_UP_TOOL: &str = "raspi-gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStatus {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Advance,
    Pause,
    Back,
    None,
}

impl ButtonAction {
    /// Only a single pressed button counts; chords and idle read as `None`.
    pub fn decode(advance: ButtonStatus, pause: ButtonStatus, back: ButtonStatus) -> Self {
        use ButtonStatus::{Off, On};

        match (advance, pause, back) {
            (On, Off, Off) => ButtonAction::Advance,
            (Off, On, Off) => ButtonAction::Pause,
            (Off, Off, On) => ButtonAction::Back,
            _ => ButtonAction::None,
        }
    }
}

/// A source of button presses polled by the slideshow wait.
pub trait ButtonSource {
    fn poll(&mut self) -> ButtonAction;
}

#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
    /// Advance, pause and back lines, in that order.
    pub lines: [u32; 3],
    /// Tool run as `<tool> set <line> pu` to enable the pull-up.
    pub pull_up_tool: Option<String>,
    /// Wait after exporting a line for udev to fix permissions.
    pub settle: Duration,
    /// Sleep after an advance or back press.
    pub step_debounce: Duration,
    /// Sleep after each read of a held pause button.
    pub pause_debounce: Duration,
}

impl GpioConfig {
    pub fn new(lines: [u32; 3]) -> Self {
        Self {
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            lines,
            pull_up_tool: Some(DEFAULT_PULL_UP_TOOL.to_owned()),
            settle: Duration::from_millis(100),
            step_debounce: Duration::from_millis(500),
            pause_debounce: Duration::from_millis(100),
        }
    }
}

pub struct ButtonReader {
    config: GpioConfig,
    exported: Vec<u32>,
}

impl ButtonReader {
    /// Exports and configures every line. Failures are logged and leave the
    /// line reading as released.
    pub fn new(config: GpioConfig) -> Self {
        let mut exported = Vec::new();
        for &line in &config.lines {
            match setup_line(&config, line) {
                Ok(()) => exported.push(line),
                Err(err) => warn!(line, %err, "failed to set up button line"),
            }
        }
        info!(lines = ?exported, "button reader ready");
        Self { config, exported }
    }

    fn value_path(&self, line: u32) -> PathBuf {
        self.config
            .sysfs_root
            .join(format!("gpio{line}"))
            .join("value")
    }

    pub fn status(&self, line: u32) -> ButtonStatus {
        match fs::read_to_string(self.value_path(line)) {
            Ok(value) if value.trim_start().starts_with('0') => ButtonStatus::On,
            Ok(_) => ButtonStatus::Off,
            Err(err) => {
                debug!(line, %err, "unreadable button line");
                ButtonStatus::Off
            }
        }
    }

    pub fn statuses(&self) -> Vec<(u32, ButtonStatus)> {
        self.config
            .lines
            .iter()
            .map(|&line| (line, self.status(line)))
            .collect()
    }

    /// Reads all three buttons once and sleeps the debounce delay if one of
    /// them is pressed on its own.
    pub fn read(&self) -> ButtonAction {
        let [advance, pause, back] = self.config.lines;
        let action = ButtonAction::decode(self.status(advance), self.status(pause), self.status(back));
        match action {
            ButtonAction::Advance | ButtonAction::Back => thread::sleep(self.config.step_debounce),
            ButtonAction::Pause => thread::sleep(self.config.pause_debounce),
            ButtonAction::None => {}
        }
        action
    }
}

impl ButtonSource for ButtonReader {
    fn poll(&mut self) -> ButtonAction {
        self.read()
    }
}

impl Drop for ButtonReader {
    fn drop(&mut self) {
        let unexport = self.config.sysfs_root.join("unexport");
        for line in &self.exported {
            if let Err(err) = fs::write(&unexport, line.to_string()) {
                debug!(line, %err, "failed to unexport button line");
            }
        }
    }
}

fn setup_line(config: &GpioConfig, line: u32) -> std::io::Result<()> {
    if !is_exported(&config.sysfs_root, line) {
        fs::write(config.sysfs_root.join("export"), line.to_string())?;
        thread::sleep(config.settle);
    }
    let direction = config.sysfs_root.join(format!("gpio{line}")).join("direction");
    fs::write(direction, "in")?;
    if let Some(tool) = &config.pull_up_tool {
        enable_pull_up(tool, line);
    }
    Ok(())
}

fn enable_pull_up(tool: &str, line: u32) {
    match Command::new(tool)
        .args(["set", &line.to_string(), "pu"])
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(line, %status, tool, "pull-up command failed"),
        Err(err) => warn!(line, %err, tool, "could not run pull-up command"),
    }
}

fn is_exported(root: &Path, line: u32) -> bool {
    root.join(format!("gpio{line}")).exists()
}
