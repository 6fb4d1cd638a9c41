mod app;
mod args;
mod logging;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::terminal;
use directories::ProjectDirs;
use signal_hook::consts::SIGINT;
use tracing::{info, warn};

use fbview_core::{DocumentSource, FileResumeStore, ResumeState, ViewerConfig};
use fbview_render::Framebuffer;
use fbview_tty::{
    spawn_vt_watcher, ButtonReader, GpioConfig, InputMux, TerminalKeys, DEFAULT_CONSOLE,
};

use crate::app::{App, Outcome};
use crate::args::Args;

/// Exit status asking the supervising script to start the viewer again.
const RELOAD_EXIT_CODE: u8 = 75;
const TEARDOWN_DELAY: Duration = Duration::from_millis(100);

const FRAMEBUFFER_HELP: &str = r#"
Troubleshooting tips:

1. Try adding yourself to the "video" group, e.g.:

       sudo usermod -a -G video $USER

   You will typically need to log out and back in for this to take effect.

2. Alternatively, try running this command as root, e.g.:

       sudo fbview <file>

3. Verify that the framebuffer device exists. If not, please supply the correct
   device with "--fb <path to device>".
"#;

/// Raw console while the viewer runs; warnings go to the log file only.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, cursor::Hide)?;
        logging::set_console_logging(false);
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        logging::set_console_logging(true);
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("org", "fbview", "fbview")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = logging::init_logging(&project_dirs)?;

    let mut config = load_config(&args, &project_dirs)?;

    let framebuffer = match Framebuffer::open(&config.device()) {
        Ok(framebuffer) => framebuffer,
        Err(err) => {
            eprintln!("Failed to initialize framebuffer device: {err}");
            eprintln!("{FRAMEBUFFER_HELP}");
            return Ok(ExitCode::FAILURE);
        }
    };
    if args.fb_debug_info {
        print!("{}", framebuffer.debug_info());
        return Ok(ExitCode::SUCCESS);
    }

    let format = config.document_format(&args.file);
    let provider = fbview_render::provider_for(format, args.password.clone())?;
    let source = DocumentSource::new(provider, args.file.clone(), config.cache_size());
    let document = source
        .open()
        .await
        .with_context(|| format!("failed to open {:?} as {}", args.file, format))?;

    let resume_store = FileResumeStore::new(project_dirs.data_local_dir().join("resume"))?;
    if let Some(resume) = resume_store.take(&document.info)? {
        info!(?resume, "resuming after reload");
        resume.apply_to(&mut config);
    }
    let document_info = document.info.clone();
    let state = config.initial_state();

    let reload = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&reload))
        .context("failed to install SIGINT handler")?;

    let mut input = InputMux::new(Box::new(TerminalKeys::new()), reload);
    match spawn_vt_watcher(Path::new(DEFAULT_CONSOLE)) {
        Ok(redraw) => input = input.with_redraw(redraw),
        Err(err) => warn!(?err, "console switches will not trigger a redraw"),
    }
    if state.use_button {
        input = input.with_buttons(Box::new(ButtonReader::new(gpio_config(&config)?)));
    }

    let raw_mode = RawModeGuard::new()?;
    let mut app = App::new(
        source,
        document,
        framebuffer,
        input,
        Box::new(io::stdout()),
        state,
    );
    let outcome = app.run().await;
    let final_state = app.state().clone();

    drop(app);
    thread::sleep(TEARDOWN_DELAY);
    drop(raw_mode);

    match outcome? {
        Outcome::Quit => Ok(ExitCode::SUCCESS),
        Outcome::Restart => {
            resume_store.save(&document_info, &ResumeState::capture(&final_state))?;
            info!("exiting for reload");
            Ok(ExitCode::from(RELOAD_EXIT_CODE))
        }
    }
}

/// The config file (explicit or default) with the command line on top.
fn load_config(args: &Args, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    let default_path = project_dirs.config_dir().join("config.toml");
    let path: Option<PathBuf> = match &args.config {
        Some(path) => Some(path.clone()),
        None if default_path.exists() => Some(default_path),
        None => None,
    };
    let file_config = match path {
        Some(path) => {
            info!(config = ?path, "loading config file");
            ViewerConfig::load(&path)?
        }
        None => ViewerConfig::default(),
    };
    let config = file_config.merge(args.overrides());
    config.validate()?;
    Ok(config)
}

fn gpio_config(config: &ViewerConfig) -> Result<GpioConfig> {
    let lines: [u32; 3] = config
        .button_lines()
        .try_into()
        .map_err(|lines: Vec<u32>| anyhow!("expected 3 button lines, got {}", lines.len()))?;
    Ok(GpioConfig::new(lines))
}
