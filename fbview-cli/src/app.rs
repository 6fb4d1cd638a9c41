use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::terminal;
use tracing::{debug, error, info, warn};

use fbview_core::slideshow::{self, tick_count};
use fbview_core::{
    Command, Document, DocumentSource, Effect, NavigationState, Registers, Registry,
};
use fbview_render::{ProgressRing, Surface, Viewer};
use fbview_tty::{Action, InputMux, OutlineView, SearchView};

const FALLBACK_CONSOLE_SIZE: (u16, u16) = (80, 24);

/// Why the main loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Quit,
    /// A supervisor should start the viewer again.
    Restart,
}

/// The main loop: render, wait for an action, dispatch it, repeat.
pub struct App<S: Surface> {
    registry: Registry,
    registers: Registers,
    source: DocumentSource,
    viewer: Viewer,
    surface: S,
    input: InputMux,
    console: Box<dyn Write>,
    state: NavigationState,
}

impl<S: Surface> App<S> {
    pub fn new(
        source: DocumentSource,
        document: Document,
        surface: S,
        input: InputMux,
        console: Box<dyn Write>,
        mut state: NavigationState,
    ) -> Self {
        state.num_pages = document.page_count();
        state.clamp_page();
        Self {
            registry: Registry::with_default_bindings(),
            registers: Registers::default(),
            source,
            viewer: Viewer::new(document),
            surface,
            input,
            console,
            state,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub async fn run(&mut self) -> Result<Outcome> {
        slideshow::normalize_intervals(&mut self.state);
        info!(
            pages = self.state.num_pages,
            slideshow = self.state.is_slideshow(),
            "entering main loop"
        );

        let mut needs_render = true;
        loop {
            if needs_render {
                self.render()?;
            }
            needs_render = true;

            let in_slideshow = self.state.is_slideshow();
            let action = if in_slideshow {
                self.wait_slideshow()?
            } else {
                self.input.next_manual()?
            };

            let (key, repeat) = match action {
                Action::Dispatch { key, repeat } => (key, repeat),
                Action::Redraw => {
                    debug!("redraw requested");
                    continue;
                }
                Action::Quit => return Ok(Outcome::Quit),
                Action::Reload => return Ok(Outcome::Restart),
            };
            let key = if in_slideshow {
                slideshow::wrap_key(key, &self.state)
            } else {
                key
            };

            match self
                .registry
                .dispatch(key, repeat, &mut self.state, &mut self.registers)
            {
                Effect::Render => {}
                Effect::SkipRender => needs_render = false,
                Effect::Exit => return Ok(Outcome::Quit),
                Effect::Reload => {
                    if let Err(err) = self.reload_document().await {
                        error!(?err, path = ?self.source.path(), "reload failed, exiting");
                        return Ok(Outcome::Quit);
                    }
                }
                Effect::ShowOutline => self.show_outline()?,
                Effect::ShowSearch => self.show_search()?,
            }
        }
    }

    /// Re-reads the document from disk. Registers and the view survive; the
    /// page is clamped into the new page count.
    async fn reload_document(&mut self) -> Result<()> {
        let document = self.source.open().await?;
        info!(
            path = ?self.source.path(),
            pages = document.page_count(),
            "document reloaded"
        );
        self.viewer = Viewer::new(document);
        self.state.num_pages = self.viewer.document().page_count();
        self.state.clamp_page();
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.viewer.set_state(&self.state);
        self.viewer
            .render(&mut self.surface)
            .with_context(|| format!("failed to show page {}", self.state.page + 1))?;
        self.state = self.viewer.state();
        Ok(())
    }

    fn wait_slideshow(&mut self) -> Result<Action> {
        let duration = slideshow::interval_for(&self.state);
        debug!(page = self.state.page, ?duration, "waiting on slideshow page");
        let ring = self.state.show_progress.then(|| {
            let size = self.surface.size();
            ProgressRing::new(size.width, size.height, tick_count(duration))
        });
        let surface = &mut self.surface;
        self.input.wait_slideshow(duration, |tick, _| {
            if let Some(ring) = &ring {
                ring.draw_tick(&mut *surface, tick);
            }
        })
    }

    fn console_size() -> (u16, u16) {
        terminal::size().unwrap_or(FALLBACK_CONSOLE_SIZE)
    }

    fn show_outline(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.viewer.document().backend);
        let outline = backend.outline().unwrap_or_else(|err| {
            warn!(%err, "failed to read document outline");
            Vec::new()
        });
        let mut view = OutlineView::new(&outline, self.state.page);
        let picked = view.run(self.input.keys(), &mut self.console, Self::console_size())?;
        self.jump_to(picked);
        Ok(())
    }

    fn show_search(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.viewer.document().backend);
        let mut view = SearchView::new();
        let picked = view.run(
            backend.as_ref(),
            self.input.keys(),
            &mut self.console,
            Self::console_size(),
        )?;
        self.jump_to(picked);
        Ok(())
    }

    fn jump_to(&mut self, page_index: Option<usize>) {
        let Some(page_index) = page_index else {
            return;
        };
        let page_number = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
        Command::GoToPage { default_page: 1 }.execute(
            Some(page_number),
            &mut self.state,
            &mut self.registers,
        );
        self.state.clamp_page();
    }
}
