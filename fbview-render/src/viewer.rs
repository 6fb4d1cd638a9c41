use anyhow::{Context, Result};
use tracing::{debug, instrument};

use fbview_core::state::normalize_rotation;
use fbview_core::{Document, NavigationState, RenderRequest, Zoom, MAX_ZOOM, MIN_ZOOM};

use crate::pixel::{PixelBuffer, Rect};
use crate::surface::Surface;

/// Pages rendered ahead and behind the current one after each render.
pub const PREFETCH_RANGE: usize = 1;

/// Lays out and draws the current page of a document according to a
/// [`NavigationState`].
pub struct Viewer {
    document: Document,
    state: NavigationState,
}

impl Viewer {
    pub fn new(document: Document) -> Self {
        let state = NavigationState {
            num_pages: document.page_count(),
            ..NavigationState::default()
        };
        Self { document, state }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn set_state(&mut self, state: &NavigationState) {
        self.state = state.clone();
        self.state.num_pages = self.document.page_count();
    }

    /// State as normalised by the last render.
    pub fn state(&self) -> NavigationState {
        self.state.clone()
    }

    /// Resolves zoom, page extents and offsets against the surface, then
    /// draws the visible part of the page.
    #[instrument(skip(self, surface))]
    pub fn render<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<()> {
        let state = &mut self.state;
        state.num_pages = self.document.page_count();
        state.clamp_page();

        let screen = surface.size();
        state.screen_width = clamp_dimension(screen.width);
        state.screen_height = clamp_dimension(screen.height);
        state.rotation = normalize_rotation(i64::from(state.rotation));

        let (mut natural_width, mut natural_height) = self
            .document
            .page_size(state.page)
            .with_context(|| format!("failed to measure page {}", state.page + 1))?;
        if state.rotation % 180 != 0 {
            std::mem::swap(&mut natural_width, &mut natural_height);
        }
        state.actual_zoom = resolve_zoom(
            state.zoom,
            (natural_width, natural_height),
            (state.screen_width as f32, state.screen_height as f32),
        );

        let request = RenderRequest {
            page_index: state.page,
            scale: state.actual_zoom,
            rotation: state.rotation,
            color_mode: state.color_mode,
        };
        let image = self
            .document
            .render(request)
            .with_context(|| format!("failed to render page {}", state.page + 1))?;
        state.page_width = clamp_dimension(image.width);
        state.page_height = clamp_dimension(image.height);

        let max_x = (state.page_width - state.screen_width).max(0);
        let max_y = (state.page_height - state.screen_height).max(0);
        state.x_offset = state.x_offset.clamp(0, max_x);
        state.y_offset = state.y_offset.clamp(0, max_y);

        debug!(
            page = state.page,
            zoom = state.actual_zoom,
            width = state.page_width,
            height = state.page_height,
            x = state.x_offset,
            y = state.y_offset,
            "laid out page"
        );

        if state.page_width < state.screen_width || state.page_height < state.screen_height {
            let blank = surface.new_pixel_buffer(screen);
            surface.render(&blank, Rect::new(0, 0, screen.width, screen.height))?;
        }

        let visible = Rect::new(
            state.x_offset as u32,
            state.y_offset as u32,
            state.page_width.min(state.screen_width) as u32,
            state.page_height.min(state.screen_height) as u32,
        );
        surface.render(&PixelBuffer::from_rgba(image), visible)?;

        if let Err(err) = self.document.prefetch_neighbors(request, PREFETCH_RANGE) {
            debug!(?err, "prefetch failed");
        }
        Ok(())
    }
}

fn resolve_zoom(zoom: Zoom, page: (f32, f32), screen: (f32, f32)) -> f32 {
    let (page_width, page_height) = page;
    let (screen_width, screen_height) = screen;
    let ratio = match zoom {
        Zoom::Ratio(ratio) => ratio,
        _ if page_width <= 0.0 || page_height <= 0.0 => 1.0,
        Zoom::Fit => (screen_width / page_width).min(screen_height / page_height),
        Zoom::Width => screen_width / page_width,
    };
    if ratio.is_finite() {
        ratio.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

fn clamp_dimension(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
