use crate::registry::Registers;
use crate::state::{
    normalize_rotation, ColorMode, NavigationState, Zoom, MAX_ZOOM, MIN_ZOOM, OFFSET_MAX,
};

/// Multiplier applied by a single zoom in / zoom out step.
pub const ZOOM_COEFFICIENT: f32 = 1.2;

/// A navigation operation. Each variant carries the per-binding data it
/// needs; the numeric repeat typed before the key is supplied at execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Exit,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    ScreenUp,
    ScreenDown,
    PageUp,
    PageDown,
    ZoomIn,
    ZoomOut,
    SetZoom,
    ZoomToWidth,
    ZoomToFit,
    SetRotation,
    Rotate { increment: i32 },
    /// Jumps to the 1-based page given by the repeat, or `default_page`.
    GoToPage { default_page: u32 },
    SaveState,
    RestoreState,
    Reload,
    ToggleInverted,
    ToggleSepia,
    ShowOutline,
    ShowSearch,
}

/// What the main loop has to do once a command has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Render,
    /// The command had no visual effect.
    SkipRender,
    Exit,
    Reload,
    ShowOutline,
    ShowSearch,
}

impl Command {
    pub fn execute(
        self,
        repeat: Option<u32>,
        state: &mut NavigationState,
        registers: &mut Registers,
    ) -> Effect {
        let times = |default: u32| i64::from(repeat.unwrap_or(default));
        match self {
            Command::Exit => return Effect::Exit,
            Command::MoveLeft => {
                let step = i64::from(state.screen_width / 10);
                state.x_offset = shift(state.x_offset, -times(1) * step);
            }
            Command::MoveRight => {
                let step = i64::from(state.screen_width / 10);
                state.x_offset = shift(state.x_offset, times(1) * step);
            }
            Command::MoveDown => scroll_down(state, times(1), state.screen_height / 10),
            Command::MoveUp => scroll_up(state, times(1), state.screen_height / 10),
            Command::ScreenDown => scroll_down(state, times(1), state.screen_height),
            Command::ScreenUp => scroll_up(state, times(1), state.screen_height),
            Command::PageDown => {
                let target = state.page.saturating_add(times(1) as usize);
                state.page = target.min(state.num_pages.saturating_sub(1));
            }
            Command::PageUp => {
                state.page = state.page.saturating_sub(times(1) as usize);
            }
            Command::ZoomIn => {
                let zoom = state.actual_zoom * times(1) as f32 * ZOOM_COEFFICIENT;
                set_zoom(zoom, state);
            }
            Command::ZoomOut => {
                let zoom = state.actual_zoom * times(1) as f32 / ZOOM_COEFFICIENT;
                set_zoom(zoom, state);
            }
            Command::SetZoom => set_zoom(times(100) as f32 / 100.0, state),
            Command::ZoomToWidth => zoom_to_width(state),
            Command::ZoomToFit => state.zoom = Zoom::Fit,
            Command::SetRotation => state.rotation = normalize_rotation(times(0)),
            Command::Rotate { increment } => {
                let degrees = i64::from(state.rotation) + times(1) * i64::from(increment);
                state.rotation = normalize_rotation(degrees);
            }
            Command::GoToPage { default_page } => go_to_page(times(default_page), state),
            Command::SaveState => {
                registers.save(repeat.unwrap_or(0), state.clone());
                return Effect::SkipRender;
            }
            Command::RestoreState => {
                if let Some(saved) = registers.get(repeat.unwrap_or(0)) {
                    *state = saved.clone();
                }
            }
            Command::Reload => return Effect::Reload,
            Command::ToggleInverted => {
                state.color_mode = state.color_mode.toggled(ColorMode::Inverted);
            }
            Command::ToggleSepia => state.color_mode = state.color_mode.toggled(ColorMode::Sepia),
            Command::ShowOutline => return Effect::ShowOutline,
            Command::ShowSearch => return Effect::ShowSearch,
        }
        Effect::Render
    }
}

fn shift(offset: i32, delta: i64) -> i32 {
    (i64::from(offset) + delta).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn scroll_down(state: &mut NavigationState, times: i64, step: i32) {
    state.y_offset = shift(state.y_offset, times * i64::from(step));
    let bottom = i64::from(state.y_offset) + i64::from(state.screen_height);
    let limit = i64::from(state.page_height) - 1 + i64::from(step);
    if bottom >= limit && state.page + 1 < state.num_pages {
        state.page += 1;
        state.y_offset = 0;
    }
}

fn scroll_up(state: &mut NavigationState, times: i64, step: i32) {
    state.y_offset = shift(state.y_offset, -times * i64::from(step));
    if state.y_offset <= -step && state.page > 0 {
        state.page -= 1;
        state.y_offset = OFFSET_MAX;
    }
}

/// Moves to a 1-based page number, clamped into the document.
pub fn go_to_page(page_number: i64, state: &mut NavigationState) {
    let last = state.num_pages.max(1) as i64;
    let page = (page_number.clamp(1, last) - 1) as usize;
    if page != state.page {
        state.page = page;
        state.x_offset = 0;
        state.y_offset = 0;
    }
}

/// Changes the zoom ratio while keeping the point under the screen centre
/// fixed. Page extents and `actual_zoom` are updated to estimates that the
/// viewer replaces on the next render.
pub fn set_zoom(zoom: f32, state: &mut NavigationState) {
    let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    if state.page_width > 0 && state.page_height > 0 && state.actual_zoom > 0.0 {
        let half_width = state.screen_width / 2;
        let half_height = state.screen_height / 2;
        let q = zoom / state.actual_zoom;

        // The centre keeps its fraction of the page, so it scales with `q`.
        let center_x = (i64::from(state.x_offset) + i64::from(half_width)) as f32 * q;
        let center_y = (i64::from(state.y_offset) + i64::from(half_height)) as f32 * q;
        state.x_offset = (center_x as i32).saturating_sub(half_width);
        state.y_offset = (center_y as i32).saturating_sub(half_height);
        state.page_width = (state.page_width as f32 * q).round() as i32;
        state.page_height = (state.page_height as f32 * q).round() as i32;
    }
    state.actual_zoom = zoom;
    state.zoom = Zoom::Ratio(zoom);
}

fn zoom_to_width(state: &mut NavigationState) {
    if state.page_width > 0 && state.actual_zoom > 0.0 {
        let natural_width = state.page_width as f32 / state.actual_zoom;
        set_zoom(state.screen_width as f32 / natural_width, state);
    }
    state.zoom = Zoom::Width;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laid_out_state() -> NavigationState {
        NavigationState {
            page: 0,
            num_pages: 5,
            screen_width: 800,
            screen_height: 600,
            page_width: 1200,
            page_height: 1600,
            actual_zoom: 1.0,
            x_offset: 100,
            y_offset: 300,
            ..NavigationState::default()
        }
    }

    fn center_ratios(state: &NavigationState) -> (f32, f32) {
        (
            (state.x_offset + state.screen_width / 2) as f32 / state.page_width as f32,
            (state.y_offset + state.screen_height / 2) as f32 / state.page_height as f32,
        )
    }

    fn run(command: Command, repeat: Option<u32>, state: &mut NavigationState) -> Effect {
        let mut registers = Registers::default();
        command.execute(repeat, state, &mut registers)
    }

    #[test]
    fn set_zoom_clamps_requested_ratio() {
        for requested in [0.0001_f32, 0.05, 0.1, 1.0, 9.99, 10.0, 50.0, 1e9] {
            let mut state = laid_out_state();
            set_zoom(requested, &mut state);
            assert!(state.actual_zoom >= MIN_ZOOM && state.actual_zoom <= MAX_ZOOM);
            match state.zoom {
                Zoom::Ratio(ratio) => assert!((MIN_ZOOM..=MAX_ZOOM).contains(&ratio)),
                other => panic!("unexpected zoom {:?}", other),
            }
        }
    }

    #[test]
    fn set_zoom_keeps_screen_center_fixed() {
        for target in [0.5_f32, 1.2, 2.0, 3.7] {
            let mut state = laid_out_state();
            let (before_x, before_y) = center_ratios(&state);
            set_zoom(target, &mut state);
            let (after_x, after_y) = center_ratios(&state);
            assert!((before_x - after_x).abs() * state.page_width as f32 <= 1.0);
            assert!((before_y - after_y).abs() * state.page_height as f32 <= 1.0);
        }
    }

    #[test]
    fn set_zoom_truncates_the_new_centre() {
        let mut state = NavigationState {
            page_width: 1000,
            page_height: 1000,
            x_offset: 2,
            y_offset: 0,
            ..laid_out_state()
        };
        // 402 * 1.3 = 522.6: the centre lands on column 522, not 523.
        run(Command::SetZoom, Some(130), &mut state);
        assert_eq!(state.x_offset, 122);
        assert_eq!(state.page_width, 1300);
    }

    #[test]
    fn set_zoom_twice_is_idempotent() {
        let mut state = laid_out_state();
        set_zoom(1.7, &mut state);
        let once = state.clone();
        set_zoom(1.7, &mut state);
        assert_eq!(state.x_offset, once.x_offset);
        assert_eq!(state.y_offset, once.y_offset);
    }

    #[test]
    fn zoom_in_then_out_returns_close_to_start() {
        let mut state = laid_out_state();
        run(Command::ZoomIn, None, &mut state);
        assert!((state.actual_zoom - 1.2).abs() < 1e-5);
        run(Command::ZoomOut, None, &mut state);
        assert!((state.actual_zoom - 1.0).abs() < 1e-5);
        assert!((state.x_offset - 100).abs() <= 1);
        assert!((state.y_offset - 300).abs() <= 1);
    }

    #[test]
    fn set_zoom_command_reads_percentage_from_repeat() {
        let mut state = laid_out_state();
        run(Command::SetZoom, Some(250), &mut state);
        assert_eq!(state.zoom, Zoom::Ratio(2.5));
        run(Command::SetZoom, None, &mut state);
        assert_eq!(state.zoom, Zoom::Ratio(1.0));
    }

    #[test]
    fn zoom_to_width_estimates_ratio_then_tags_state() {
        let mut state = laid_out_state();
        run(Command::ZoomToWidth, None, &mut state);
        assert_eq!(state.zoom, Zoom::Width);
        let expected = 800.0 / 1200.0;
        assert!((state.actual_zoom - expected).abs() < 1e-5);
        assert_eq!(state.page_width, 800);
    }

    #[test]
    fn move_down_advances_page_at_bottom() {
        let mut state = laid_out_state();
        state.y_offset = 1000;
        run(Command::MoveDown, None, &mut state);
        assert_eq!(state.page, 1);
        assert_eq!(state.y_offset, 0);
    }

    #[test]
    fn move_down_stays_on_last_page() {
        let mut state = laid_out_state();
        state.page = 4;
        state.y_offset = 1000;
        run(Command::MoveDown, Some(3), &mut state);
        assert_eq!(state.page, 4);
        assert_eq!(state.y_offset, 1180);
    }

    #[test]
    fn move_up_goes_to_previous_page_bottom() {
        let mut state = laid_out_state();
        state.page = 2;
        state.y_offset = 0;
        run(Command::MoveUp, None, &mut state);
        assert_eq!(state.page, 1);
        assert_eq!(state.y_offset, OFFSET_MAX);
    }

    #[test]
    fn screen_down_scrolls_by_screen_height() {
        let mut state = laid_out_state();
        state.y_offset = 0;
        run(Command::ScreenDown, None, &mut state);
        assert_eq!(state.page, 0);
        assert_eq!(state.y_offset, 600);
        run(Command::ScreenDown, None, &mut state);
        assert_eq!((state.page, state.y_offset), (0, 1200));
        run(Command::ScreenDown, None, &mut state);
        assert_eq!(state.page, 1);
        assert_eq!(state.y_offset, 0);
    }

    #[test]
    fn horizontal_pan_never_changes_page() {
        let mut state = laid_out_state();
        run(Command::MoveRight, Some(100), &mut state);
        assert_eq!(state.page, 0);
        assert_eq!(state.x_offset, 100 + 100 * 80);
        run(Command::MoveLeft, Some(500), &mut state);
        assert_eq!(state.page, 0);
        assert!(state.x_offset < 0);
    }

    #[test]
    fn go_to_page_clamps_and_resets_offsets() {
        let mut state = laid_out_state();
        run(Command::GoToPage { default_page: u32::MAX }, None, &mut state);
        assert_eq!(state.page, 4);
        assert_eq!((state.x_offset, state.y_offset), (0, 0));

        state.x_offset = 50;
        run(Command::GoToPage { default_page: 1 }, Some(5), &mut state);
        assert_eq!(state.page, 4);
        assert_eq!(state.x_offset, 50, "same page keeps offsets");

        run(Command::GoToPage { default_page: 1 }, Some(0), &mut state);
        assert_eq!(state.page, 0);
    }

    #[test]
    fn rotate_accumulates_increments() {
        let mut state = laid_out_state();
        run(Command::Rotate { increment: 90 }, None, &mut state);
        assert_eq!(state.rotation, 90);
        run(Command::Rotate { increment: -90 }, Some(3), &mut state);
        assert_eq!(state.rotation, 180);
        run(Command::SetRotation, Some(270), &mut state);
        assert_eq!(state.rotation, 270);
        run(Command::SetRotation, None, &mut state);
        assert_eq!(state.rotation, 0);
    }

    #[test]
    fn collaborator_commands_report_effects() {
        let mut state = laid_out_state();
        assert_eq!(run(Command::Exit, None, &mut state), Effect::Exit);
        assert_eq!(run(Command::Reload, None, &mut state), Effect::Reload);
        assert_eq!(run(Command::ShowOutline, None, &mut state), Effect::ShowOutline);
        assert_eq!(run(Command::ShowSearch, None, &mut state), Effect::ShowSearch);
        assert_eq!(run(Command::ZoomToFit, None, &mut state), Effect::Render);
        assert_eq!(state.zoom, Zoom::Fit);
    }

    #[test]
    fn toggles_flip_color_mode() {
        let mut state = laid_out_state();
        run(Command::ToggleInverted, None, &mut state);
        assert_eq!(state.color_mode, ColorMode::Inverted);
        run(Command::ToggleSepia, None, &mut state);
        assert_eq!(state.color_mode, ColorMode::Sepia);
        run(Command::ToggleSepia, None, &mut state);
        assert_eq!(state.color_mode, ColorMode::Normal);
    }
}
