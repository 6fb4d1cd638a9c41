use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest zoom ratio a page can be shown at.
pub const MIN_ZOOM: f32 = 0.1;
/// Largest zoom ratio a page can be shown at.
pub const MAX_ZOOM: f32 = 10.0;
/// Offset sentinel: the viewer resolves it to the largest valid offset.
pub const OFFSET_MAX: i32 = i32::MAX;

/// Requested zoom. The auto-fit variants are resolved against the screen on
/// every relayout; `NavigationState::actual_zoom` holds the resolved ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zoom {
    Ratio(f32),
    Fit,
    Width,
}

impl Default for Zoom {
    fn default() -> Self {
        Zoom::Ratio(1.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSettingError {
    #[error("invalid zoom \"{0}\" (expected a percentage, \"fit\" or \"width\")")]
    Zoom(String),
    #[error("invalid color mode \"{0}\" (expected normal, inverted or sepia)")]
    ColorMode(String),
    #[error("invalid file format \"{0}\" (expected pdf or image)")]
    Format(String),
}

impl FromStr for Zoom {
    type Err = ParseSettingError;

    /// Parses `"fit"`, `"width"` or a percentage such as `"150"` / `"150%"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "fit" | "zoom_to_fit" => Ok(Zoom::Fit),
            "width" | "zoom_to_width" => Ok(Zoom::Width),
            other => {
                let percent: f32 = other
                    .trim_end_matches('%')
                    .parse()
                    .map_err(|_| ParseSettingError::Zoom(trimmed.to_owned()))?;
                if !percent.is_finite() || percent <= 0.0 {
                    return Err(ParseSettingError::Zoom(trimmed.to_owned()));
                }
                Ok(Zoom::Ratio(percent / 100.0))
            }
        }
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zoom::Ratio(ratio) => write!(f, "{}", ratio * 100.0),
            Zoom::Fit => f.write_str("fit"),
            Zoom::Width => f.write_str("width"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Normal,
    Inverted,
    Sepia,
}

impl ColorMode {
    /// Applies the tone transform in place to tightly packed RGBA bytes.
    pub fn apply(self, pixels: &mut [u8]) {
        match self {
            ColorMode::Normal => {}
            ColorMode::Inverted => {
                for chunk in pixels.chunks_exact_mut(4) {
                    chunk[0] = 255 - chunk[0];
                    chunk[1] = 255 - chunk[1];
                    chunk[2] = 255 - chunk[2];
                }
            }
            ColorMode::Sepia => {
                for chunk in pixels.chunks_exact_mut(4) {
                    let (r, g, b) = (chunk[0] as f32, chunk[1] as f32, chunk[2] as f32);
                    chunk[0] = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0) as u8;
                    chunk[1] = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0) as u8;
                    chunk[2] = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0) as u8;
                }
            }
        }
    }

    /// Flips between `mode` and normal.
    pub fn toggled(self, mode: ColorMode) -> ColorMode {
        if self == mode {
            ColorMode::Normal
        } else {
            mode
        }
    }
}

impl FromStr for ColorMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "normal" => Ok(ColorMode::Normal),
            "invert" | "inverted" => Ok(ColorMode::Inverted),
            "sepia" => Ok(ColorMode::Sepia),
            _ => Err(ParseSettingError::ColorMode(s.to_owned())),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorMode::Normal => "normal",
            ColorMode::Inverted => "inverted",
            ColorMode::Sepia => "sepia",
        })
    }
}

/// How a file is decoded into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    /// A still image (PNG, JPEG) shown as a single page.
    Image,
}

impl DocumentFormat {
    /// `.pdf` files are PDF documents, anything else is tried as an image.
    pub fn detect(path: &Path) -> DocumentFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => DocumentFormat::Pdf,
            _ => DocumentFormat::Image,
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "image" => Ok(DocumentFormat::Image),
            _ => Err(ParseSettingError::Format(s.to_owned())),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Image => "image",
        })
    }
}

/// Everything the navigation commands read and write. The viewer normalises
/// it on every render (page clamp, resolved zoom, page extents, offsets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub page: usize,
    pub num_pages: usize,
    pub x_offset: i32,
    pub y_offset: i32,
    pub zoom: Zoom,
    pub actual_zoom: f32,
    pub rotation: i32,
    pub color_mode: ColorMode,
    pub screen_width: i32,
    pub screen_height: i32,
    pub page_width: i32,
    pub page_height: i32,
    /// Fixed slideshow interval in seconds, 0 when unset.
    pub interval: u32,
    /// Per-page slideshow intervals in seconds.
    pub intervals: Vec<u32>,
    pub show_progress: bool,
    pub use_button: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            page: 0,
            num_pages: 0,
            x_offset: 0,
            y_offset: 0,
            zoom: Zoom::default(),
            actual_zoom: 1.0,
            rotation: 0,
            color_mode: ColorMode::Normal,
            screen_width: 0,
            screen_height: 0,
            page_width: 0,
            page_height: 0,
            interval: 0,
            intervals: Vec::new(),
            show_progress: false,
            use_button: false,
        }
    }
}

impl NavigationState {
    pub fn clamp_page(&mut self) {
        self.page = self.page.min(self.num_pages.saturating_sub(1));
    }

    pub fn is_last_page(&self) -> bool {
        self.page + 1 >= self.num_pages
    }

    pub fn is_first_page(&self) -> bool {
        self.page == 0
    }

    /// True when pages advance on a timer instead of key presses.
    pub fn is_slideshow(&self) -> bool {
        self.interval > 0 || !self.intervals.is_empty()
    }
}

/// Snaps a rotation in degrees to a multiple of 90 within `[0, 360)`.
pub fn normalize_rotation(degrees: i64) -> i32 {
    let snapped = ((degrees as f64 / 90.0).round() as i64) * 90;
    snapped.rem_euclid(360) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_parses_percentages_and_sentinels() {
        assert_eq!("150".parse::<Zoom>().unwrap(), Zoom::Ratio(1.5));
        assert_eq!("50%".parse::<Zoom>().unwrap(), Zoom::Ratio(0.5));
        assert_eq!("FIT".parse::<Zoom>().unwrap(), Zoom::Fit);
        assert_eq!("width".parse::<Zoom>().unwrap(), Zoom::Width);
        assert!("abc".parse::<Zoom>().is_err());
        assert!("-10".parse::<Zoom>().is_err());
    }

    #[test]
    fn color_mode_accepts_legacy_spellings() {
        assert_eq!("invert".parse::<ColorMode>().unwrap(), ColorMode::Inverted);
        assert_eq!("".parse::<ColorMode>().unwrap(), ColorMode::Normal);
        assert_eq!("Sepia".parse::<ColorMode>().unwrap(), ColorMode::Sepia);
        assert!("purple".parse::<ColorMode>().is_err());
    }

    #[test]
    fn inverted_mode_flips_channels_but_not_alpha() {
        let mut pixels = vec![10, 20, 30, 200];
        ColorMode::Inverted.apply(&mut pixels);
        assert_eq!(pixels, vec![245, 235, 225, 200]);
    }

    #[test]
    fn sepia_mode_saturates_white() {
        let mut pixels = vec![255, 255, 255, 255];
        ColorMode::Sepia.apply(&mut pixels);
        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[1], 255);
        assert!(pixels[2] < 255);
        assert_eq!(pixels[3], 255);
    }

    #[test]
    fn toggling_returns_to_normal() {
        let mode = ColorMode::Normal.toggled(ColorMode::Sepia);
        assert_eq!(mode, ColorMode::Sepia);
        assert_eq!(mode.toggled(ColorMode::Sepia), ColorMode::Normal);
        assert_eq!(mode.toggled(ColorMode::Inverted), ColorMode::Inverted);
    }

    #[test]
    fn rotation_is_snapped_and_wrapped() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(100), 90);
        assert_eq!(normalize_rotation(720), 0);
    }

    #[test]
    fn format_follows_extension_unless_named() {
        assert_eq!(DocumentFormat::detect(Path::new("talk.PDF")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect(Path::new("photo.png")), DocumentFormat::Image);
        assert_eq!(DocumentFormat::detect(Path::new("README")), DocumentFormat::Image);
        assert_eq!("Image".parse::<DocumentFormat>().unwrap(), DocumentFormat::Image);
        assert!("djvu".parse::<DocumentFormat>().is_err());
    }
}
