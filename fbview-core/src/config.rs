use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use thiserror::Error;

use crate::state::{normalize_rotation, ColorMode, DocumentFormat, NavigationState, Zoom};

pub const DEFAULT_FRAMEBUFFER_DEVICE: &str = "/dev/fb0";
pub const DEFAULT_CACHE_SIZE: usize = 5;
/// Forward, pause and backward buttons (BCM numbering).
pub const DEFAULT_BUTTON_LINES: [u32; 3] = [16, 20, 21];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Startup options. Every field is optional so that a config file and the
/// command line can be layered with [`ViewerConfig::merge`].
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub device: Option<PathBuf>,
    /// Overrides detection from the file extension.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub format: Option<DocumentFormat>,
    /// 1-based page to open on.
    pub page: Option<usize>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub zoom: Option<Zoom>,
    pub rotation: Option<i32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub color_mode: Option<ColorMode>,
    pub interval: Option<u32>,
    pub intervals: Option<Vec<u32>>,
    pub show_progress: Option<bool>,
    pub use_button: Option<bool>,
    pub button_lines: Option<Vec<u32>>,
    pub cache_size: Option<usize>,
}

impl ViewerConfig {
    pub fn from_toml_str(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &contents)
    }

    /// Layers `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: ViewerConfig) -> ViewerConfig {
        ViewerConfig {
            device: overrides.device.or(self.device),
            format: overrides.format.or(self.format),
            page: overrides.page.or(self.page),
            zoom: overrides.zoom.or(self.zoom),
            rotation: overrides.rotation.or(self.rotation),
            color_mode: overrides.color_mode.or(self.color_mode),
            interval: overrides.interval.or(self.interval),
            intervals: overrides.intervals.or(self.intervals),
            show_progress: overrides.show_progress.or(self.show_progress),
            use_button: overrides.use_button.or(self.use_button),
            button_lines: overrides.button_lines.or(self.button_lines),
            cache_size: overrides.cache_size.or(self.cache_size),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page == Some(0) {
            return Err(ConfigError::Invalid("page numbers start at 1".into()));
        }
        if self.cache_size == Some(0) {
            return Err(ConfigError::Invalid("cache size must be at least 1".into()));
        }
        if let Some(lines) = &self.button_lines {
            if lines.len() != 3 {
                return Err(ConfigError::Invalid(format!(
                    "expected 3 button lines, got {}",
                    lines.len()
                )));
            }
        }
        Ok(())
    }

    pub fn device(&self) -> PathBuf {
        self.device
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMEBUFFER_DEVICE))
    }

    pub fn document_format(&self, path: &Path) -> DocumentFormat {
        self.format.unwrap_or_else(|| DocumentFormat::detect(path))
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size.unwrap_or(DEFAULT_CACHE_SIZE)
    }

    pub fn button_lines(&self) -> Vec<u32> {
        self.button_lines
            .clone()
            .unwrap_or_else(|| DEFAULT_BUTTON_LINES.to_vec())
    }

    fn has_slideshow(&self) -> bool {
        self.interval.unwrap_or(0) > 0 || self.intervals.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Navigation state before the first render. Slideshows open in
    /// zoom-to-fit unless a zoom was given explicitly.
    pub fn initial_state(&self) -> NavigationState {
        let zoom = match self.zoom {
            Some(zoom) => zoom,
            None if self.has_slideshow() => Zoom::Fit,
            None => Zoom::default(),
        };
        NavigationState {
            page: self.page.unwrap_or(1).saturating_sub(1),
            zoom,
            actual_zoom: match zoom {
                Zoom::Ratio(ratio) => ratio,
                Zoom::Fit | Zoom::Width => 1.0,
            },
            rotation: normalize_rotation(i64::from(self.rotation.unwrap_or(0))),
            color_mode: self.color_mode.unwrap_or_default(),
            interval: self.interval.unwrap_or(0),
            intervals: self.intervals.clone().unwrap_or_default(),
            show_progress: self.show_progress.unwrap_or(false),
            use_button: self.use_button.unwrap_or(false),
            ..NavigationState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn parses_every_recognised_key() {
        let config = ViewerConfig::from_toml_str(
            Path::new("config.toml"),
            r#"
                device = "/dev/fb1"
                format = "image"
                page = 3
                zoom = "fit"
                rotation = 90
                color_mode = "sepia"
                interval = 0
                intervals = [5, 7, 9]
                show_progress = true
                use_button = true
                button_lines = [5, 6, 13]
                cache_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.device(), PathBuf::from("/dev/fb1"));
        assert_eq!(
            config.document_format(Path::new("slides.pdf")),
            DocumentFormat::Image
        );
        assert_eq!(config.zoom, Some(Zoom::Fit));
        assert_eq!(config.color_mode, Some(ColorMode::Sepia));
        assert_eq!(config.intervals, Some(vec![5, 7, 9]));
        assert_eq!(config.button_lines(), vec![5, 6, 13]);
        assert_eq!(config.cache_size(), 8);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(ViewerConfig::from_toml_str(Path::new("c.toml"), "colour = 1").is_err());
        assert!(ViewerConfig::from_toml_str(Path::new("c.toml"), "zoom = \"huge\"").is_err());
        assert!(
            ViewerConfig::from_toml_str(Path::new("c.toml"), "color_mode = \"teal\"").is_err()
        );
    }

    #[test]
    fn overrides_win_when_merging() {
        let file = ViewerConfig {
            interval: Some(15),
            show_progress: Some(true),
            zoom: Some(Zoom::Width),
            ..ViewerConfig::default()
        };
        let cli = ViewerConfig {
            interval: Some(4),
            ..ViewerConfig::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.interval, Some(4));
        assert_eq!(merged.show_progress, Some(true));
        assert_eq!(merged.zoom, Some(Zoom::Width));
    }

    #[test]
    fn slideshow_defaults_to_zoom_to_fit() {
        let config = ViewerConfig {
            intervals: Some(vec![3, 3]),
            page: Some(2),
            rotation: Some(-90),
            ..ViewerConfig::default()
        };
        let state = config.initial_state();
        assert_eq!(state.zoom, Zoom::Fit);
        assert_eq!(state.page, 1);
        assert_eq!(state.rotation, 270);

        let explicit = ViewerConfig {
            interval: Some(3),
            zoom: Some(Zoom::Ratio(2.0)),
            ..ViewerConfig::default()
        };
        assert_eq!(explicit.initial_state().zoom, Zoom::Ratio(2.0));
        assert_eq!(ViewerConfig::default().initial_state().zoom, Zoom::Ratio(1.0));
    }

    #[test]
    fn validate_rejects_page_zero_and_wrong_line_count() {
        let zero_page = ViewerConfig {
            page: Some(0),
            ..ViewerConfig::default()
        };
        assert!(zero_page.validate().is_err());
        let lines = ViewerConfig {
            button_lines: Some(vec![16, 20]),
            ..ViewerConfig::default()
        };
        assert!(lines.validate().is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fbview.toml");
        std::fs::write(&path, "interval = 12\n").unwrap();
        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.interval, Some(12));
        assert!(ViewerConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
