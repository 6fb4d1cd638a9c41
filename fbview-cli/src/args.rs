use std::path::PathBuf;

use clap::Parser;

use fbview_core::{ColorMode, DocumentFormat, ViewerConfig, Zoom};

#[derive(Debug, Parser)]
#[command(
    name = "fbview",
    version,
    about = "Paged document viewer for the Linux framebuffer"
)]
pub struct Args {
    /// Document to open
    pub file: PathBuf,

    /// Framebuffer device
    #[arg(long = "fb", value_name = "DEVICE")]
    pub device: Option<PathBuf>,

    /// pdf or image; detected from the file extension when omitted
    #[arg(short = 'f', long = "format")]
    pub format: Option<DocumentFormat>,

    /// Page to open on (1-based)
    #[arg(short = 'p', long = "page", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: Option<u32>,

    /// Zoom in percent, or "fit" / "width". Wins over the zoom-to-fit that
    /// --interval and --intervals otherwise select, wherever it appears
    #[arg(short = 'z', long = "zoom", conflicts_with_all = ["zoom_to_fit", "zoom_to_width"])]
    pub zoom: Option<Zoom>,

    #[arg(long = "zoom-to-fit", conflicts_with = "zoom_to_width")]
    pub zoom_to_fit: bool,

    #[arg(long = "zoom-to-width")]
    pub zoom_to_width: bool,

    /// Rotation in degrees, rounded to a multiple of 90
    #[arg(short = 'r', long = "rotation", allow_negative_numbers = true)]
    pub rotation: Option<i32>,

    /// normal, inverted or sepia
    #[arg(short = 'c', long = "color-mode")]
    pub color_mode: Option<ColorMode>,

    /// Seconds per page; enables the slideshow
    #[arg(short = 'i', long = "interval")]
    pub interval: Option<u32>,

    /// Seconds for each page, comma separated; enables the slideshow
    #[arg(short = 'j', long = "intervals", value_delimiter = ',')]
    pub intervals: Option<Vec<u32>>,

    /// Draw the slideshow progress ring
    #[arg(short = 's', long = "show-progress")]
    pub show_progress: bool,

    /// Read the GPIO forward / pause / back buttons during slideshows
    #[arg(short = 'b', long = "use-button")]
    pub use_button: bool,

    /// GPIO lines of the forward, pause and back buttons
    #[arg(long = "button-lines", value_delimiter = ',')]
    pub button_lines: Option<Vec<u32>>,

    /// Rendered pages kept in memory
    #[arg(long = "cache-size", value_parser = clap::value_parser!(u32).range(1..))]
    pub cache_size: Option<u32>,

    /// Password for encrypted documents
    #[arg(short = 'P', long = "password")]
    pub password: Option<String>,

    /// Config file (defaults to config.toml in the user config directory)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the framebuffer device information and exit
    #[arg(long = "fb-debug-info")]
    pub fb_debug_info: bool,
}

impl Args {
    /// The options given on the command line, to be layered over the config
    /// file. Unset switches stay `None` so the file can turn them on.
    pub fn overrides(&self) -> ViewerConfig {
        let zoom = if self.zoom_to_fit {
            Some(Zoom::Fit)
        } else if self.zoom_to_width {
            Some(Zoom::Width)
        } else {
            self.zoom
        };
        ViewerConfig {
            device: self.device.clone(),
            format: self.format,
            page: self.page.map(|page| page as usize),
            zoom,
            rotation: self.rotation,
            color_mode: self.color_mode,
            interval: self.interval,
            intervals: self.intervals.clone(),
            show_progress: self.show_progress.then_some(true),
            use_button: self.use_button.then_some(true),
            button_lines: self.button_lines.clone(),
            cache_size: self.cache_size.map(|size| size as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("fbview").chain(args.iter().copied()))
    }

    #[test]
    fn bare_invocation_overrides_nothing() {
        let args = parse(&["slides.pdf"]).unwrap();
        assert_eq!(args.file, PathBuf::from("slides.pdf"));
        assert_eq!(args.overrides(), ViewerConfig::default());
    }

    #[test]
    fn slideshow_flags_are_collected() {
        let args = parse(&[
            "-j", "5,7,9", "-s", "-b", "--button-lines", "5,6,13", "-c", "sepia", "-r", "-90",
            "deck.pdf",
        ])
        .unwrap();
        let config = args.overrides();
        assert_eq!(config.intervals, Some(vec![5, 7, 9]));
        assert_eq!(config.show_progress, Some(true));
        assert_eq!(config.use_button, Some(true));
        assert_eq!(config.button_lines, Some(vec![5, 6, 13]));
        assert_eq!(config.color_mode, Some(ColorMode::Sepia));
        assert_eq!(config.rotation, Some(-90));
    }

    #[test]
    fn zoom_forms() {
        let config = parse(&["-z", "150", "a.pdf"]).unwrap().overrides();
        assert_eq!(config.zoom, Some(Zoom::Ratio(1.5)));
        let config = parse(&["--zoom-to-width", "a.pdf"]).unwrap().overrides();
        assert_eq!(config.zoom, Some(Zoom::Width));
        assert!(parse(&["--zoom-to-fit", "-z", "120", "a.pdf"]).is_err());
    }

    #[test]
    fn format_flag_overrides_detection() {
        let config = parse(&["--format", "image", "scan.pdf"]).unwrap().overrides();
        assert_eq!(config.format, Some(DocumentFormat::Image));
        assert_eq!(
            config.document_format(&PathBuf::from("scan.pdf")),
            DocumentFormat::Image
        );
        let config = parse(&["scan.pdf"]).unwrap().overrides();
        assert_eq!(
            config.document_format(&PathBuf::from("scan.pdf")),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn zoom_beats_slideshow_fit_in_either_order() {
        for argv in [
            ["-i", "5", "-z", "150", "a.pdf"],
            ["-z", "150", "-i", "5", "a.pdf"],
        ] {
            let state = parse(&argv).unwrap().overrides().initial_state();
            assert_eq!(state.zoom, Zoom::Ratio(1.5));
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--button-lines", "1,2", "a.pdf"])
            .unwrap()
            .overrides()
            .validate()
            .is_err());
        assert!(parse(&["-p", "0", "a.pdf"]).is_err());
        assert!(parse(&["-c", "purple", "a.pdf"]).is_err());
        assert!(parse(&["-f", "djvu", "a.pdf"]).is_err());
        assert!(parse(&["-i", "soon", "a.pdf"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
