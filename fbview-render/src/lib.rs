use std::sync::Arc;

use fbview_core::{DocumentFormat, DocumentProvider};

pub mod draw;
pub mod framebuffer;
#[cfg(feature = "pdf")]
pub mod pdfium;
pub mod pixel;
pub mod raster;
pub mod surface;
pub mod viewer;

pub use draw::{draw_line, ProgressRing};
pub use framebuffer::{Framebuffer, FramebufferError};
#[cfg(feature = "pdf")]
pub use pdfium::PdfiumProvider;
pub use pixel::{Format, PixelBuffer, Rect, Size};
pub use raster::ImageProvider;
pub use surface::{MemorySurface, Surface};
pub use viewer::Viewer;

/// The provider that decodes documents of `format`.
pub fn provider_for(
    format: DocumentFormat,
    password: Option<String>,
) -> anyhow::Result<Arc<dyn DocumentProvider>> {
    match format {
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => Ok(Arc::new(PdfiumProvider::new(password)?)),
        #[cfg(not(feature = "pdf"))]
        DocumentFormat::Pdf => {
            drop(password);
            Err(anyhow::anyhow!("built without PDF support"))
        }
        DocumentFormat::Image => Ok(Arc::new(ImageProvider)),
    }
}
