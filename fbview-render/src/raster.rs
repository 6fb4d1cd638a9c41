use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::instrument;

use fbview_core::{
    document_id_for_path, DocumentBackend, DocumentInfo, DocumentMetadata, DocumentProvider,
    RenderImage, RenderRequest,
};

/// Opens still images as single-page documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageProvider;

#[async_trait]
impl DocumentProvider for ImageProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
        let decoded =
            image::open(path).with_context(|| format!("failed to decode image {:?}", path))?;
        Ok(Arc::new(ImageDocument::new(path, decoded.to_rgba8())))
    }
}

struct ImageDocument {
    info: DocumentInfo,
    image: RgbaImage,
}

impl ImageDocument {
    fn new(path: &Path, image: RgbaImage) -> Self {
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            info: DocumentInfo {
                id: document_id_for_path(path),
                path: path.to_path_buf(),
                page_count: 1,
                metadata: DocumentMetadata {
                    title,
                    author: None,
                },
            },
            image,
        }
    }
}

fn only_page(page_index: usize) -> Result<()> {
    if page_index == 0 {
        Ok(())
    } else {
        Err(anyhow!("page {} out of range", page_index))
    }
}

fn scaled(extent: u32, scale: f32) -> u32 {
    ((extent as f32 * scale.max(0.01)).round() as u32).max(1)
}

impl DocumentBackend for ImageDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_size(&self, page_index: usize) -> Result<(f32, f32)> {
        only_page(page_index)?;
        Ok((self.image.width() as f32, self.image.height() as f32))
    }

    #[instrument(skip(self))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        only_page(request.page_index)?;
        let (width, height) = (
            scaled(self.image.width(), request.scale),
            scaled(self.image.height(), request.scale),
        );
        let resized = if (width, height) == self.image.dimensions() {
            self.image.clone()
        } else {
            imageops::resize(&self.image, width, height, FilterType::Triangle)
        };
        let rotated = match request.rotation {
            90 => imageops::rotate90(&resized),
            180 => imageops::rotate180(&resized),
            270 => imageops::rotate270(&resized),
            _ => resized,
        };

        let (width, height) = rotated.dimensions();
        let mut pixels = rotated.into_raw();
        request.color_mode.apply(&mut pixels);
        Ok(RenderImage {
            width,
            height,
            pixels,
        })
    }
}
