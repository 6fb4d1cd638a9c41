use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Error, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

pub mod command;
pub mod config;
pub mod registry;
pub mod resume;
pub mod slideshow;
pub mod state;

pub use command::{Command, Effect};
pub use config::{ConfigError, ViewerConfig};
pub use registry::{Key, Registers, Registry};
pub use resume::{FileResumeStore, ResumeState};
pub use state::{
    ColorMode, DocumentFormat, NavigationState, Zoom, MAX_ZOOM, MIN_ZOOM, OFFSET_MAX,
};

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::from_u128(0x3f0c1d9e_52a4_5b77_9a1e_0c6b8f2e41d7));

/// Stable id for a document path, used to key files that outlive a run.
pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
    /// Clockwise degrees, a multiple of 90.
    pub rotation: i32,
    pub color_mode: ColorMode,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
            rotation: 0,
            color_mode: ColorMode::Normal,
        }
    }
}

/// A rasterised page: tightly packed RGBA, row-major.
#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    pub title: String,
    pub page_index: usize,
    pub depth: usize,
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    /// Unrotated page extents at zoom 1.0, in pixels.
    fn page_size(&self, page_index: usize) -> Result<(f32, f32)>;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
    fn outline(&self) -> Result<Vec<OutlineItem>> {
        Ok(Vec::new())
    }
    fn page_text(&self, _page_index: usize) -> Result<String> {
        Ok(String::new())
    }
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>>;
}

/// A path together with the provider that decodes it, so the same document
/// can be opened again after it changed on disk.
#[derive(Clone)]
pub struct DocumentSource {
    provider: Arc<dyn DocumentProvider>,
    path: PathBuf,
    cache_capacity: usize,
}

impl DocumentSource {
    pub fn new(provider: Arc<dyn DocumentProvider>, path: PathBuf, cache_capacity: usize) -> Self {
        Self {
            provider,
            path,
            cache_capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh copy with an empty render cache.
    pub async fn open(&self) -> Result<Document> {
        Document::open_with(self.provider.as_ref(), &self.path, self.cache_capacity).await
    }
}

/// An opened document plus a small cache of rendered pages.
pub struct Document {
    pub info: DocumentInfo,
    pub backend: Arc<dyn DocumentBackend>,
    cache_capacity: usize,
    render_cache: Mutex<HashMap<CacheKey, RenderImage>>,
}

impl Document {
    pub fn new(backend: Arc<dyn DocumentBackend>, cache_capacity: usize) -> Self {
        Self {
            info: backend.info().clone(),
            backend,
            cache_capacity: cache_capacity.max(1),
            render_cache: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(provider))]
    pub async fn open_with<P: DocumentProvider + ?Sized>(
        provider: &P,
        path: &Path,
        cache_capacity: usize,
    ) -> Result<Self> {
        let backend = provider.open(path).await?;
        Ok(Self::new(backend, cache_capacity))
    }

    pub fn page_count(&self) -> usize {
        self.info.page_count
    }

    pub fn page_size(&self, page_index: usize) -> Result<(f32, f32)> {
        if page_index >= self.info.page_count {
            return Err(anyhow!("page {} out of range", page_index));
        }
        self.backend.page_size(page_index)
    }

    pub fn render(&self, request: RenderRequest) -> Result<RenderImage> {
        self.render_page_internal(request, request.page_index)
    }

    /// Renders the pages around `request.page_index` into the cache.
    pub fn prefetch_neighbors(&self, request: RenderRequest, range: usize) -> Result<()> {
        if range == 0 {
            return Ok(());
        }

        let current_page = request.page_index;
        let mut last_error: Option<Error> = None;

        for offset in 1..=range {
            let next = current_page + offset;
            if next < self.info.page_count {
                let neighbor = RenderRequest {
                    page_index: next,
                    ..request
                };
                if let Err(err) = self.render_page_internal(neighbor, current_page) {
                    last_error = Some(err);
                }
            }

            if let Some(prev) = current_page.checked_sub(offset) {
                let neighbor = RenderRequest {
                    page_index: prev,
                    ..request
                };
                if let Err(err) = self.render_page_internal(neighbor, current_page) {
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn render_page_internal(
        &self,
        request: RenderRequest,
        reference_page: usize,
    ) -> Result<RenderImage> {
        if request.page_index >= self.info.page_count {
            return Err(anyhow!("page {} out of range", request.page_index));
        }

        let key = CacheKey::new(&request);
        if let Some(image) = self.try_get_cached(&key) {
            return Ok(image);
        }

        let image = self.backend.render_page(request)?;
        self.store_cached_render(key, &image, reference_page);
        Ok(image)
    }

    fn try_get_cached(&self, key: &CacheKey) -> Option<RenderImage> {
        self.render_cache.lock().get(key).cloned()
    }

    fn store_cached_render(&self, key: CacheKey, image: &RenderImage, reference_page: usize) {
        let mut cache = self.render_cache.lock();
        cache.insert(key, image.clone());

        if cache.len() > self.cache_capacity {
            let mut keys: Vec<_> = cache.keys().cloned().collect();
            keys.sort_by_key(|k| k.distance(reference_page));
            for stale in keys.into_iter().skip(self.cache_capacity) {
                cache.remove(&stale);
            }
        }
    }

    pub fn cached_pages(&self) -> usize {
        self.render_cache.lock().len()
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    page_index: usize,
    scale_milli: u32,
    rotation: i32,
    color_mode: ColorMode,
}

impl CacheKey {
    fn new(request: &RenderRequest) -> Self {
        Self {
            page_index: request.page_index,
            scale_milli: quantize_scale(request.scale),
            rotation: request.rotation,
            color_mode: request.color_mode,
        }
    }

    fn distance(&self, reference_page: usize) -> usize {
        self.page_index.abs_diff(reference_page)
    }
}

fn quantize_scale(scale: f32) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}
