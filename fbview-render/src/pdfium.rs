use std::convert::TryFrom;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{instrument, warn};

use fbview_core::{
    document_id_for_path, DocumentBackend, DocumentInfo, DocumentMetadata, DocumentProvider,
    OutlineItem, RenderImage, RenderRequest,
};

/// Opens PDF files through a shared pdfium binding.
pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
    password: Option<String>,
}

impl PdfiumProvider {
    pub fn new(password: Option<String>) -> Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
            password,
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let document = PdfiumDocument::new(
            Arc::clone(&self.pdfium),
            absolute.clone(),
            self.password.clone(),
        );
        let info = document.with_document(|pdf| Ok(document_info(pdf, &absolute)))?;
        Ok(Arc::new(PdfiumDocument { info, ..document }))
    }
}

struct PdfiumDocument {
    // Declared before `pdfium` so the document drops first.
    document: Mutex<Option<PdfDocument<'static>>>,
    outline_cache: Mutex<Option<Vec<OutlineItem>>>,
    info: DocumentInfo,
    path: PathBuf,
    password: Option<String>,
    pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn new(pdfium: Arc<Pdfium>, path: PathBuf, password: Option<String>) -> Self {
        Self {
            document: Mutex::new(None),
            outline_cache: Mutex::new(None),
            info: DocumentInfo {
                id: document_id_for_path(&path),
                path: path.clone(),
                page_count: 0,
                metadata: DocumentMetadata::default(),
            },
            path,
            password,
            pdfium,
        }
    }

    fn open_document(&self) -> Result<PdfDocument<'static>> {
        let document = self
            .pdfium
            .load_pdf_from_file(&self.path, self.password.as_deref())
            .with_context(|| format!("failed to open {:?}", self.path))?;
        // SAFETY: the document borrows the bindings owned by `self.pdfium`.
        // It is stored in `self.document`, which is declared before
        // `pdfium` and therefore dropped first.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        Ok(document)
    }

    fn with_document<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R>,
    {
        let mut guard = self.document.lock();
        if guard.is_none() {
            *guard = Some(self.open_document()?);
        }
        match guard.as_ref() {
            Some(document) => f(document),
            None => Err(anyhow!("document {:?} is not loaded", self.path)),
        }
    }
}

fn page_at<'a>(document: &'a PdfDocument<'_>, page_index: usize) -> Result<PdfPage<'a>> {
    let index: PdfPageIndex = page_index
        .try_into()
        .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
    document
        .pages()
        .get(index)
        .with_context(|| format!("page {} out of range", page_index))
}

/// Points to pixels at zoom 1.0.
const PIXELS_PER_POINT: f32 = 96.0 / 72.0;

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_size(&self, page_index: usize) -> Result<(f32, f32)> {
        self.with_document(|document| {
            let page = page_at(document, page_index)?;
            Ok((
                page.width().value * PIXELS_PER_POINT,
                page.height().value * PIXELS_PER_POINT,
            ))
        })
    }

    #[instrument(skip(self))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        self.with_document(|document| {
            let page = page_at(document, request.page_index)?;
            let rotation = match request.rotation {
                90 => PdfPageRenderRotation::Degrees90,
                180 => PdfPageRenderRotation::Degrees180,
                270 => PdfPageRenderRotation::Degrees270,
                _ => PdfPageRenderRotation::None,
            };
            let config = PdfRenderConfig::new()
                .scale_page_by_factor(request.scale.max(0.01) * PIXELS_PER_POINT)
                .rotate(rotation, true);
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", request.page_index))?;
            let mut pixels = bitmap.as_image().to_rgba8().into_raw();
            request.color_mode.apply(&mut pixels);

            Ok(RenderImage {
                width: u32::try_from(bitmap.width()).unwrap_or_default(),
                height: u32::try_from(bitmap.height()).unwrap_or_default(),
                pixels,
            })
        })
    }

    fn outline(&self) -> Result<Vec<OutlineItem>> {
        if let Some(cached) = self.outline_cache.lock().as_ref() {
            return Ok(cached.clone());
        }

        let outline = self.with_document(|document| {
            let mut outline = Vec::new();
            if let Some(root) = document.bookmarks().root() {
                collect_outline(root, 0, &mut outline);
            }
            Ok(outline)
        })?;

        *self.outline_cache.lock() = Some(outline.clone());
        Ok(outline)
    }

    fn page_text(&self, page_index: usize) -> Result<String> {
        self.with_document(|document| {
            let page = page_at(document, page_index)?;
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", page_index))?;
            Ok(text.all())
        })
    }
}

fn collect_outline(mut bookmark: PdfBookmark<'_>, depth: usize, out: &mut Vec<OutlineItem>) {
    loop {
        if let Some(title) = bookmark.title() {
            match bookmark.destination().map(|d| d.page_index()) {
                Some(Ok(page_index)) => out.push(OutlineItem {
                    title,
                    page_index: page_index as usize,
                    depth,
                }),
                _ => warn!(%title, "skipping outline entry without a page"),
            }
        }

        if let Some(child) = bookmark.first_child() {
            collect_outline(child, depth + 1, out);
        }

        match bookmark.next_sibling() {
            Some(next) => bookmark = next,
            None => break,
        }
    }
}

fn document_info(document: &PdfDocument<'_>, path: &Path) -> DocumentInfo {
    let metadata = document.metadata();
    let title = metadata
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().to_owned());
    let author = metadata
        .get(PdfDocumentMetadataTagType::Author)
        .map(|t| t.value().to_owned());

    DocumentInfo {
        id: document_id_for_path(path),
        path: path.to_path_buf(),
        page_count: usize::try_from(document.pages().len()).unwrap_or_default(),
        metadata: DocumentMetadata { title, author },
    }
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("FBVIEW_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(
                    "failed to load pdfium from build-provided path {}: {}",
                    path, err
                );
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
