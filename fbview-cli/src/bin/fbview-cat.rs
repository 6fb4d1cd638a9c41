//! Prints the text of a document. Pages are separated by form feeds.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fbview_core::{DocumentBackend, DocumentFormat};

#[derive(Debug, Parser)]
#[command(name = "fbview-cat", version, about = "Print the text of a paged document")]
struct Args {
    /// Document to print
    file: PathBuf,

    /// Only print this page (1-based)
    #[arg(short = 'p', long = "page", value_parser = clap::value_parser!(u32).range(1..))]
    page: Option<u32>,

    /// pdf or image; detected from the file extension when omitted
    #[arg(short = 'f', long = "format")]
    format: Option<DocumentFormat>,

    /// Password for encrypted documents
    #[arg(short = 'P', long = "password")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .try_init()
        .map_err(|err| anyhow!(err))?;

    let format = args
        .format
        .unwrap_or_else(|| DocumentFormat::detect(&args.file));
    let provider = fbview_render::provider_for(format, args.password.clone())?;
    let backend = provider
        .open(&args.file)
        .await
        .with_context(|| format!("failed to open {:?}", args.file))?;

    let page_index = args.page.map(|page| page as usize - 1);
    write_text(&mut io::stdout().lock(), backend.as_ref(), page_index)?;
    Ok(ExitCode::SUCCESS)
}

fn write_text(
    out: &mut impl Write,
    backend: &dyn DocumentBackend,
    page_index: Option<usize>,
) -> Result<()> {
    let page_count = backend.info().page_count;
    let pages = match page_index {
        Some(index) if index < page_count => index..index + 1,
        Some(index) => bail!(
            "page {} out of range (the document has {} pages)",
            index + 1,
            page_count
        ),
        None => 0..page_count,
    };

    for (n, index) in pages.enumerate() {
        if n > 0 {
            out.write_all(b"\x0c")?;
        }
        let text = backend
            .page_text(index)
            .with_context(|| format!("failed to extract text for page {}", index + 1))?;
        out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use fbview_core::{
        document_id_for_path, DocumentInfo, DocumentMetadata, RenderImage, RenderRequest,
    };

    struct Pages(DocumentInfo, Vec<&'static str>);

    impl Pages {
        fn new(text: Vec<&'static str>) -> Self {
            let path = Path::new("book.pdf");
            Self(
                DocumentInfo {
                    id: document_id_for_path(path),
                    path: path.to_path_buf(),
                    page_count: text.len(),
                    metadata: DocumentMetadata::default(),
                },
                text,
            )
        }
    }

    impl DocumentBackend for Pages {
        fn info(&self) -> &DocumentInfo {
            &self.0
        }

        fn page_size(&self, _page_index: usize) -> Result<(f32, f32)> {
            Ok((10.0, 10.0))
        }

        fn render_page(&self, _request: RenderRequest) -> Result<RenderImage> {
            Err(anyhow!("text only"))
        }

        fn page_text(&self, page_index: usize) -> Result<String> {
            Ok(self.1[page_index].to_owned())
        }
    }

    fn printed(pages: &Pages, page_index: Option<usize>) -> Result<String> {
        let mut out = Vec::new();
        write_text(&mut out, pages, page_index)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn whole_document_uses_form_feeds() {
        let pages = Pages::new(vec!["one", "two\n"]);
        assert_eq!(printed(&pages, None).unwrap(), "one\n\x0ctwo\n");
    }

    #[test]
    fn single_page_and_range_check() {
        let pages = Pages::new(vec!["one", "two"]);
        assert_eq!(printed(&pages, Some(1)).unwrap(), "two\n");
        assert!(printed(&pages, Some(2)).is_err());
    }
}
