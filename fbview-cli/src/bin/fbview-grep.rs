//! Prints every line of the given documents that contains a search string,
//! prefixed with the file name and 1-based page number.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fbview_core::{DocumentBackend, DocumentFormat, DocumentProvider};
use fbview_tty::search_pages;

#[derive(Debug, Parser)]
#[command(
    name = "fbview-grep",
    version,
    about = "Search the text of paged documents"
)]
struct Args {
    /// Text to look for, case-insensitive
    pattern: String,

    /// Documents to search
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// pdf or image; detected from each file extension when omitted
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

    let mut providers: HashMap<DocumentFormat, Arc<dyn DocumentProvider>> = HashMap::new();
    let mut matched = 0;
    for path in &args.files {
        let format = args.format.unwrap_or_else(|| DocumentFormat::detect(path));
        let provider = match providers.get(&format) {
            Some(provider) => Arc::clone(provider),
            None => {
                let provider = fbview_render::provider_for(format, args.password.clone())?;
                providers.insert(format, Arc::clone(&provider));
                provider
            }
        };
        let backend = provider
            .open(path)
            .await
            .with_context(|| format!("failed to open {:?}", path))?;
        let label = path.display().to_string();
        matched += write_matches(&mut io::stdout().lock(), &label, backend.as_ref(), &args.pattern)?;
    }

    // grep convention: 1 when nothing matched.
    Ok(if matched > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn write_matches(
    out: &mut impl Write,
    label: &str,
    backend: &dyn DocumentBackend,
    pattern: &str,
) -> Result<usize> {
    let hits = search_pages(backend, pattern);
    for hit in &hits {
        writeln!(out, "{}:{}: {}", label, hit.page_index + 1, hit.snippet)?;
    }
    Ok(hits.len())
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
            let path = Path::new("notes.pdf");
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

    #[test]
    fn matches_carry_file_and_page() {
        let pages = Pages::new(vec!["intro\nthe Framebuffer", "nothing", "framebuffer   again"]);
        let mut out = Vec::new();
        let count = write_matches(&mut out, "notes.pdf", &pages, "framebuffer").unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "notes.pdf:1: the Framebuffer\nnotes.pdf:3: framebuffer again\n"
        );
    }

    #[test]
    fn no_match_writes_nothing() {
        let pages = Pages::new(vec!["alpha", "beta"]);
        let mut out = Vec::new();
        assert_eq!(write_matches(&mut out, "x", &pages, "gamma").unwrap(), 0);
        assert!(out.is_empty());
    }
}
