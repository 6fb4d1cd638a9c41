use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use ureq::{AgentBuilder, Error as UreqError};
use walkdir::WalkDir;

const DEFAULT_PDFIUM_VERSION: &str = "7350";
const DEFAULT_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";
const LIBRARY_NAME: &str = "libpdfium.so";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for var in [
        "FBVIEW_PDFIUM_SKIP_DOWNLOAD",
        "FBVIEW_PDFIUM_ARCHIVE_PATH",
        "FBVIEW_PDFIUM_VERSION",
        "FBVIEW_PDFIUM_PLATFORM",
        "FBVIEW_PDFIUM_BASE_URL",
        "PDFIUM_DYNAMIC_LIB_PATH",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    if env::var_os("CARGO_FEATURE_PDF").is_none()
        || env::var_os("FBVIEW_PDFIUM_SKIP_DOWNLOAD").is_some()
        || env::var_os("PDFIUM_DYNAMIC_LIB_PATH").is_some()
    {
        return;
    }

    // Without a bundled library the binary falls back to ./ and the system
    // search path at run time, so a failed fetch is not a build error.
    if let Err(err) = stage_pdfium() {
        println!("cargo:warning=pdfium was not staged: {err:#}");
    }
}

fn stage_pdfium() -> Result<()> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR env var not set")?);
    let staging_dir = out_dir.join("pdfium");
    fs::create_dir_all(&staging_dir).context("failed to create staging directory")?;

    if let Some(path) = locate_library(&staging_dir) {
        return export_library_path(&path);
    }

    let target_arch =
        env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH env var missing")?;
    let platform = env::var("FBVIEW_PDFIUM_PLATFORM")
        .unwrap_or_else(|_| default_platform(&target_arch).to_string());

    let archive_path = match env::var_os("FBVIEW_PDFIUM_ARCHIVE_PATH") {
        Some(path) => PathBuf::from(path),
        None => download_pdfium(&staging_dir, &platform)?,
    };
    extract_archive(&archive_path, &staging_dir)?;

    let library_path = locate_library(&staging_dir)
        .with_context(|| format!("{LIBRARY_NAME} not found in {staging_dir:?} after extraction"))?;
    export_library_path(&library_path)
}

fn export_library_path(path: &Path) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("library path {:?} is not UTF-8", path))?;
    println!("cargo:rustc-env=FBVIEW_PDFIUM_LIBRARY_PATH={path_str}");
    Ok(())
}

fn default_platform(target_arch: &str) -> &'static str {
    match target_arch {
        "aarch64" => "linux-arm64",
        "arm" => "linux-arm",
        "x86" => "linux-x86",
        _ => "linux-x64",
    }
}

fn locate_library(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == LIBRARY_NAME)
        .map(|entry| entry.into_path())
}

fn download_pdfium(staging_dir: &Path, platform: &str) -> Result<PathBuf> {
    let version =
        env::var("FBVIEW_PDFIUM_VERSION").unwrap_or_else(|_| DEFAULT_PDFIUM_VERSION.to_string());
    let base_url =
        env::var("FBVIEW_PDFIUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let archive_path = staging_dir.join(format!("pdfium-{platform}.tgz"));
    if archive_path.exists() {
        return Ok(archive_path);
    }

    let url = format!(
        "{}/chromium/{}/pdfium-{}.tgz",
        base_url.trim_end_matches('/'),
        version,
        platform
    );
    let agent = AgentBuilder::new()
        .timeout_read(Duration::from_secs(120))
        .build();
    let response = match agent.get(&url).call() {
        Ok(response) => response,
        Err(UreqError::Status(code, _)) => {
            return Err(anyhow!("GET {} failed with HTTP status {}", url, code));
        }
        Err(err) => return Err(anyhow!("GET {} failed: {}", url, err)),
    };

    let partial = archive_path.with_extension("part");
    let mut file =
        File::create(&partial).with_context(|| format!("failed to create {:?}", partial))?;
    io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to write downloaded data to {:?}", partial))?;
    fs::rename(&partial, &archive_path)?;
    Ok(archive_path)
}

fn extract_archive(archive: &Path, destination: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("failed to open archive {:?}", archive))?;
    Archive::new(GzDecoder::new(file))
        .unpack(destination.join("lib"))
        .with_context(|| format!("failed to unpack {:?}", archive))
}
