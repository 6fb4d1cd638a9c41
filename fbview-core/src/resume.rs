//! Settings handed across a supervisor restart triggered by a reload request.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ViewerConfig;
use crate::state::{NavigationState, Zoom};
use crate::DocumentInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub interval: u32,
    pub intervals: Vec<u32>,
    pub zoom: Zoom,
    pub show_progress: bool,
}

impl ResumeState {
    pub fn capture(state: &NavigationState) -> Self {
        Self {
            interval: state.interval,
            intervals: state.intervals.clone(),
            zoom: state.zoom,
            show_progress: state.show_progress,
        }
    }

    pub fn apply_to(&self, config: &mut ViewerConfig) {
        config.interval = Some(self.interval);
        config.intervals = Some(self.intervals.clone());
        config.zoom = Some(self.zoom);
        config.show_progress = Some(self.show_progress);
    }
}

/// One JSON file per document under `root`, consumed on the next start.
pub struct FileResumeStore {
    root: PathBuf,
}

impl FileResumeStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create resume directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn resume_path(&self, doc: &DocumentInfo) -> PathBuf {
        self.root.join(format!("{}.json", doc.id))
    }

    pub fn save(&self, doc: &DocumentInfo, resume: &ResumeState) -> Result<()> {
        let path = self.resume_path(doc);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(resume)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp resume file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Loads and removes the resume file for `doc`, if any.
    pub fn take(&self, doc: &DocumentInfo) -> Result<Option<ResumeState>> {
        let path = self.resume_path(doc);
        if !path.exists() {
            return Ok(None);
        }
        let payload = fs::read_to_string(&path)
            .with_context(|| format!("failed to read resume file {:?}", path))?;
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove resume file {:?}", path))?;
        let resume = serde_json::from_str(&payload)
            .with_context(|| format!("failed to decode resume file {:?}", path))?;
        Ok(Some(resume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document_id_for_path, DocumentMetadata};

    use tempfile::tempdir;

    fn info(path: PathBuf) -> DocumentInfo {
        DocumentInfo {
            id: document_id_for_path(&path),
            path,
            page_count: 4,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn resume_file_is_consumed_once() {
        let dir = tempdir().unwrap();
        let store = FileResumeStore::new(dir.path().join("resume")).unwrap();
        let doc = info(dir.path().join("slides.pdf"));

        let nav = NavigationState {
            interval: 0,
            intervals: vec![3, 4, 5, 6],
            zoom: Zoom::Fit,
            show_progress: true,
            page: 2,
            ..NavigationState::default()
        };
        store.save(&doc, &ResumeState::capture(&nav)).unwrap();

        let restored = store.take(&doc).unwrap().unwrap();
        assert_eq!(restored.intervals, vec![3, 4, 5, 6]);
        assert_eq!(restored.zoom, Zoom::Fit);
        assert!(restored.show_progress);
        assert!(store.take(&doc).unwrap().is_none());
    }

    #[test]
    fn resume_overrides_config_fields() {
        let resume = ResumeState {
            interval: 20,
            intervals: Vec::new(),
            zoom: Zoom::Ratio(1.25),
            show_progress: true,
        };
        let mut config = ViewerConfig {
            interval: Some(5),
            page: Some(3),
            ..ViewerConfig::default()
        };
        resume.apply_to(&mut config);
        assert_eq!(config.interval, Some(20));
        assert_eq!(config.zoom, Some(Zoom::Ratio(1.25)));
        assert_eq!(config.page, Some(3));
        assert_eq!(config.show_progress, Some(true));
    }
}
