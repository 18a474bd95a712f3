use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::geometry::Rect;

/// One append-only history entry: the annotation list as it was before some
/// later save replaced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub timestamp: String,
    pub annotations: Vec<Annotation>,
    pub description: String,
}

/// On-disk snapshot format for one screenshot: the current annotation list,
/// the image size it was measured against, and the version history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub screenshot_id: String,
    pub source_size: Rect,
    #[serde(default)]
    pub current_annotations: Vec<Annotation>,
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl AnnotationData {
    fn empty(screenshot_id: String, source_size: Rect) -> Self {
        Self {
            screenshot_id,
            source_size,
            current_annotations: Vec::new(),
            versions: Vec::new(),
        }
    }
}

/// Sidecar JSON file next to the screenshot, e.g. `login.png.annot.json`.
/// Every save is a total overwrite of the current list; the previous current
/// list is wrapped into a new version first, so the version count only grows.
#[derive(Clone, Debug)]
pub struct AnnotationFile {
    path: PathBuf,
    screenshot_id: String,
}

fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(format!(
        "{}.annot.json",
        image_path
            .extension()
            .unwrap_or_default()
            .to_str()
            .unwrap_or("")
    ))
}

impl AnnotationFile {
    pub fn for_image(image_path: &Path) -> Self {
        let screenshot_id = image_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Self {
            path: sidecar_path(image_path),
            screenshot_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn screenshot_id(&self) -> &str {
        &self.screenshot_id
    }

    /// Load the sidecar, or an empty data set if none exists yet. If the
    /// stored source size differs from `actual_size` (the screenshot was
    /// re-captured at another resolution), rects are rescaled proportionally
    /// so they stay attached to the same image features.
    pub fn load(&self, actual_size: Rect) -> Result<AnnotationData> {
        if !self.path.exists() {
            return Ok(AnnotationData::empty(self.screenshot_id.clone(), actual_size));
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let mut data: AnnotationData = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        let stored = data.source_size;
        if stored.width > 0.0
            && stored.height > 0.0
            && (stored.width != actual_size.width || stored.height != actual_size.height)
        {
            let sx = actual_size.width / stored.width;
            let sy = actual_size.height / stored.height;
            for annotation in &mut data.current_annotations {
                annotation.rect = annotation.rect.scaled(sx, sy);
            }
            data.source_size = actual_size;
        }
        Ok(data)
    }

    /// Overwrite the current annotation list, wrapping the previous one into
    /// a new version entry. Returns the new version count.
    pub fn save(&self, annotations: &[Annotation], source_size: Rect) -> Result<usize> {
        let mut data = match self.read_raw()? {
            Some(existing) => existing,
            None => AnnotationData::empty(self.screenshot_id.clone(), source_size),
        };

        data.versions.push(Version {
            timestamp: Utc::now().to_rfc3339(),
            annotations: std::mem::take(&mut data.current_annotations),
            description: format!("Version {}", data.versions.len() + 1),
        });
        data.current_annotations = annotations.to_vec();
        data.source_size = source_size;

        self.write(&data)?;
        Ok(data.versions.len())
    }

    pub fn versions(&self) -> Result<Vec<Version>> {
        Ok(self.read_raw()?.map(|d| d.versions).unwrap_or_default())
    }

    /// Restore the annotation list from `versions[index]`. The pre-rollback
    /// state is wrapped into a new version rather than deleted, so rollback
    /// itself can be rolled back.
    pub fn rollback(&self, index: usize) -> Result<AnnotationData> {
        let Some(mut data) = self.read_raw()? else {
            bail!("no annotation data for {}", self.screenshot_id);
        };
        if index >= data.versions.len() {
            bail!(
                "version index {index} out of range (have {})",
                data.versions.len()
            );
        }

        let restored = data.versions[index].annotations.clone();
        data.versions.push(Version {
            timestamp: Utc::now().to_rfc3339(),
            annotations: std::mem::replace(&mut data.current_annotations, restored),
            description: format!("Rollback to version {}", index + 1),
        });

        self.write(&data)?;
        Ok(data)
    }

    fn read_raw(&self) -> Result<Option<AnnotationData>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let data = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(data))
    }

    // Write-then-rename, so a reader never sees a half-written file.
    fn write(&self, data: &AnnotationData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))
    }
}

/// Outcome of one background save: the new version count, or a message fit
/// for the status bar.
pub type SaveResult = Result<usize, String>;

struct SaveRequest {
    annotations: Vec<Annotation>,
    source_size: Rect,
}

/// Long-lived worker owning all sidecar writes. Requests are queued over a
/// channel and processed in order on one thread, so overlapping commits can
/// never interleave the read-modify-write cycle or drop a version wrap.
pub struct SaveWorker {
    requests: Sender<SaveRequest>,
    results: Receiver<SaveResult>,
}

impl SaveWorker {
    /// `after_save` runs on the worker thread after each successful save;
    /// script regeneration rides here, best-effort.
    pub fn spawn<F>(file: AnnotationFile, after_save: F) -> Self
    where
        F: Fn(&[Annotation], Rect) + Send + 'static,
    {
        let (requests, request_rx) = channel::<SaveRequest>();
        let (result_tx, results) = channel();
        std::thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let result = file.save(&request.annotations, request.source_size);
                if result.is_ok() {
                    after_save(&request.annotations, request.source_size);
                }
                if result_tx
                    .send(result.map_err(|err| format!("{err:#}")))
                    .is_err()
                {
                    break;
                }
            }
        });
        Self { requests, results }
    }

    /// Queue a save; never blocks.
    pub fn request(&self, annotations: Vec<Annotation>, source_size: Rect) {
        let _ = self.requests.send(SaveRequest {
            annotations,
            source_size,
        });
    }

    /// Next finished save, if any.
    pub fn poll(&self) -> Option<SaveResult> {
        self.results.try_recv().ok()
    }
}
