//! On-disk workspace of a segmented job.
//!
//! Layout: `<output dir>/.vcz-parts/<output stem>-<hash>/` holding
//! `resume_meta.json`, `seg_NNNNNN.<ext>` files and the concat list.

use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::plan::{PlanMismatch, SegmentPlan};
use crate::storage;

pub const WORKSPACE_ROOT_NAME: &str = ".vcz-parts";
pub const META_FILE_NAME: &str = "resume_meta.json";
pub const CONCAT_LIST_NAME: &str = "concat_list.txt";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("segment workspace I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode segment plan: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("missing segment for concat: {}", .0.display())]
    MissingSegment(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WorkspaceError + '_ {
    move |source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What `prepare` found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// No previous workspace.
    Fresh,
    /// Previous workspace matches; finished segments can be reused.
    Resumed,
    /// Previous workspace was discarded.
    Reset(Option<PlanMismatch>),
}

/// Segment workspace for one (input, output) pair.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
    ext: String,
}

impl Workspace {
    /// Deterministic workspace for a logical job, so reruns find earlier segments.
    pub fn for_job(input: &Path, output: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(input.to_string_lossy().as_bytes());
        hasher.update(b"|");
        hasher.update(output.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let ext = output
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "mp4".to_string());
        Self {
            dir: parent
                .join(WORKSPACE_ROOT_NAME)
                .join(format!("{}-{}", stem, &digest[..10])),
            ext,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE_NAME)
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.dir.join(CONCAT_LIST_NAME)
    }

    /// Final name of segment `index` (six-digit zero-padded).
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("seg_{:06}.{}", index, self.ext))
    }

    /// Read the persisted plan. Ok(None) if there is none.
    pub fn load_plan(&self) -> Result<Option<SegmentPlan>, WorkspaceError> {
        let path = self.meta_path();
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        match serde_json::from_slice(&data) {
            Ok(plan) => Ok(Some(plan)),
            Err(e) => {
                tracing::warn!(path = %path.display(), "unreadable segment plan: {}", e);
                Ok(None)
            }
        }
    }

    fn save_plan(&self, plan: &SegmentPlan) -> Result<(), WorkspaceError> {
        let path = self.meta_path();
        let json = serde_json::to_vec_pretty(plan).map_err(WorkspaceError::Encode)?;
        let tmp = storage::temp_path(&path);
        std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(io_err(&path))
    }

    /// Validate-or-reset: keep the workspace only if its persisted plan
    /// matches `plan`; otherwise wipe it. Then (re)create it and persist `plan`.
    pub fn prepare(&self, plan: &SegmentPlan) -> Result<Prepared, WorkspaceError> {
        let outcome = if self.dir.exists() {
            match self.load_plan()? {
                Some(persisted) => match plan.check_reusable(&persisted) {
                    Ok(()) => Prepared::Resumed,
                    Err(mismatch) => {
                        tracing::info!(dir = %self.dir.display(), "{}; discarding segments", mismatch);
                        self.remove()?;
                        Prepared::Reset(Some(mismatch))
                    }
                },
                // Segments without a readable plan cannot be trusted.
                None => {
                    self.remove()?;
                    Prepared::Reset(None)
                }
            }
        } else {
            Prepared::Fresh
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        self.save_plan(plan)?;
        Ok(outcome)
    }

    /// Write the ordered concat list for segments `0..count`.
    /// Fails if any segment is missing.
    pub fn write_concat_list(&self, count: usize) -> Result<PathBuf, WorkspaceError> {
        let path = self.concat_list_path();
        let mut body = String::new();
        for index in 0..count {
            let seg = self.segment_path(index);
            if !seg.is_file() {
                return Err(WorkspaceError::MissingSegment(seg));
            }
            body.push_str(&concat_line(&seg));
        }
        let mut file = std::fs::File::create(&path).map_err(io_err(&path))?;
        file.write_all(body.as_bytes()).map_err(io_err(&path))?;
        file.sync_all().map_err(io_err(&path))?;
        Ok(path)
    }

    /// Delete the whole workspace directory (and its root, if left empty).
    pub fn remove(&self) -> Result<(), WorkspaceError> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&self.dir)(e)),
        }
        if let Some(root) = self.dir.parent() {
            // Only succeeds when no other job's workspace remains.
            let _ = std::fs::remove_dir(root);
        }
        Ok(())
    }
}

/// One concat-demuxer line with single quotes escaped.
fn concat_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'\n", escaped)
}
