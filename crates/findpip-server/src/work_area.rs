// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session scratch directory.
//
// Everything a session produces (source image, results, debug and error
// files) lives in one uniquely named temporary directory.  The directory is
// removed when the `WorkArea` is closed or dropped, so cleanup happens once
// whether the response was delivered or not.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use findpip_core::error::{FindpipError, Result};

use crate::trace::DEBUG_FILE_NAME;

/// Prefix of every work area directory name.
pub const WORK_AREA_PREFIX: &str = "findpip_";

/// Name of the error report inside the archive.
pub const ERROR_FILE_NAME: &str = "error.txt";

/// Prefix given to the downloaded source image.
pub const SOURCE_PREFIX: &str = "srcimage_";

/// Uniquely named scratch directory for one session.
#[derive(Debug)]
pub struct WorkArea {
    dir: TempDir,
    /// Final component of the directory path; reused as the archive stem.
    base_name: String,
}

impl WorkArea {
    /// Create a work area under the system temporary directory.
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a work area under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORK_AREA_PREFIX)
            .tempdir_in(parent)?;
        let base_name = dir
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| FindpipError::Server("work area has no directory name".into()))?;
        debug!(path = %dir.path().display(), "work area created");
        Ok(Self { dir, base_name })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Where the downloaded source image named `file_name` is stored.
    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.path().join(format!("{SOURCE_PREFIX}{file_name}"))
    }

    pub fn error_path(&self) -> PathBuf {
        self.path().join(ERROR_FILE_NAME)
    }

    pub fn debug_path(&self) -> PathBuf {
        self.path().join(DEBUG_FILE_NAME)
    }

    /// Path of the archive built from this work area. It sits beside the
    /// directory, never inside it, so the archive does not contain itself.
    pub fn archive_path(&self) -> PathBuf {
        let parent = self.path().parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{}.tar.gz", self.base_name))
    }

    /// Append a report block to `error.txt`.
    pub fn record_error(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.error_path())?;
        writeln!(file, "{text}")?;
        Ok(())
    }

    /// Remove the downloaded source image so it is not sent back.
    pub fn discard_source(&self, file_name: &str) {
        let path = self.source_path(file_name);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove source image");
            }
        }
    }

    /// Remove the directory and everything in it.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "work area removed");
        Ok(())
    }
}
