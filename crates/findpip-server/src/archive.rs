// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response packaging.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, instrument};

use findpip_core::error::{FindpipError, Result};

/// Bundles a work area into a single file for transmission.
pub trait ArchivePackager: Send + Sync {
    /// Package the contents of `dir` into `dest`.
    fn package(&self, dir: &Path, dest: &Path) -> Result<()>;
}

/// Gzip-compressed tar archive rooted at `.`.
///
/// Entries are the directory's contents with relative names (`./a.png`), so
/// unpacking never writes outside the target directory.
#[derive(Debug, Clone, Copy)]
pub struct TarGzPackager {
    level: Compression,
}

impl TarGzPackager {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Default for TarGzPackager {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchivePackager for TarGzPackager {
    #[instrument(skip(self), fields(dir = %dir.display(), dest = %dest.display()))]
    fn package(&self, dir: &Path, dest: &Path) -> Result<()> {
        let file = File::create(dest)?;
        let encoder = GzEncoder::new(BufWriter::new(file), self.level);
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        builder
            .append_dir_all(".", dir)
            .map_err(|e| FindpipError::Archive(format!("add {}: {e}", dir.display())))?;

        let encoder = builder
            .into_inner()
            .map_err(|e| FindpipError::Archive(format!("finish tar: {e}")))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| FindpipError::Archive(format!("finish gzip: {e}")))?;
        std::io::Write::flush(&mut writer)?;

        debug!(bytes = dest.metadata().map(|m| m.len()).unwrap_or(0), "archive written");
        Ok(())
    }
}
