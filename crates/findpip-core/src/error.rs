// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for findpip.

use thiserror::Error;

/// Top-level error type for all findpip operations.
#[derive(Debug, Error)]
pub enum FindpipError {
    // -- Protocol errors --
    #[error("no image URL found in request")]
    Parse,

    #[error("message is not valid UTF-8: {0}")]
    Frame(String),

    #[error("file does not end with one of {allowed}")]
    Extension { allowed: String },

    // -- Fetch errors --
    #[error("remote server could not fulfil the request (status {status})")]
    FetchStatus { status: u16 },

    #[error("failed to reach the remote server: {0}")]
    FetchUnreachable(String),

    // -- Pipeline errors --
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image resize failed: {0}")]
    Resize(String),

    #[error("no contours found to retrieve")]
    NoContours,

    #[error("contour {contour} simplified to {vertices} vertices; at least 4 are needed")]
    CornerUnderflow { contour: usize, vertices: usize },

    #[error("failed to save image: {0}")]
    Save(String),

    // -- Response errors --
    #[error("archive creation failed: {0}")]
    Archive(String),

    #[error("peer closed the connection mid-send: {0}")]
    Transmission(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FindpipError {
    /// Whether the error belongs to one request and can be answered.
    ///
    /// A request-scoped error is written into `error.txt` and the client still
    /// gets an archive. Framing, transmission and server-level errors end the
    /// session without a response.
    pub fn is_request_scoped(&self) -> bool {
        !matches!(self, Self::Frame(_) | Self::Server(_) | Self::Transmission(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FindpipError>;
