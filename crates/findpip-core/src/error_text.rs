// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text error reports for the `error.txt` artifact.
//
// The client only ever sees the archive, so every error is rendered as a short
// explanation, a hint where one helps, and the URL the server was working on.

use crate::error::FindpipError;

/// A rendered error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// One-line summary.
    pub message: String,
    /// What the client could try, if anything.
    pub hint: Option<String>,
}

impl ErrorReport {
    /// Render the report as the block written into `error.txt`.
    pub fn render(&self, url: Option<&str>) -> String {
        let mut text = self.message.clone();
        if let Some(hint) = &self.hint {
            text.push('\n');
            text.push_str(hint);
        }
        if let Some(url) = url {
            text.push_str("\n\nURL received: ");
            text.push_str(url);
        }
        text
    }
}

/// Convert a `FindpipError` into a report a client can act on.
pub fn report_error(err: &FindpipError) -> ErrorReport {
    match err {
        FindpipError::Parse => ErrorReport {
            message: "No image URL was found in the request.".into(),
            hint: Some(
                "Send a URL starting with ftp://, http:// or https:// that ends in an image extension, followed by ~~~."
                    .into(),
            ),
        },

        FindpipError::Frame(detail) => ErrorReport {
            message: "The request was not valid UTF-8 text.".into(),
            hint: Some(format!("({detail})")),
        },

        FindpipError::Extension { allowed } => ErrorReport {
            message: format!("File does not end with one of {allowed}"),
            hint: None,
        },

        FindpipError::FetchStatus { status } => {
            let mut message =
                format!("The server couldn't fulfill the request.\nError code: {status}");
            if *status == 404 {
                message.push_str(" (File not found)");
            }
            ErrorReport { message, hint: None }
        }

        FindpipError::FetchUnreachable(reason) => ErrorReport {
            message: format!("Failed to reach the server.\nReason: {reason}"),
            hint: None,
        },

        FindpipError::Decode(_) => ErrorReport {
            message: "Image file appears to be corrupted.".into(),
            hint: None,
        },

        FindpipError::Resize(detail) => ErrorReport {
            message: "Unable to resize image.".into(),
            hint: Some(detail.clone()),
        },

        FindpipError::NoContours => ErrorReport {
            message: "No contours found to retrieve.".into(),
            hint: Some(
                "A background that contrasts sharply with the pictures makes their edges easier to find."
                    .into(),
            ),
        },

        FindpipError::CornerUnderflow { contour, vertices } => ErrorReport {
            message: format!(
                "Could not find four corners for contour {contour} (only {vertices} vertices)."
            ),
            hint: None,
        },

        FindpipError::Save(detail) => ErrorReport {
            message: "Unable to save extracted image to disk.".into(),
            hint: Some(detail.clone()),
        },

        FindpipError::Archive(detail) => ErrorReport {
            message: "Unable to build the result archive.".into(),
            hint: Some(detail.clone()),
        },

        FindpipError::Transmission(detail) => ErrorReport {
            message: "Connection unexpectedly terminated.".into(),
            hint: Some(detail.clone()),
        },

        FindpipError::Server(detail) => ErrorReport {
            message: "The server had a problem.".into(),
            hint: Some(detail.clone()),
        },

        FindpipError::Io(e) => ErrorReport {
            message: "A file operation failed on the server.".into(),
            hint: Some(e.to_string()),
        },
    }
}

/// Shorthand for `report_error(err).render(url)`.
pub fn describe(err: &FindpipError, url: Option<&str>) -> String {
    report_error(err).render(url)
}

/// The non-fatal report written when a pipeline run saved nothing.
pub fn nothing_extracted(url: &str) -> String {
    format!("Did not find anything to extract from source image.\n\nURL received: {url}")
}
