// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request parsing: pulls the image URL and option directives out of a framed
// message.
//
// # Message grammar
//
//   message   = *( text ) url *( "***" directive | text )
//   url       = ( "ftp" | "http" | "https" ) "://" <shortest path> "." ext
//   directive = "debugmodeoff" | "debugfileon" | "returncolor"   ; any case
//
// The URL is the first match in the message.  Whatever is left once the URL is
// removed is split on `***`; tokens that are not directives are ignored.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use findpip_core::error::{FindpipError, Result};
use findpip_core::types::{ALLOWED_EXTENSIONS, Directive};

/// Separator between directive tokens.
pub const DIRECTIVE_DELIMITER: &str = "***";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(ftp|http|https)://.*?\.({})",
        ALLOWED_EXTENSIONS.join("|")
    );
    // The pattern is built from a fixed list of plain extensions.
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid URL pattern {pattern}: {e}"))
});

/// A request message after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// The image URL.
    pub url: String,
    /// Directives in the order they appeared, duplicates removed.
    pub directives: Vec<Directive>,
}

impl ParsedRequest {
    /// Whether `directive` was present.
    pub fn has(&self, directive: Directive) -> bool {
        self.directives.contains(&directive)
    }
}

/// Parse a framed message into its URL and directives.
///
/// # Errors
///
/// Returns [`FindpipError::Parse`] when no image URL is present.
pub fn parse_request(message: &str) -> Result<ParsedRequest> {
    let url = URL_PATTERN
        .find(message)
        .map(|m| m.as_str().to_string())
        .ok_or(FindpipError::Parse)?;

    let remainder = message.replace(url.as_str(), "");
    let mut directives = Vec::new();
    for token in remainder.split(DIRECTIVE_DELIMITER) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match Directive::from_token(token) {
            Some(directive) if !directives.contains(&directive) => directives.push(directive),
            Some(_) => {}
            None => debug!(token, "ignoring unknown directive"),
        }
    }

    debug!(url = %url, directives = ?directives, "parsed request");
    Ok(ParsedRequest { url, directives })
}

/// The final path segment of `url` (everything after the last `/`).
pub fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Split the final path segment of `url` into stem and extension, and check
/// the extension against [`ALLOWED_EXTENSIONS`].
///
/// # Errors
///
/// Returns [`FindpipError::Extension`] when the segment has no extension or
/// the extension is not allowed.
pub fn check_extension(url: &str) -> Result<(String, String)> {
    let name = file_name(url);
    let allowed = || FindpipError::Extension {
        allowed: format!("({})", ALLOWED_EXTENSIONS.join(", ")),
    };

    let (stem, ext) = name.rsplit_once('.').ok_or_else(allowed)?;
    if stem.is_empty() || !ALLOWED_EXTENSIONS.contains(&ext) {
        return Err(allowed());
    }
    Ok((stem.to_string(), ext.to_string()))
}
