// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Control responses: the plain-text files answered to `http://helpme` and
// `http://version` instead of running the pipeline.

use std::path::{Path, PathBuf};

use tracing::info;

use findpip_core::config::ServerConfig;
use findpip_core::error::Result;
use findpip_core::types::{ALLOWED_EXTENSIONS, ControlMessage, Directive};

use crate::framer::SENTINEL;
use crate::parser::DIRECTIVE_DELIMITER;

/// Host name shown in the help text.
fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "findpip".into())
}

/// Body of `version.txt`.
pub fn version_text(config: &ServerConfig) -> String {
    format!("{}\n", config.version)
}

/// Body of `help.txt`.
pub fn help_text(config: &ServerConfig) -> String {
    let sentinel = String::from_utf8_lossy(SENTINEL);
    let mut text = format!(
        "findpip server v{}\n\nHost: {}\nPort: {}\n",
        config.version,
        host_name(),
        config.port
    );

    text.push_str("\nDescription:\n");
    text.push_str("    Given an image, tries to find all of the pictures within that image and returns\n");
    text.push_str("    each one straightened and cropped.\n");

    text.push_str("\nUsage:\n");
    text.push_str(&format!(
        "    printf '<image_url>{sentinel}' | nc <host> {} > results.tar.gz\n",
        config.port
    ));
    text.push_str(&format!(
        "    The URL must start with ftp://, http:// or https:// and end in one of: {}\n",
        ALLOWED_EXTENSIONS.join(", ")
    ));
    text.push_str(&format!("    The request ends at the first {sentinel}.\n"));

    text.push_str("\nReturns:\n");
    text.push_str("    A gzip-compressed tar archive. Redirect it to a file; printed to a terminal it is unreadable.\n");
    text.push_str("    Problems are reported in error.txt inside the archive.\n");

    text.push_str("\nOptions:\n");
    text.push_str(&format!(
        "    Append options to the URL, each preceded by {DIRECTIVE_DELIMITER}. Case does not matter.\n"
    ));
    for directive in [Directive::DebugModeOff, Directive::DebugFileOn, Directive::ReturnColor] {
        text.push_str(&format!(
            "\n    {}\n        {}\n",
            directive.token(),
            directive_summary(directive)
        ));
    }

    text.push_str("\nBackground color:\n");
    text.push_str("    The sharper the contrast between the background and the pictures you want pulled out,\n");
    text.push_str("    the easier it is to find their edges. Pictures with a mostly white background scan best\n");
    text.push_str("    on solid brown, green or black.\n");

    text.push_str("\nSpecial URLs:\n");
    text.push_str("    These return a single text file instead of an archive. Include the http:// part.\n");
    text.push_str("\n    http://helpme\n        The help file you are reading.\n");
    text.push_str("\n    http://version\n        A text file containing only the server version.\n");

    text
}

fn directive_summary(directive: Directive) -> &'static str {
    match directive {
        Directive::DebugModeOff => "Turn off trace output and the grayscale debug image.",
        Directive::DebugFileOn => "Include the trace in debug.txt inside the archive.",
        Directive::ReturnColor => "Keep the extracted pictures in color instead of grayscale.",
    }
}

/// Write the response file for `control` into `dir` and return its path.
pub fn write_control(control: ControlMessage, dir: &Path, config: &ServerConfig) -> Result<PathBuf> {
    let path = dir.join(control.file_name());
    let body = match control {
        ControlMessage::Help => help_text(config),
        ControlMessage::Version => version_text(config),
    };
    std::fs::write(&path, body)?;
    info!(file = control.file_name(), "control response written");
    Ok(path)
}
