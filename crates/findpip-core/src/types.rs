// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the findpip server.

use uuid::Uuid;

use crate::config::SessionOptions;

/// Image file extensions a request may reference.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jp2", "png", "bmp", "dib", "webp", "pbm", "pgm", "ppm", "sr", "ras",
    "tiff", "tif",
];

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading chunks until the sentinel arrives.
    AwaitingMessage,
    /// A full message arrived and the session is running.
    Processing,
    /// The response has been sent (or abandoned) and the socket is closing.
    Closing,
}

/// Lifecycle states of the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
}

/// An option directive carried in a request message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `debugmodeoff`: disable verbose tracing.
    DebugModeOff,
    /// `debugfileon`: include `debug.txt` in the response.
    DebugFileOn,
    /// `returncolor`: keep color in the extracted images.
    ReturnColor,
}

impl Directive {
    /// Match a directive token, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "debugmodeoff" => Some(Self::DebugModeOff),
            "debugfileon" => Some(Self::DebugFileOn),
            "returncolor" => Some(Self::ReturnColor),
            _ => None,
        }
    }

    /// The protocol spelling of this directive.
    pub fn token(&self) -> &'static str {
        match self {
            Self::DebugModeOff => "debugmodeoff",
            Self::DebugFileOn => "debugfileon",
            Self::ReturnColor => "returncolor",
        }
    }

    /// Apply the directive to a set of options.
    pub fn apply(&self, options: &mut SessionOptions) {
        match self {
            Self::DebugModeOff => options.verbose_trace = false,
            Self::DebugFileOn => options.persistent_log = true,
            Self::ReturnColor => options.return_color = true,
        }
    }
}

/// Reserved message bodies that return a static text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// `http://helpme`: usage instructions.
    Help,
    /// `http://version`: the version string only.
    Version,
}

impl ControlMessage {
    /// Recognise a control message. The whole message must match, ignoring
    /// ASCII case and surrounding whitespace.
    pub fn from_message(message: &str) -> Option<Self> {
        match message.trim().to_ascii_lowercase().as_str() {
            "http://helpme" => Some(Self::Help),
            "http://version" => Some(Self::Version),
            _ => None,
        }
    }

    /// Name of the text file sent back for this control message.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Help => "help.txt",
            Self::Version => "version.txt",
        }
    }
}
