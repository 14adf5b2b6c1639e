// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.

/// Default listening port.
pub const DEFAULT_PORT: u16 = 6003;

/// Width, in pixels, the source image is scaled to before contour detection.
pub const DEFAULT_WORKING_WIDTH: u32 = 500;

/// Per-session toggles that protocol directives can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Emit trace lines and write the intensity debug image.
    pub verbose_trace: bool,
    /// Write trace lines to `debug.txt` inside the returned archive.
    pub persistent_log: bool,
    /// Keep color in the extracted images instead of converting to grayscale.
    pub return_color: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verbose_trace: true,
            persistent_log: false,
            return_color: false,
        }
    }
}

/// How far a directive received on one connection reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionScope {
    /// Directives apply to the request that carried them and nothing else.
    #[default]
    PerRequest,
    /// Directives overwrite shared state and persist for every later session.
    /// There is no way to reset it short of restarting the process.
    ProcessWide,
}

/// Server settings. Fixed at compile time apart from `RUST_LOG`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the server listens on.
    pub port: u16,
    /// Version string reported by the `http://version` control message.
    pub version: String,
    /// Options in force before any directive is applied.
    pub defaults: SessionOptions,
    /// Whether directives are request-scoped or process-wide.
    pub option_scope: OptionScope,
    /// Working width for the segmentation pipeline.
    pub working_width: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            version: env!("CARGO_PKG_VERSION").to_string(),
            defaults: SessionOptions::default(),
            option_scope: OptionScope::PerRequest,
            working_width: DEFAULT_WORKING_WIDTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 6003);
        assert_eq!(config.working_width, 500);
        assert_eq!(config.option_scope, OptionScope::PerRequest);
        assert!(config.defaults.verbose_trace);
        assert!(!config.defaults.persistent_log);
        assert!(!config.defaults.return_color);
    }
}
