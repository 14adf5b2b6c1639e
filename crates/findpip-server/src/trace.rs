// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session trace with a deferred file sink.
//
// Trace lines start before a session has anywhere to write them (the
// connection is accepted and the message framed before a work area exists).
// Those lines are staged in memory and drained into `debug.txt` the moment a
// file sink is attached.  Every line is also emitted as a `tracing` event.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use findpip_core::types::ConnectionId;

/// Name of the trace file included in the response archive.
pub const DEBUG_FILE_NAME: &str = "debug.txt";

/// Trace lines for one connection.
#[derive(Debug)]
pub struct SessionTrace {
    connection: ConnectionId,
    /// When false, lines are dropped without being emitted or staged.
    verbose: bool,
    /// Lines recorded before a sink was attached.
    staged: Vec<(DateTime<Utc>, String)>,
    /// The open `debug.txt`, once attached.
    sink: Option<File>,
}

impl SessionTrace {
    pub fn new(connection: ConnectionId, verbose: bool) -> Self {
        Self {
            connection,
            verbose,
            staged: Vec::new(),
            sink: None,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Turn recording on or off. Lines already staged are kept.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Record a trace line.
    pub fn note(&mut self, line: impl Into<String>) {
        if !self.verbose {
            return;
        }
        let line = line.into();
        debug!(connection = %self.connection, "{line}");

        let now = Utc::now();
        match self.sink.as_mut() {
            Some(file) => {
                if let Err(e) = write_line(file, now, &line) {
                    warn!(connection = %self.connection, error = %e, "debug file write failed; detaching");
                    self.sink = None;
                }
            }
            None => self.staged.push((now, line)),
        }
    }

    /// Open `path` for appending and drain every staged line into it.
    ///
    /// Later lines go straight to the file.
    pub fn attach(&mut self, path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for (at, line) in self.staged.drain(..) {
            write_line(&mut file, at, &line)?;
        }
        self.sink = Some(file);
        Ok(())
    }

    /// Close the file sink. Later lines are staged again.
    pub fn detach(&mut self) {
        self.sink = None;
    }
}

fn write_line(file: &mut File, at: DateTime<Utc>, line: &str) -> std::io::Result<()> {
    writeln!(file, "{} {}", at.to_rfc3339_opts(SecondsFormat::Millis, true), line)
}
