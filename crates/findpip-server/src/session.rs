// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session coordinator: turns one framed message into one response.
//
// A session runs in two halves:
//
// 1. `prepare` (blocking): work area, control check, parse, options, fetch,
//    segmentation, packaging.  Every request-scoped error is written to
//    `error.txt` and the session carries on to packaging, so the client
//    receives an archive.  Any other error ends the session without a
//    response.
// 2. `transmit` (async): stream the payload to the peer, then remove the work
//    area and the archive whether or not the send succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use findpip_core::config::{ServerConfig, SessionOptions};
use findpip_core::error::{FindpipError, Result};
use findpip_core::error_text;
use findpip_core::types::{ConnectionId, ControlMessage};
use findpip_segment::{ExtractionRequest, SegmentationEngine};

use crate::archive::{ArchivePackager, TarGzPackager};
use crate::control;
use crate::fetch::{Fetcher, SchemeFetcher};
use crate::framer::READ_CHUNK_SIZE;
use crate::options::OptionStore;
use crate::parser::{check_extension, file_name, parse_request};
use crate::trace::SessionTrace;
use crate::work_area::WorkArea;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// What a finished session did. Paths refer to files that no longer exist.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The work area the session ran in.
    pub work_dir: PathBuf,
    /// The archive that was sent, unless this was a control response.
    pub archive: Option<PathBuf>,
    /// The control message answered, if any.
    pub control: Option<ControlMessage>,
    /// Number of pictures extracted.
    pub extracted: usize,
    /// Bytes written to the peer before the send finished or failed.
    pub bytes_sent: u64,
    /// Set when the peer went away mid-send.
    pub transmission_error: Option<FindpipError>,
}

/// A response ready to be sent. Owns the work area and the archive; both are
/// removed when the response is transmitted or dropped.
#[derive(Debug)]
pub struct PreparedResponse {
    work_area: WorkArea,
    payload: PathBuf,
    archive: Option<TempPath>,
    control: Option<ControlMessage>,
    extracted: usize,
}

impl PreparedResponse {
    /// Stream the payload to `writer` in `READ_CHUNK_SIZE` pieces, then shut
    /// the writer down and clean up.
    pub async fn transmit<W>(self, writer: &mut W, trace: &mut SessionTrace) -> SessionOutcome
    where
        W: AsyncWrite + Unpin,
    {
        let mut outcome = SessionOutcome {
            work_dir: self.work_area.path().to_path_buf(),
            archive: self.archive.as_ref().map(|p| p.to_path_buf()),
            control: self.control,
            extracted: self.extracted,
            bytes_sent: 0,
            transmission_error: None,
        };

        match send_file(&self.payload, writer, &mut outcome.bytes_sent).await {
            Ok(()) => {
                info!(
                    connection = %trace.connection(),
                    bytes = outcome.bytes_sent,
                    "response sent"
                );
                trace.note(format!("Sent {} bytes", outcome.bytes_sent));
            }
            Err(e) => {
                warn!(
                    connection = %trace.connection(),
                    bytes = outcome.bytes_sent,
                    error = %e,
                    "connection terminated mid-send"
                );
                trace.note(format!("Connection unexpectedly terminated: {e}"));
                outcome.transmission_error = Some(FindpipError::Transmission(e.to_string()));
            }
        }

        self.cleanup();
        outcome
    }

    fn cleanup(self) {
        if let Some(archive) = self.archive {
            let path = archive.to_path_buf();
            if let Err(e) = archive.close() {
                warn!(path = %path.display(), error = %e, "failed to remove archive");
            }
        }
        if let Err(e) = self.work_area.close() {
            warn!(error = %e, "failed to remove work area");
        }
    }
}

async fn send_file<W>(path: &Path, writer: &mut W, sent: &mut u64) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        *sent += n as u64;
    }
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// SessionCoordinator
// ---------------------------------------------------------------------------

/// How far a request got; used to annotate errors and to clean up.
#[derive(Debug, Default)]
struct Progress {
    url: Option<String>,
    source_name: Option<String>,
    extracted: usize,
}

/// Runs sessions. One coordinator is shared by every connection.
pub struct SessionCoordinator {
    config: ServerConfig,
    options: OptionStore,
    fetcher: Arc<dyn Fetcher>,
    packager: Arc<dyn ArchivePackager>,
    engine: SegmentationEngine,
}

impl SessionCoordinator {
    pub fn new(
        config: ServerConfig,
        options: OptionStore,
        fetcher: Arc<dyn Fetcher>,
        packager: Arc<dyn ArchivePackager>,
        engine: SegmentationEngine,
    ) -> Self {
        Self {
            config,
            options,
            fetcher,
            packager,
            engine,
        }
    }

    /// Production wiring: HTTP and FTP fetches, tar.gz archives, and the option scope
    /// and working width from `config`.
    pub fn from_config(config: ServerConfig) -> Self {
        let options = OptionStore::new(config.option_scope, config.defaults);
        let engine = SegmentationEngine::new(config.working_width);
        Self::new(
            config,
            options,
            Arc::new(SchemeFetcher::new()),
            Arc::new(TarGzPackager::new()),
            engine,
        )
    }

    /// Options in force before any directive of the next request.
    pub fn current_options(&self) -> SessionOptions {
        self.options.current()
    }

    /// A trace for a new connection, verbose if the current options say so.
    pub fn new_trace(&self, connection: ConnectionId) -> SessionTrace {
        SessionTrace::new(connection, self.current_options().verbose_trace)
    }

    /// Build the response for `message`.
    ///
    /// # Errors
    ///
    /// Only when no response can be built at all: the work area cannot be
    /// created, a control file cannot be written, packaging fails, or the
    /// request hit an error that is not request-scoped.  Request-scoped
    /// errors end up in `error.txt` instead.
    #[instrument(skip_all, fields(connection = %trace.connection()))]
    pub fn prepare(&self, message: &str, trace: &mut SessionTrace) -> Result<PreparedResponse> {
        let work_area = WorkArea::create()?;
        trace.note(format!("Work area: {}", work_area.path().display()));

        if let Some(control) = ControlMessage::from_message(message) {
            trace.note(format!("Control request: {}", control.file_name()));
            let payload = control::write_control(control, work_area.path(), &self.config)?;
            return Ok(PreparedResponse {
                work_area,
                payload,
                archive: None,
                control: Some(control),
                extracted: 0,
            });
        }

        let mut progress = Progress::default();
        if let Err(err) = self.run_request(message, &work_area, trace, &mut progress) {
            if !err.is_request_scoped() {
                warn!(error = %err, "session aborted without a response");
                return Err(err);
            }
            warn!(
                error = %err,
                url = progress.url.as_deref().unwrap_or(""),
                "request failed"
            );
            trace.note(format!("Error: {err}"));
            record(&work_area, &error_text::describe(&err, progress.url.as_deref()));
        }

        if let Some(name) = &progress.source_name {
            work_area.discard_source(name);
        }
        trace.note("Packaging results");
        trace.detach();

        let archive_path = work_area.archive_path();
        let archive = TempPath::from_path(&archive_path);
        self.packager.package(work_area.path(), &archive_path)?;
        debug!(archive = %archive_path.display(), extracted = progress.extracted, "response prepared");

        Ok(PreparedResponse {
            work_area,
            payload: archive_path,
            archive: Some(archive),
            control: None,
            extracted: progress.extracted,
        })
    }

    fn run_request(
        &self,
        message: &str,
        work_area: &WorkArea,
        trace: &mut SessionTrace,
        progress: &mut Progress,
    ) -> Result<()> {
        let parsed = parse_request(message)?;
        progress.url = Some(parsed.url.clone());

        let options = self.options.resolve(&parsed.directives);
        trace.set_verbose(options.verbose_trace);
        trace.note(format!("URL received: {}", parsed.url));
        if options.verbose_trace && options.persistent_log {
            trace.attach(&work_area.debug_path())?;
        }

        let (stem, extension) = check_extension(&parsed.url)?;
        let name = file_name(&parsed.url).to_string();

        trace.note("Fetching source image");
        let bytes = self.fetcher.fetch(&parsed.url)?;
        let source = work_area.source_path(&name);
        std::fs::write(&source, &bytes)?;
        progress.source_name = Some(name);
        trace.note(format!("Saved {} bytes to {}", bytes.len(), source.display()));

        let request = ExtractionRequest {
            source: &source,
            output_dir: work_area.path(),
            stem: &stem,
            extension: &extension,
            return_color: options.return_color,
            save_grayscale: options.verbose_trace,
        };
        let report = self.engine.extract(&request)?;
        progress.extracted = report.saved.len();
        trace.note(format!(
            "Found {} contours, extracted {} pictures",
            report.contour_count,
            report.saved.len()
        ));

        if report.saved.is_empty() {
            record(work_area, &error_text::nothing_extracted(&parsed.url));
        }
        Ok(())
    }

    /// Prepare on the blocking pool, then transmit to `writer`.
    pub async fn serve<W>(
        self: Arc<Self>,
        message: String,
        trace: SessionTrace,
        writer: &mut W,
    ) -> Result<SessionOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        let (prepared, mut trace) = tokio::task::spawn_blocking(move || {
            let mut trace = trace;
            let prepared = self.prepare(&message, &mut trace);
            (prepared, trace)
        })
        .await
        .map_err(|e| FindpipError::Server(format!("session task: {e}")))?;

        let response = prepared?;
        Ok(response.transmit(writer, &mut trace).await)
    }
}

fn record(work_area: &WorkArea, text: &str) {
    if let Err(e) = work_area.record_error(text) {
        warn!(error = %e, "failed to write error report");
    }
}
