// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source image retrieval.
//
// Sessions fetch through the `Fetcher` trait so tests can hand the pipeline
// bytes without a network.  `SchemeFetcher` is the production implementation:
// it sends `ftp://` URLs to `FtpFetcher` and everything else to
// `HttpFetcher`.  Both backends block and have no timeout, so they must only
// be used from a blocking context (the session runs on tokio's blocking pool).

use std::sync::Arc;

use reqwest::Url;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, instrument, warn};

use findpip_core::error::{FindpipError, Result};

/// URL scheme served by [`FtpFetcher`].
const FTP_SCHEME: &str = "ftp://";

/// Credentials used when an `ftp://` URL carries none.
const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Retrieves the bytes behind an image URL.
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    ///
    /// # Errors
    ///
    /// [`FindpipError::FetchStatus`] when the remote answers with a non-success
    /// status, [`FindpipError::FetchUnreachable`] when it cannot be reached.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// HTTP(S)
// ---------------------------------------------------------------------------

/// HTTP(S) fetcher backed by `reqwest::blocking`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        // Built per call: a blocking client owns a runtime and has to be
        // created and dropped on the thread that uses it.
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| FindpipError::FetchUnreachable(e.to_string()))?;

        let response = client.get(url).send().map_err(|e| {
            warn!(error = %e, "fetch failed");
            FindpipError::FetchUnreachable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "remote returned an error status");
            return Err(FindpipError::FetchStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .map_err(|e| FindpipError::FetchUnreachable(e.to_string()))?;
        debug!(bytes = body.len(), "source fetched");
        Ok(body.to_vec())
    }
}

// ---------------------------------------------------------------------------
// FTP
// ---------------------------------------------------------------------------

/// FTP fetcher backed by `suppaftp`: passive mode, binary transfers.
///
/// Logs in with the URL's credentials (anonymous when there are none),
/// changes into each directory of the path in turn and retrieves the final
/// segment. Every FTP failure, including a missing file, is reported as
/// unreachable; FTP replies carry no HTTP status.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpFetcher;

impl FtpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for FtpFetcher {
    #[instrument(skip(self))]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)
            .map_err(|e| FindpipError::FetchUnreachable(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FindpipError::FetchUnreachable(format!("{url}: no host")))?;
        let port = parsed.port_or_known_default().unwrap_or(21);
        let user = match parsed.username() {
            "" => ANONYMOUS_USER,
            name => name,
        };
        let password = parsed.password().unwrap_or(ANONYMOUS_PASSWORD);

        let mut directories: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let file = directories
            .pop()
            .ok_or_else(|| FindpipError::FetchUnreachable(format!("{url}: no file name")))?;

        let mut ftp = FtpStream::connect((host, port)).map_err(ftp_error)?;
        ftp.login(user, password).map_err(ftp_error)?;
        ftp.transfer_type(FileType::Binary).map_err(ftp_error)?;
        for directory in &directories {
            ftp.cwd(directory).map_err(ftp_error)?;
        }
        let body = ftp.retr_as_buffer(file).map_err(ftp_error)?.into_inner();

        if let Err(e) = ftp.quit() {
            debug!(error = %e, "ftp quit failed");
        }
        debug!(bytes = body.len(), "source fetched");
        Ok(body)
    }
}

fn ftp_error(e: FtpError) -> FindpipError {
    warn!(error = %e, "ftp fetch failed");
    FindpipError::FetchUnreachable(e.to_string())
}

// ---------------------------------------------------------------------------
// Scheme dispatch
// ---------------------------------------------------------------------------

/// Routes `ftp://` URLs to one backend and every other URL to another.
pub struct SchemeFetcher {
    http: Arc<dyn Fetcher>,
    ftp: Arc<dyn Fetcher>,
}

impl SchemeFetcher {
    /// [`HttpFetcher`] for http(s), [`FtpFetcher`] for ftp.
    pub fn new() -> Self {
        Self::with_backends(Arc::new(HttpFetcher::new()), Arc::new(FtpFetcher::new()))
    }

    pub fn with_backends(http: Arc<dyn Fetcher>, ftp: Arc<dyn Fetcher>) -> Self {
        Self { http, ftp }
    }
}

impl Default for SchemeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for SchemeFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if is_ftp(url) {
            self.ftp.fetch(url)
        } else {
            self.http.fetch(url)
        }
    }
}

fn is_ftp(url: &str) -> bool {
    url.get(..FTP_SCHEME.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(FTP_SCHEME))
}
