// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// findpip Server: sentinel-framed TCP protocol, request parsing, per-request
// sessions, and result packaging.  This crate bridges between the core types
// in `findpip-core`, the pipeline in `findpip-segment`, and the network.

pub mod archive;
pub mod control;
pub mod fetch;
pub mod framer;
pub mod multiplexer;
pub mod options;
pub mod parser;
pub mod session;
pub mod trace;
pub mod work_area;

pub use archive::{ArchivePackager, TarGzPackager};
pub use fetch::{Fetcher, FtpFetcher, HttpFetcher, SchemeFetcher};
pub use framer::MessageFramer;
pub use multiplexer::{ConnectionRegistry, FindpipServer};
pub use options::OptionStore;
pub use parser::{ParsedRequest, parse_request};
pub use session::{PreparedResponse, SessionCoordinator, SessionOutcome};
pub use trace::SessionTrace;
pub use work_area::WorkArea;
