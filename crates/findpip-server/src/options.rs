// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option scoping: decides whether a directive affects only its own request or
// every session that follows it.

use std::sync::{Arc, Mutex};

use tracing::info;

use findpip_core::config::{OptionScope, SessionOptions};
use findpip_core::types::Directive;

/// Source of the options a session runs with.
#[derive(Debug, Clone)]
pub enum OptionStore {
    /// Each request starts from the same defaults.
    PerRequest(SessionOptions),
    /// Directives write through to shared state that outlives the request.
    ProcessWide(Arc<Mutex<SessionOptions>>),
}

impl OptionStore {
    /// Build the store matching `scope`.
    pub fn new(scope: OptionScope, defaults: SessionOptions) -> Self {
        match scope {
            OptionScope::PerRequest => Self::per_request(defaults),
            OptionScope::ProcessWide => Self::process_wide(defaults),
        }
    }

    pub fn per_request(defaults: SessionOptions) -> Self {
        Self::PerRequest(defaults)
    }

    pub fn process_wide(initial: SessionOptions) -> Self {
        Self::ProcessWide(Arc::new(Mutex::new(initial)))
    }

    /// Options in force before a request's directives are applied.
    pub fn current(&self) -> SessionOptions {
        match self {
            Self::PerRequest(defaults) => *defaults,
            Self::ProcessWide(shared) => *lock(shared),
        }
    }

    /// Options for a request carrying `directives`.
    ///
    /// In the process-wide scope the directives are also stored, so they stay
    /// in force for every later session.
    pub fn resolve(&self, directives: &[Directive]) -> SessionOptions {
        match self {
            Self::PerRequest(defaults) => {
                let mut options = *defaults;
                for directive in directives {
                    directive.apply(&mut options);
                }
                options
            }
            Self::ProcessWide(shared) => {
                let mut options = lock(shared);
                for directive in directives {
                    directive.apply(&mut options);
                }
                if !directives.is_empty() {
                    info!(options = ?*options, "process-wide options changed");
                }
                *options
            }
        }
    }
}

/// Lock the shared options. `SessionOptions` is plain data, so a poisoned lock
/// still holds a usable value.
fn lock(shared: &Mutex<SessionOptions>) -> std::sync::MutexGuard<'_, SessionOptions> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
