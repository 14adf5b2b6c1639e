// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour pairing policies.
//
// Border tracing on a one-pixel edge ring reports each picture twice: once for
// the outer border of the ring and once for the hole it encloses, one right
// after the other. Which of the two gets materialized is a policy, not a
// property of the tracing library, so it lives behind a trait.

/// Decides which contours, by discovery index, become extracted images.
pub trait ContourPairing: Send + Sync {
    /// Whether the contour at `index` (0-based, discovery order) is kept.
    fn retains(&self, index: usize) -> bool;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Keep the second contour of every pair (odd indices).
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondOfPair;

impl ContourPairing for SecondOfPair {
    fn retains(&self, index: usize) -> bool {
        index % 2 == 1
    }

    fn name(&self) -> &'static str {
        "second-of-pair"
    }
}

/// Keep every contour.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryContour;

impl ContourPairing for EveryContour {
    fn retains(&self, _index: usize) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "every-contour"
    }
}
