// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation pipeline: contour pairing, corner extraction, and
// perspective rectification.

pub mod corners;
pub mod engine;
pub mod pairing;

pub use corners::CornerSet;
pub use engine::SegmentationEngine;
pub use pairing::ContourPairing;
