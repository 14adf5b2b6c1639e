// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// findpip-segment: Finds the individual pictures inside a composite scan.
//
// Provides image loading and working-size scaling, contour filtering, corner
// extraction from simplified polygons, and perspective rectification back to
// the source resolution.

pub mod image;
pub mod segment;

// Re-export the primary types so callers can use `findpip_segment::SegmentationEngine` etc.
pub use crate::image::processor::ImageProcessor;
pub use segment::corners::CornerSet;
pub use segment::engine::{ExtractionRequest, SegmentationEngine, SegmentationReport};
pub use segment::pairing::{ContourPairing, EveryContour, SecondOfPair};
