// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation engine: finds each picture in a composite scan and writes it
// out perspective-corrected at source resolution.

use std::path::{Path, PathBuf};

use findpip_core::config::DEFAULT_WORKING_WIDTH;
use findpip_core::error::FindpipError;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use imageproc::contours::{Contour, find_contours};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::{debug, info, instrument, warn};

use crate::image::processor::{ImageProcessor, save_image};
use crate::segment::corners::{CornerSet, MIN_VERTICES, rectify, unscale_length};
use crate::segment::pairing::{ContourPairing, SecondOfPair};

/// Gaussian sigma equivalent to an 11x11 kernel with automatic sigma.
const BLUR_SIGMA: f32 = 2.0;

/// Canny hysteresis thresholds.
const CANNY_LOW: f32 = 100.0;
const CANNY_HIGH: f32 = 200.0;

/// Polygon simplification tolerance as a fraction of the contour perimeter.
const SIMPLIFY_TOLERANCE: f64 = 0.02;

/// Inputs for one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Locally stored source image.
    pub source: &'a Path,
    /// Directory the extracted images are written to.
    pub output_dir: &'a Path,
    /// File stem used for every artifact name.
    pub stem: &'a str,
    /// Extension used for every artifact name.
    pub extension: &'a str,
    /// Keep color in the extracted images.
    pub return_color: bool,
    /// Also write the working intensity image as `<stem>_grayscale.<ext>`.
    pub save_grayscale: bool,
}

impl ExtractionRequest<'_> {
    /// Path of the extracted image for the contour at `index`.
    pub fn result_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_result_{}.{}", self.stem, index, self.extension))
    }

    /// Path of the intensity debug image.
    pub fn grayscale_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_grayscale.{}", self.stem, self.extension))
    }
}

/// What an extraction run produced.
#[derive(Debug, Clone, Default)]
pub struct SegmentationReport {
    /// Number of contours found in the edge map.
    pub contour_count: usize,
    /// Working width divided by source width.
    pub ratio: f64,
    /// The intensity debug image, when requested.
    pub grayscale: Option<PathBuf>,
    /// Extracted images, in contour order.
    pub saved: Vec<PathBuf>,
    /// Retained contours that were skipped for having no area.
    pub skipped: Vec<usize>,
}

/// Contour-based picture extraction.
pub struct SegmentationEngine {
    working_width: u32,
    pairing: Box<dyn ContourPairing>,
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WORKING_WIDTH)
    }
}

impl SegmentationEngine {
    /// Create an engine that scales sources to `working_width` before
    /// detection and keeps the second contour of each pair.
    pub fn new(working_width: u32) -> Self {
        Self {
            working_width,
            pairing: Box::new(SecondOfPair),
        }
    }

    /// Replace the contour pairing policy.
    pub fn with_pairing(mut self, pairing: impl ContourPairing + 'static) -> Self {
        self.pairing = Box::new(pairing);
        self
    }

    // -- Pipeline -------------------------------------------------------------

    /// Run the full pipeline:
    ///
    /// 1. Load the source and scale it to the working width
    /// 2. Convert to intensity (optionally saved for debugging)
    /// 3. Blur, detect edges, trace contours
    /// 4. Rectify every retained contour from the full-resolution source
    ///
    /// A report with no saved images is a successful run; the caller decides
    /// how to tell the client.
    #[instrument(skip_all, fields(source = %request.source.display(), pairing = self.pairing.name()))]
    pub fn extract(&self, request: &ExtractionRequest<'_>) -> Result<SegmentationReport, FindpipError> {
        let source = ImageProcessor::open(request.source)?;
        let (working, ratio) = source.scale_to_width(self.working_width)?;
        let gray = working.to_luma();
        drop(working);

        let grayscale = if request.save_grayscale {
            let path = request.grayscale_path();
            save_image(&DynamicImage::ImageLuma8(gray.clone()), &path, source.format())?;
            debug!(path = %path.display(), "Grayscale image created");
            Some(path)
        } else {
            None
        };

        let contours = self.detect_contours(&gray);
        if contours.is_empty() {
            warn!("No contours found");
            return Err(FindpipError::NoContours);
        }
        info!(contours = contours.len(), "Contours detected");

        let mut report = SegmentationReport {
            contour_count: contours.len(),
            ratio,
            grayscale,
            ..SegmentationReport::default()
        };

        let full = source.to_rgb();
        self.rectify_contours(
            &full,
            source.format(),
            ratio,
            contours.iter().map(|c| c.points.as_slice()),
            request,
            &mut report,
        )?;

        info!(
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            "Extraction complete"
        );
        Ok(report)
    }

    /// Blur, run Canny, and trace every contour of the edge map.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn detect_contours(&self, gray: &GrayImage) -> Vec<Contour<i32>> {
        let blurred = gaussian_blur_f32(gray, BLUR_SIGMA);
        let edges = canny(&blurred, CANNY_LOW, CANNY_HIGH);
        find_contours::<i32>(&edges)
    }

    /// Rectify the retained contours (given in working coordinates) from the
    /// full-resolution `source`, appending results to `report`.
    ///
    /// A retained contour whose polygon has fewer than four vertices aborts the
    /// whole run; one whose rectified size is zero is skipped.
    pub fn rectify_contours<'c>(
        &self,
        source: &RgbImage,
        format: Option<ImageFormat>,
        ratio: f64,
        contours: impl IntoIterator<Item = &'c [Point<i32>]>,
        request: &ExtractionRequest<'_>,
        report: &mut SegmentationReport,
    ) -> Result<(), FindpipError> {
        for (index, points) in contours.into_iter().enumerate() {
            if !self.pairing.retains(index) {
                continue;
            }

            let corners = simplify_to_corners(points, index)?;
            let (width, height) = corners.rectified_size();
            if width == 0 || height == 0 {
                debug!(index, width, height, "Contour too small to process");
                report.skipped.push(index);
                continue;
            }

            let scaled = corners.unscale(ratio);
            let (out_w, out_h) = (unscale_length(width, ratio), unscale_length(height, ratio));
            let Some(warped) = rectify(source, &scaled, out_w, out_h) else {
                warn!(index, corners = ?scaled, "Degenerate quadrilateral; skipping contour");
                report.skipped.push(index);
                continue;
            };

            let image = if request.return_color {
                DynamicImage::ImageRgb8(warped)
            } else {
                DynamicImage::ImageLuma8(image::imageops::grayscale(&warped))
            };

            let path = request.result_path(index);
            save_image(&image, &path, format)?;
            debug!(index, out_w, out_h, path = %path.display(), "Extracted image saved");
            report.saved.push(path);
        }
        Ok(())
    }
}

/// Simplify a contour to a polygon and pick its corners.
fn simplify_to_corners(points: &[Point<i32>], index: usize) -> Result<CornerSet, FindpipError> {
    if points.len() < MIN_VERTICES {
        return Err(FindpipError::CornerUnderflow {
            contour: index,
            vertices: points.len(),
        });
    }

    let perimeter = arc_length(points, true);
    if perimeter <= 0.0 {
        // Every point coincides; the polygon collapses to one vertex.
        return Err(FindpipError::CornerUnderflow {
            contour: index,
            vertices: 1,
        });
    }

    let polygon = approximate_polygon_dp(points, SIMPLIFY_TOLERANCE * perimeter, true);
    debug!(index, perimeter, vertices = polygon.len(), "Contour simplified");
    CornerSet::from_polygon(&polygon, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::pairing::EveryContour;
    use image::{Luma, Rgb};

    /// Boundary of an axis-aligned rectangle, traced clockwise from the top-left.
    fn rectangle_contour(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Point<i32>> {
        let mut points = Vec::new();
        for x in x0..x1 {
            points.push(Point::new(x, y0));
        }
        for y in y0..y1 {
            points.push(Point::new(x1, y));
        }
        for x in (x0 + 1..=x1).rev() {
            points.push(Point::new(x, y1));
        }
        for y in (y0 + 1..=y1).rev() {
            points.push(Point::new(x0, y));
        }
        points
    }

    fn request<'a>(source: &'a Path, dir: &'a Path) -> ExtractionRequest<'a> {
        ExtractionRequest {
            source,
            output_dir: dir,
            stem: "scan",
            extension: "png",
            return_color: false,
            save_grayscale: true,
        }
    }

    #[test]
    fn blank_image_has_no_contours() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("srcimage_scan.png");
        GrayImage::from_pixel(640, 480, Luma([180u8])).save(&source).unwrap();

        let engine = SegmentationEngine::default();
        let result = engine.extract(&request(&source, dir.path()));

        assert!(matches!(result, Err(FindpipError::NoContours)));
        // The debug image is written before detection runs.
        assert!(dir.path().join("scan_grayscale.png").exists());
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nope.png");
        let result = SegmentationEngine::default().extract(&request(&source, dir.path()));
        assert!(matches!(result, Err(FindpipError::Io(_))));
    }

    #[test]
    fn only_odd_contours_are_materialized() {
        let dir = tempfile::tempdir().unwrap();
        let source = RgbImage::from_pixel(1000, 800, Rgb([200, 120, 40]));
        let outline = rectangle_contour(50, 40, 150, 120);
        let contours = [outline.as_slice(), outline.as_slice()];

        let engine = SegmentationEngine::new(500);
        let fake_source = dir.path().join("unused.png");
        let req = request(&fake_source, dir.path());
        let mut report = SegmentationReport::default();
        engine
            .rectify_contours(&source, None, 0.5, contours, &req, &mut report)
            .unwrap();

        assert_eq!(report.saved, vec![dir.path().join("scan_result_1.png")]);
        assert!(!dir.path().join("scan_result_0.png").exists());

        // 100x80 in working space, 200x160 at source resolution.
        let saved = ImageProcessor::open(&report.saved[0]).unwrap();
        assert_eq!((saved.width(), saved.height()), (200, 160));
    }

    #[test]
    fn color_output_keeps_channels() {
        let dir = tempfile::tempdir().unwrap();
        let source = RgbImage::from_pixel(500, 400, Rgb([200, 120, 40]));
        let outline = rectangle_contour(10, 10, 60, 50);

        let engine = SegmentationEngine::new(500).with_pairing(EveryContour);
        let fake_source = dir.path().join("unused.png");
        let mut req = request(&fake_source, dir.path());
        req.return_color = true;
        let mut report = SegmentationReport::default();
        engine
            .rectify_contours(&source, None, 1.0, [outline.as_slice()], &req, &mut report)
            .unwrap();

        let saved = image::open(&report.saved[0]).unwrap();
        assert_eq!(saved.color(), image::ColorType::Rgb8);
        assert_eq!(saved.to_rgb8().get_pixel(5, 5), &Rgb([200, 120, 40]));
    }

    #[test]
    fn collapsed_contour_underflows() {
        let dir = tempfile::tempdir().unwrap();
        let source = RgbImage::new(100, 100);
        // Four points but only two distinct positions.
        let mut collapsed = vec![Point::new(5, 5); 3];
        collapsed.push(Point::new(5, 6));

        let engine = SegmentationEngine::new(500).with_pairing(EveryContour);
        let fake_source = dir.path().join("unused.png");
        let req = request(&fake_source, dir.path());
        let mut report = SegmentationReport::default();
        let result = engine.rectify_contours(&source, None, 1.0, [collapsed.as_slice()], &req, &mut report);

        assert!(matches!(result, Err(FindpipError::CornerUnderflow { contour: 0, .. })));
    }

    #[test]
    fn short_contour_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = RgbImage::new(100, 100);
        let good = rectangle_contour(10, 10, 60, 50);
        let short = [Point::new(1, 1), Point::new(2, 2)];

        let engine = SegmentationEngine::new(500).with_pairing(EveryContour);
        let fake_source = dir.path().join("unused.png");
        let req = request(&fake_source, dir.path());
        let mut report = SegmentationReport::default();
        let result = engine.rectify_contours(
            &source,
            None,
            1.0,
            [good.as_slice(), &short[..]],
            &req,
            &mut report,
        );

        assert!(matches!(
            result,
            Err(FindpipError::CornerUnderflow {
                contour: 1,
                vertices: 2
            })
        ));
        // Work done before the failing contour stays on disk.
        assert_eq!(report.saved.len(), 1);
    }

    /// A 960x720 bright card on a 1600x1200 dark bed.
    #[test]
    fn synthetic_card_is_extracted_at_source_size() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("srcimage_card.png");
        let img = RgbImage::from_fn(1600, 1200, |x, y| {
            if (320..1280).contains(&x) && (240..960).contains(&y) {
                Rgb([230, 220, 200])
            } else {
                Rgb([30, 30, 30])
            }
        });
        img.save(&source).unwrap();

        let report = SegmentationEngine::default()
            .extract(&request(&source, dir.path()))
            .unwrap();

        assert!(report.contour_count > 0);
        assert!((report.ratio - 0.3125).abs() < 1e-9);
        assert_eq!(report.saved, vec![dir.path().join("scan_result_1.png")]);
        assert_eq!(report.grayscale, Some(dir.path().join("scan_grayscale.png")));

        let saved = ImageProcessor::open(&report.saved[0]).unwrap();
        assert!(saved.width().abs_diff(960) <= 40, "width {}", saved.width());
        assert!(saved.height().abs_diff(720) <= 40, "height {}", saved.height());
    }
}
