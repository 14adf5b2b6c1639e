// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner extraction and rectification math.

use findpip_core::error::FindpipError;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::point::Point;

/// Minimum number of polygon vertices needed to pick four corners.
pub const MIN_VERTICES: usize = 4;

/// The four extremal corners of a simplified contour polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerSet {
    pub top_left: Point<i32>,
    pub top_right: Point<i32>,
    pub bottom_left: Point<i32>,
    pub bottom_right: Point<i32>,
}

impl CornerSet {
    /// Pick the corners of `polygon` by the extremal sum/difference rule:
    ///
    /// | corner        | rule          |
    /// |---------------|---------------|
    /// | top-left      | minimal x + y |
    /// | top-right     | minimal y - x |
    /// | bottom-left   | maximal y - x |
    /// | bottom-right  | maximal x + y |
    ///
    /// Ties fall back to the (x, y) order of the candidates, so the result
    /// does not depend on the order the vertices are listed in.
    ///
    /// `contour` is only used to label the error when the polygon has fewer
    /// than [`MIN_VERTICES`] vertices.
    pub fn from_polygon(polygon: &[Point<i32>], contour: usize) -> Result<Self, FindpipError> {
        if polygon.len() < MIN_VERTICES {
            return Err(FindpipError::CornerUnderflow {
                contour,
                vertices: polygon.len(),
            });
        }

        let sum = |p: &&Point<i32>| (p.x + p.y, p.x, p.y);
        let diff = |p: &&Point<i32>| (p.y - p.x, p.x, p.y);

        // The length check above guarantees every extremum exists.
        let pick = |found: Option<&Point<i32>>| {
            found.copied().ok_or(FindpipError::CornerUnderflow {
                contour,
                vertices: polygon.len(),
            })
        };

        Ok(Self {
            top_left: pick(polygon.iter().min_by_key(sum))?,
            top_right: pick(polygon.iter().min_by_key(diff))?,
            bottom_left: pick(polygon.iter().max_by_key(diff))?,
            bottom_right: pick(polygon.iter().max_by_key(sum))?,
        })
    }

    /// Width and height of the upright rectangle the corners rectify to: the
    /// longer of each pair of opposite sides, truncated to whole pixels.
    /// The float-to-int cast saturates, so a NaN length comes out as 0 and
    /// the contour is skipped as too small.
    pub fn rectified_size(&self) -> (u32, u32) {
        let width = distance(self.top_left, self.top_right)
            .max(distance(self.bottom_left, self.bottom_right));
        let height = distance(self.top_left, self.bottom_left)
            .max(distance(self.top_right, self.bottom_right));
        (width as u32, height as u32)
    }

    /// Map the corners from working coordinates back to the source image,
    /// given the working `ratio` (working width / source width).
    pub fn unscale(&self, ratio: f64) -> Self {
        let map = |p: Point<i32>| {
            Point::new(
                (p.x as f64 / ratio).floor() as i32,
                (p.y as f64 / ratio).floor() as i32,
            )
        };
        Self {
            top_left: map(self.top_left),
            top_right: map(self.top_right),
            bottom_left: map(self.bottom_left),
            bottom_right: map(self.bottom_right),
        }
    }

    /// Corners as projection control points, ordered tl, tr, bl, br.
    pub fn control_points(&self) -> [(f32, f32); 4] {
        let f = |p: Point<i32>| (p.x as f32, p.y as f32);
        [
            f(self.top_left),
            f(self.top_right),
            f(self.bottom_left),
            f(self.bottom_right),
        ]
    }
}

/// Scale a rectified dimension from working to source resolution.
///
/// Negative or NaN results saturate to 0.
pub fn unscale_length(length: u32, ratio: f64) -> u32 {
    (length as f64 / ratio) as u32
}

/// Warp the quadrilateral `corners` of `source` onto an upright
/// `width` x `height` image.
///
/// Returns `None` for an empty target or when the corners are degenerate
/// (three or more collinear) and no projection exists.
pub fn rectify(source: &RgbImage, corners: &CornerSet, width: u32, height: u32) -> Option<RgbImage> {
    if width == 0 || height == 0 {
        return None;
    }

    let (w, h) = (width as f32, height as f32);
    let dest = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
    let projection = Projection::from_control_points(corners.control_points(), dest)?;

    let mut output = RgbImage::new(width, height);
    warp_into(
        source,
        &projection,
        Interpolation::Bilinear,
        Rgb([0u8, 0, 0]),
        &mut output,
    );
    Some(output)
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<Point<i32>> {
        vec![
            Point::new(12, 8),
            Point::new(95, 14),
            Point::new(90, 70),
            Point::new(6, 64),
        ]
    }

    #[test]
    fn corners_follow_extremal_rule() {
        let corners = CornerSet::from_polygon(&quad(), 1).unwrap();
        assert_eq!(corners.top_left, Point::new(12, 8));
        assert_eq!(corners.top_right, Point::new(95, 14));
        assert_eq!(corners.bottom_left, Point::new(6, 64));
        assert_eq!(corners.bottom_right, Point::new(90, 70));
    }

    #[test]
    fn corners_are_invariant_under_vertex_permutation() {
        let base = quad();
        let expected = CornerSet::from_polygon(&base, 1).unwrap();

        // Every rotation and its reversal, plus a few arbitrary shuffles.
        let mut orders: Vec<Vec<Point<i32>>> = Vec::new();
        for shift in 0..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            let mut reversed = rotated.clone();
            reversed.reverse();
            orders.push(rotated);
            orders.push(reversed);
        }
        orders.push(vec![base[2], base[0], base[3], base[1]]);
        orders.push(vec![base[1], base[3], base[0], base[2]]);

        for order in orders {
            assert_eq!(CornerSet::from_polygon(&order, 1).unwrap(), expected);
        }
    }

    #[test]
    fn tied_candidates_resolve_the_same_way_in_any_order() {
        // (0, 10) and (10, 0) tie on x + y; (0, 0) and (10, 10) tie on y - x.
        let a = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(5, 5),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(
            CornerSet::from_polygon(&a, 0).unwrap(),
            CornerSet::from_polygon(&b, 0).unwrap()
        );
    }

    #[test]
    fn fewer_than_four_vertices_underflow() {
        let triangle = [Point::new(0, 0), Point::new(5, 0), Point::new(0, 5)];
        let err = CornerSet::from_polygon(&triangle, 3).unwrap_err();
        assert!(matches!(
            err,
            FindpipError::CornerUnderflow {
                contour: 3,
                vertices: 3
            }
        ));
    }

    #[test]
    fn rectified_size_uses_longer_sides() {
        let corners = CornerSet::from_polygon(&quad(), 1).unwrap();
        let (w, h) = corners.rectified_size();
        // top: (12,8)-(95,14) = 83.2, bottom: (6,64)-(90,70) = 84.2
        assert_eq!(w, 84);
        // left: (12,8)-(6,64) = 56.3, right: (95,14)-(90,70) = 56.2
        assert_eq!(h, 56);
    }

    #[test]
    fn degenerate_polygon_has_zero_size() {
        let line = [
            Point::new(3, 3),
            Point::new(3, 3),
            Point::new(3, 3),
            Point::new(3, 3),
        ];
        let corners = CornerSet::from_polygon(&line, 1).unwrap();
        assert_eq!(corners.rectified_size(), (0, 0));
    }

    #[test]
    fn unscale_floors_coordinates() {
        let corners = CornerSet::from_polygon(&quad(), 1).unwrap();
        let scaled = corners.unscale(0.3);
        // 12 / 0.3 = 40, 95 / 0.3 = 316.67, 6 / 0.3 = 20, 70 / 0.3 = 233.33
        assert_eq!(scaled.top_left, Point::new(40, 26));
        assert_eq!(scaled.top_right.x, 316);
        assert_eq!(scaled.bottom_left.x, 20);
        assert_eq!(scaled.bottom_right.y, 233);
        assert_eq!(unscale_length(84, 0.5), 168);
    }

    #[test]
    fn unscale_length_saturates_to_zero() {
        assert_eq!(unscale_length(84, -0.5), 0);
        assert_eq!(unscale_length(84, f64::NAN), 0);
        assert_eq!(unscale_length(0, 0.0), 0);
    }

    #[test]
    fn axis_aligned_rectangle_rectifies_to_source_crop() {
        let source = RgbImage::from_fn(60, 40, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 77]));
        let rect = [
            Point::new(40, 25),
            Point::new(10, 25),
            Point::new(10, 5),
            Point::new(40, 5),
        ];
        let corners = CornerSet::from_polygon(&rect, 1).unwrap();
        let (w, h) = corners.rectified_size();
        assert_eq!((w, h), (30, 20));

        let out = rectify(&source, &corners, w, h).unwrap();
        assert_eq!(out.dimensions(), (30, 20));

        for y in 0..h {
            for x in 0..w {
                let got = out.get_pixel(x, y);
                let want = source.get_pixel(x + 10, y + 5);
                for c in 0..3 {
                    let delta = (got.0[c] as i32 - want.0[c] as i32).abs();
                    assert!(delta <= 1, "pixel ({x},{y}) channel {c}: {got:?} vs {want:?}");
                }
            }
        }
    }

    #[test]
    fn rectify_rejects_empty_target() {
        let source = RgbImage::new(10, 10);
        let corners = CornerSet::from_polygon(&quad(), 1).unwrap();
        assert!(rectify(&source, &corners, 0, 5).is_none());
    }
}
