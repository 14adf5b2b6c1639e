// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: load, scale to a working width, grayscale, and save.
// Operates on in-memory images using the `image` crate.

use std::path::Path;

use findpip_core::error::FindpipError;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage};
use tracing::{debug, info, instrument};

/// A decoded source image together with the format it was decoded from.
///
/// The format is kept so results can be written back in the same encoding
/// when the requested file extension is not one the `image` crate knows how
/// to write (e.g. `.jpe`).
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
    /// Encoding detected from the file contents, if any.
    format: Option<ImageFormat>,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path, guessing the format from its contents.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FindpipError> {
        let reader = ImageReader::open(path.as_ref())?.with_guessed_format()?;
        let format = reader.format();
        let image = reader.decode().map_err(|err| {
            FindpipError::Decode(format!("{}: {}", path.as_ref().display(), err))
        })?;
        info!(
            width = image.width(),
            height = image.height(),
            format = ?format,
            "Image loaded"
        );
        Ok(Self { image, format })
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encoding the image was decoded from.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Three-channel copy of the image. Alpha is dropped.
    pub fn to_rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }

    /// Single-channel intensity copy of the image.
    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    // -- Transformations ------------------------------------------------------

    /// Scale the image to exactly `width` pixels wide, preserving aspect ratio.
    ///
    /// Returns the scaled processor and the ratio `width / original_width`,
    /// needed later to map coordinates back to the source. Triangle filtering
    /// widens its support with the scale factor, so a downscale averages
    /// over the covered source area.
    #[instrument(skip(self))]
    pub fn scale_to_width(&self, width: u32) -> Result<(Self, f64), FindpipError> {
        if self.image.width() == 0 || width == 0 {
            return Err(FindpipError::Resize(format!(
                "cannot scale {}x{} to width {}",
                self.image.width(),
                self.image.height(),
                width
            )));
        }

        let ratio = width as f64 / self.image.width() as f64;
        let height = (self.image.height() as f64 * ratio) as u32;
        if height == 0 {
            return Err(FindpipError::Resize(format!(
                "original dimensions {}x{}, new dimensions {}x{}",
                self.image.width(),
                self.image.height(),
                width,
                height
            )));
        }

        let resized = self.image.resize_exact(width, height, FilterType::Triangle);
        debug!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            to_w = width,
            to_h = height,
            ratio,
            "Scaled to working size"
        );
        Ok((
            Self {
                image: resized,
                format: self.format,
            },
            ratio,
        ))
    }
}

// -- Output -------------------------------------------------------------------

/// Pick the encoding for `path`: its extension when the `image` crate can
/// write it, otherwise `fallback`.
pub fn output_format(path: &Path, fallback: Option<ImageFormat>) -> Option<ImageFormat> {
    ImageFormat::from_path(path)
        .ok()
        .filter(|format| format.writing_enabled())
        .or(fallback)
}

/// Write `image` to `path`, choosing the encoding with [`output_format`].
pub fn save_image(
    image: &DynamicImage,
    path: &Path,
    fallback: Option<ImageFormat>,
) -> Result<(), FindpipError> {
    let format = output_format(path, fallback).ok_or_else(|| {
        FindpipError::Save(format!("no encoder for destination file {}", path.display()))
    })?;
    image.save_with_format(path, format).map_err(|err| {
        FindpipError::Save(format!("destination file {}: {}", path.display(), err))
    })
}
