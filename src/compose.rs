//! Image composition
//!
//! Flattens the trait images of a token into one raster. The first image
//! sets the canvas size; each following image is alpha-blended centred.

use std::path::PathBuf;

use image::{imageops, RgbaImage};

use crate::error::{GenError, Result};

/// Flattens an ordered list of source images
pub trait Compositor: Send + Sync {
    /// Compose `sources` bottom to top. `sources` is never empty.
    fn compose(&self, sources: &[PathBuf]) -> Result<RgbaImage>;
}

/// Centred alpha overlay of PNG layers
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayCompositor;

impl OverlayCompositor {
    pub fn new() -> Self {
        Self
    }
}

impl Compositor for OverlayCompositor {
    fn compose(&self, sources: &[PathBuf]) -> Result<RgbaImage> {
        let mut canvas: Option<RgbaImage> = None;

        for path in sources {
            let layer = image::open(path)
                .map_err(|e| GenError::Composite {
                    path: path.clone(),
                    source: e,
                })?
                .to_rgba8();

            match canvas.as_mut() {
                None => canvas = Some(layer),
                Some(base) => overlay_center(base, &layer),
            }
        }

        canvas.ok_or_else(|| GenError::Internal("no source images to compose".to_string()))
    }
}

/// Alpha-blend `top` onto the centre of `base`, clipping overhang.
pub fn overlay_center(base: &mut RgbaImage, top: &RgbaImage) {
    let x = base.width() as i64 / 2 - top.width() as i64 / 2;
    let y = base.height() as i64 / 2 - top.height() as i64 / 2;
    imageops::overlay(base, top, x, y);
}
