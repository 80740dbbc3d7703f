use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::point::Point;
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::models::config::{PreprocessingConfig, ThresholdMethod};
use crate::models::region::CropRegion;

/// Non-local-means filter strength
const NLM_H: f32 = 10.0;
/// Half-size of the 7x7 comparison patch
const NLM_TEMPLATE_RADIUS: usize = 3;
/// Half-size of the 21x21 search window
const NLM_SEARCH_RADIUS: usize = 10;
/// Weights below this contribute nothing
const NLM_WEIGHT_FLOOR: f32 = 0.001;

/// Neighbourhood of the adaptive threshold (11x11)
const ADAPTIVE_BLOCK_SIZE: usize = 11;
/// Subtracted from the local mean
const ADAPTIVE_C: i32 = 2;

/// Cubic convolution coefficient, same as common imaging libraries
const CUBIC_A: f32 = -0.75;

/// Image preprocessing pipeline for OCR input.
///
/// Stages run in a fixed order: grayscale, denoise, deskew, threshold. Every
/// stage after grayscale only touches single-channel images and silently
/// passes anything else through.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessingConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Load an image, failing with a decode error for unreadable files
    pub fn load(&self, path: &Path) -> Result<DynamicImage> {
        Ok(image::open(path)?)
    }

    /// Save an image, format chosen by extension
    pub fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        image.save(path)?;
        Ok(())
    }

    /// Full pipeline: load → grayscale → denoise → deskew → threshold
    pub fn preprocess(&self, path: &Path) -> Result<DynamicImage> {
        let image = self.load(path)?;
        Ok(self.apply(image))
    }

    /// Run the enabled stages over an already loaded image
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let config = &self.config;
        debug!(
            "Preprocessing: grayscale={}, denoise={}, deskew={}, threshold={} ({:?})",
            config.grayscale, config.denoise, config.deskew, config.threshold, config.threshold_method
        );

        let mut image = image;

        if config.grayscale {
            image = self.to_grayscale(&image);
        }

        if config.denoise && is_single_channel(&image) {
            image = DynamicImage::ImageLuma8(self.denoise(&image.to_luma8()));
        }

        if config.deskew && is_single_channel(&image) {
            image = DynamicImage::ImageLuma8(self.deskew(&image.to_luma8()));
        }

        if config.threshold && is_single_channel(&image) {
            image = DynamicImage::ImageLuma8(self.threshold(&image.to_luma8(), config.threshold_method));
        }

        image
    }

    /// Convert image to grayscale
    pub fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        if let DynamicImage::ImageLuma8(_) = image {
            return image.clone();
        }
        DynamicImage::ImageLuma8(image.to_luma8())
    }

    /// Crop with every coordinate clamped into the image.
    ///
    /// A request that clamps to zero area returns the input unchanged.
    pub fn crop(&self, image: &DynamicImage, region: &CropRegion) -> DynamicImage {
        let width = i64::from(image.width());
        let height = i64::from(image.height());

        let x = region.x.clamp(0, width);
        let y = region.y.clamp(0, height);
        let w = region.width.clamp(0, width - x);
        let h = region.height.clamp(0, height - y);

        if w == 0 || h == 0 {
            return image.clone();
        }

        image.crop_imm(x as u32, y as u32, w as u32, h as u32)
    }

    /// Apply binary thresholding
    pub fn threshold(&self, image: &GrayImage, method: ThresholdMethod) -> GrayImage {
        match method {
            ThresholdMethod::Otsu => otsu_threshold(image),
            ThresholdMethod::Adaptive => adaptive_threshold(image),
        }
    }

    /// Non-local-means denoising
    pub fn denoise(&self, image: &GrayImage) -> GrayImage {
        non_local_means(image)
    }

    /// Rotate the text block upright.
    ///
    /// Images without foreground pixels come back unchanged.
    pub fn deskew(&self, image: &GrayImage) -> GrayImage {
        match skew_angle(image) {
            Some(angle) => {
                debug!("Deskew: rotating by {:.2} degrees", angle);
                rotate_about_center(image, angle)
            }
            None => image.clone(),
        }
    }
}

fn is_single_channel(image: &DynamicImage) -> bool {
    image.color().channel_count() == 1
}

/// Global Otsu threshold: pixels above the level become white
fn otsu_threshold(image: &GrayImage) -> GrayImage {
    use imageproc::contrast::otsu_level;

    let threshold_value = otsu_level(image);

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > threshold_value {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Local threshold against the Gaussian-weighted mean of an 11x11 block minus 2.
///
/// Borders replicate the edge pixel.
fn adaptive_threshold(image: &GrayImage) -> GrayImage {
    use imageproc::filter::separable_filter_equal;

    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let mean: GrayImage = separable_filter_equal(image, &gaussian_kernel(ADAPTIVE_BLOCK_SIZE));

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let src = i32::from(image.get_pixel(x, y)[0]);
        let local = i32::from(mean.get_pixel(x, y)[0]);
        if src - local > -ADAPTIVE_C {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Normalized 1-D Gaussian kernel; sigma derived from the size
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let raw: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|v| v / sum).collect()
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge
fn reflect101(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Non-local means over a 21x21 search window with 7x7 patches.
///
/// Patch distances for one search offset at a time come from an integral
/// image of squared differences, so each offset costs O(pixels).
fn non_local_means(image: &GrayImage) -> GrayImage {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width == 0 || height == 0 {
        return image.clone();
    }

    let rt = NLM_TEMPLATE_RADIUS;
    let rs = NLM_SEARCH_RADIUS;
    let pad = rt + rs;
    let padded_w = width + 2 * pad;
    let padded_h = height + 2 * pad;

    let src = image.as_raw();
    let padded: Vec<f32> = (0..padded_h)
        .flat_map(|py| {
            let sy = reflect101(py as isize - pad as isize, height);
            (0..padded_w).map(move |px| {
                let sx = reflect101(px as isize - pad as isize, width);
                (sy, sx)
            })
        })
        .map(|(sy, sx)| f32::from(src[sy * width + sx]))
        .collect();

    // squared differences live on the image extended by the patch radius
    let ext_w = width + 2 * rt;
    let ext_h = height + 2 * rt;
    let patch_area = ((2 * rt + 1) * (2 * rt + 1)) as f64;
    let h2 = f64::from(NLM_H * NLM_H);

    let mut weighted_sum = vec![0f64; width * height];
    let mut weight_total = vec![0f64; width * height];
    let mut integral = vec![0f64; (ext_w + 1) * (ext_h + 1)];

    for dy in -(rs as isize)..=(rs as isize) {
        for dx in -(rs as isize)..=(rs as isize) {
            for ey in 0..ext_h {
                let mut row_sum = 0f64;
                for ex in 0..ext_w {
                    let base = (ey + rs) * padded_w + (ex + rs);
                    let shifted = ((ey + rs) as isize + dy) as usize * padded_w
                        + ((ex + rs) as isize + dx) as usize;
                    let diff = f64::from(padded[base] - padded[shifted]);
                    row_sum += diff * diff;
                    integral[(ey + 1) * (ext_w + 1) + ex + 1] =
                        integral[ey * (ext_w + 1) + ex + 1] + row_sum;
                }
            }

            let integral = &integral;
            let padded = &padded;
            weighted_sum
                .par_chunks_mut(width)
                .zip(weight_total.par_chunks_mut(width))
                .enumerate()
                .for_each(|(y, (sums, totals))| {
                    let top = y * (ext_w + 1);
                    let bottom = (y + 2 * rt + 1) * (ext_w + 1);
                    for x in 0..width {
                        let right = x + 2 * rt + 1;
                        let ssd = integral[bottom + right] - integral[top + right]
                            - integral[bottom + x]
                            + integral[top + x];

                        let weight = (-(ssd.max(0.0) / patch_area) / h2).exp();
                        if weight < f64::from(NLM_WEIGHT_FLOOR) {
                            continue;
                        }

                        let neighbour = padded[((y + pad) as isize + dy) as usize * padded_w
                            + ((x + pad) as isize + dx) as usize];
                        sums[x] += weight * f64::from(neighbour);
                        totals[x] += weight;
                    }
                });
        }
    }

    let denoised: Vec<u8> = weighted_sum
        .iter()
        .zip(&weight_total)
        .zip(src)
        .map(|((sum, total), original)| {
            if *total > 0.0 {
                (sum / total).round().clamp(0.0, 255.0) as u8
            } else {
                *original
            }
        })
        .collect();

    GrayImage::from_raw(image.width(), image.height(), denoised).unwrap_or_else(|| image.clone())
}

/// Rotation (degrees, counter-clockwise positive) that straightens the text
/// block, or `None` when there is no foreground.
///
/// Foreground pixels are taken as (row, column) pairs; the minimum-area
/// rectangle angle is reported in [-90, 0) and folded into (-45, 45].
pub(crate) fn skew_angle(image: &GrayImage) -> Option<f64> {
    let coords: Vec<Point<i64>> = image
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel[0] > 0)
        .map(|(x, y, _)| Point::new(i64::from(y), i64::from(x)))
        .collect();

    if coords.is_empty() {
        return None;
    }

    let angle = min_area_rect_angle(&coords);
    Some(if angle < -45.0 { -(90.0 + angle) } else { -angle })
}

/// Angle of the minimum-area bounding rectangle, in [-90, 0)
fn min_area_rect_angle(points: &[Point<i64>]) -> f64 {
    use imageproc::geometry::min_area_rect;

    let corners = min_area_rect(points);
    let edge = |a: Point<i64>, b: Point<i64>| ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let first = edge(corners[0], corners[1]);
    let second = edge(corners[1], corners[2]);

    // corners are whole pixels, the longer side gives the finer angle
    let (ex, ey) = if first.0.hypot(first.1) >= second.0.hypot(second.1) {
        first
    } else {
        second
    };

    // rectangle orientation is only defined modulo 90 degrees
    ey.atan2(ex).to_degrees().rem_euclid(90.0) - 90.0
}

fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let w2 = ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}

/// Rotate about the image center (integer-halved) by `angle` degrees,
/// counter-clockwise on screen, bicubic sampling with replicated edges.
fn rotate_about_center(image: &GrayImage, angle: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let cx = f64::from(width / 2);
    let cy = f64::from(height / 2);
    let (sin, cos) = angle.to_radians().sin_cos();
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;

        let x0 = sx.floor();
        let y0 = sy.floor();
        let wx = cubic_weights((sx - x0) as f32);
        let wy = cubic_weights((sy - y0) as f32);

        let mut value = 0f32;
        for (j, weight_y) in wy.iter().enumerate() {
            let py = (y0 as i64 - 1 + j as i64).clamp(0, max_y) as u32;
            for (i, weight_x) in wx.iter().enumerate() {
                let px = (x0 as i64 - 1 + i as i64).clamp(0, max_x) as u32;
                value += weight_x * weight_y * f32::from(image.get_pixel(px, py)[0]);
            }
        }

        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}
