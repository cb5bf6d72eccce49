//! Canvas cleanup before OCR: flatten, binarise, crop to the handwriting,
//! pad and rescale.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use thiserror::Error;

/// Components smaller than this share of the largest one are treated as specks.
const KEEP_COMPONENT_RATIO: f64 = 0.15;
const MARGIN_RATIO: f64 = 0.1;
const MIN_MARGIN: u32 = 8;
const INK: u8 = 0;
const PAPER: u8 = 255;

#[derive(Debug, Error)]
pub(crate) enum PreprocessError {
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Bounds {
    fn single(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn merge(&mut self, other: Bounds) {
        self.include(other.min_x, other.min_y);
        self.include(other.max_x, other.max_y);
    }

    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Returns PNG bytes ready for OCR. A canvas without any ink is returned
/// unchanged.
pub(crate) fn prepare_canvas(bytes: &[u8], target_size: u32) -> Result<Vec<u8>, PreprocessError> {
    let decoded = image::load_from_memory(bytes)?;
    let gray = flatten_to_gray(&decoded);
    let ink = ink_mask(&gray);

    let Some(bounds) = handwriting_bounds(&ink, gray.width(), gray.height()) else {
        tracing::debug!("canvas has no ink, skipping preprocessing");
        return Ok(bytes.to_vec());
    };

    let cropped = GrayImage::from_fn(bounds.width(), bounds.height(), |x, y| {
        let index = ((bounds.min_y + y) * gray.width() + bounds.min_x + x) as usize;
        Luma([if ink[index] { INK } else { PAPER }])
    });

    let longest_side = cropped.width().max(cropped.height());
    let margin = MIN_MARGIN.max((f64::from(longest_side) * MARGIN_RATIO) as u32);
    let mut padded = GrayImage::from_pixel(
        cropped.width() + margin * 2,
        cropped.height() + margin * 2,
        Luma([PAPER]),
    );
    imageops::replace(&mut padded, &cropped, i64::from(margin), i64::from(margin));

    let longest = padded.width().max(padded.height()) as f64;
    let scale = f64::from(target_size) / longest;
    let width = ((f64::from(padded.width()) * scale).round() as u32).max(1);
    let height = ((f64::from(padded.height()) * scale).round() as u32).max(1);
    let resized = imageops::resize(&padded, width, height, FilterType::Triangle);

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(resized).write_to(&mut encoded, ImageFormat::Png)?;
    Ok(encoded.into_inner())
}

/// Composite onto white paper and convert to luma.
fn flatten_to_gray(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        let alpha = f64::from(a) / 255.0;
        Luma([(luma * alpha + 255.0 * (1.0 - alpha)).round() as u8])
    })
}

/// Otsu threshold over the luma histogram.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.pixels().len() as f64;
    let weighted_sum: f64 =
        histogram.iter().enumerate().map(|(value, count)| value as f64 * *count as f64).sum();

    let mut background_weight = 0.0;
    let mut background_sum = 0.0;
    let mut best_threshold = 0u8;
    let mut best_variance = 0.0;

    for (value, count) in histogram.iter().enumerate() {
        background_weight += *count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }
        background_sum += value as f64 * *count as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_sum - background_sum) / foreground_weight;
        let variance =
            background_weight * foreground_weight * (background_mean - foreground_mean).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }
    best_threshold
}

/// True where a pixel is ink. Ink is the minority class, so light strokes on
/// a dark canvas work as well as dark strokes on paper.
fn ink_mask(gray: &GrayImage) -> Vec<bool> {
    let threshold = otsu_threshold(gray);
    let mut mask: Vec<bool> = gray.pixels().map(|pixel| pixel.0[0] <= threshold).collect();

    let first = gray.pixels().next().map(|pixel| pixel.0[0]);
    let all_same = gray.pixels().all(|pixel| Some(pixel.0[0]) == first);
    if all_same {
        mask.iter_mut().for_each(|value| *value = false);
        return mask;
    }

    let ink_pixels = mask.iter().filter(|value| **value).count();
    if ink_pixels * 2 > mask.len() {
        mask.iter_mut().for_each(|value| *value = !*value);
    }
    mask
}

/// Bounding box of the largest 8-connected ink component together with every
/// component at least `KEEP_COMPONENT_RATIO` of its area.
fn handwriting_bounds(mask: &[bool], width: u32, height: u32) -> Option<Bounds> {
    let mut visited = vec![false; mask.len()];
    let mut components: Vec<(usize, Bounds)> = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let (x, y) = ((start as u32) % width, (start as u32) / width);
        let mut bounds = Bounds::single(x, y);
        let mut area = 0usize;

        while let Some(index) = stack.pop() {
            area += 1;
            let (x, y) = ((index as u32) % width, (index as u32) / width);
            bounds.include(x, y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let (nx, ny) = (i64::from(x) + dx, i64::from(y) + dy);
                    if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                        continue;
                    }
                    let neighbour = (ny as usize) * width as usize + nx as usize;
                    if mask[neighbour] && !visited[neighbour] {
                        visited[neighbour] = true;
                        stack.push(neighbour);
                    }
                }
            }
        }
        components.push((area, bounds));
    }

    let largest = components.iter().map(|(area, _)| *area).max()?;
    let minimum = (largest as f64 * KEEP_COMPONENT_RATIO).ceil() as usize;

    components.into_iter().filter(|(area, _)| *area >= minimum).map(|(_, bounds)| bounds).reduce(
        |mut merged, bounds| {
            merged.merge(bounds);
            merged
        },
    )
}
