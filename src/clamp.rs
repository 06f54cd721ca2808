//! Page size clamping: splitting or shrinking pages that exceed a pixel budget.
//!
//! Long-strip scans routinely arrive as single images tens of thousands of
//! pixels tall, which breaks readers with texture-size limits. The two
//! strategies here enforce a maximum pixel area per page: [`ClampStrategy::Split`]
//! cuts oversized pages in half vertically until every piece fits (lossless,
//! changes page count), [`ClampStrategy::Resize`] scales each oversized page
//! down proportionally (lossy, keeps page count).
//!
//! Both transforms are pure; threshold validation happens in the
//! configuration preflight, not here.

use image::GenericImageView;
use image::imageops::FilterType;
use rayon::prelude::*;

use crate::types::PageImage;

/// Hard floor for the clamp threshold; anything at or below this is rejected.
pub const MIN_PIXEL_THRESHOLD: u64 = 500_000;
/// Default maximum pixel area (`width * height`) per output page.
pub const DEFAULT_SIZE_THRESHOLD: u64 = 5_000_000;
/// Quality used when re-encoding transformed pages as JPEG.
pub const OUTPUT_JPEG_QUALITY: u8 = 85;

/// How pages over the pixel budget are brought under it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClampStrategy {
    /// Halve oversized pages vertically until every piece is under budget.
    #[default]
    Split,
    /// Scale oversized pages down by `sqrt(threshold / area)`.
    Resize,
}

/// Applies the selected strategy to every page, in parallel.
/// Output order matches input order; `Split` may grow the page count.
pub fn clamp_pages(pages: Vec<PageImage>, threshold: u64, strategy: ClampStrategy) -> Vec<PageImage> {
    match strategy {
        ClampStrategy::Split => pages
            .into_par_iter()
            .flat_map(|page| split_page(page, threshold))
            .collect(),
        ClampStrategy::Resize => pages
            .into_par_iter()
            .map(|page| resize_page(page, threshold))
            .collect(),
    }
}

/// Splits one page at half height until every piece has area below
/// `threshold`, preserving top-to-bottom reading order.
///
/// Pages already below the threshold come back as a single unchanged piece,
/// which makes the transform idempotent on its own output. A piece that still
/// meets the threshold but is under 2 pixels tall cannot be halved and is
/// emitted as-is.
pub fn split_page(page: PageImage, threshold: u64) -> Vec<PageImage> {
    let PageImage { image, origin } = page;

    let mut stack = vec![image];
    let mut pieces = Vec::new();

    while let Some(image) = stack.pop() {
        let (width, height) = image.dimensions();
        let area = u64::from(width) * u64::from(height);
        if area < threshold || height < 2 {
            pieces.push(image);
            continue;
        }

        let middle = height / 2;
        let top = image.crop_imm(0, 0, width, middle);
        let bottom = image.crop_imm(0, middle, width, height - middle);
        // LIFO: the top half must pop (and emit) before the bottom half.
        stack.push(bottom);
        stack.push(top);
    }

    pieces
        .into_iter()
        .map(|image| PageImage::new(image, origin.clone()))
        .collect()
}

/// Scales one page down so its area fits the threshold, flooring each
/// dimension but never below 1 pixel. Pages at or below the threshold are
/// returned unchanged.
pub fn resize_page(page: PageImage, threshold: u64) -> PageImage {
    let area = page.area();
    if area <= threshold {
        return page;
    }

    let scale = (threshold as f64 / area as f64).sqrt();
    let width = ((f64::from(page.width()) * scale).floor() as u32).max(1);
    let height = ((f64::from(page.height()) * scale).floor() as u32).max(1);

    let resized = page.image.resize_exact(width, height, FilterType::Lanczos3);
    PageImage::new(resized, page.origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn page(width: u32, height: u32, origin: &str) -> PageImage {
        // Encode the row index in the red channel so piece order is checkable.
        let image = RgbImage::from_fn(width, height, |_, y| image::Rgb([(y % 256) as u8, 0, 0]));
        PageImage::new(DynamicImage::ImageRgb8(image), origin)
    }

    #[test]
    fn split_keeps_small_pages_untouched() {
        let pieces = split_page(page(100, 40, "a"), 10_000);
        assert_eq!(pieces.len(), 1);
        assert_eq!((pieces[0].width(), pieces[0].height()), (100, 40));
    }

    #[test]
    fn split_halves_until_under_threshold_and_conserves_area() {
        let original_area = 100u64 * 100;
        let pieces = split_page(page(100, 100, "a"), 3_000);

        assert!(pieces.iter().all(|p| p.area() < 3_000));
        assert_eq!(pieces.iter().map(PageImage::area).sum::<u64>(), original_area);
        // 100x100 -> 2x 100x50 -> 4x 100x25
        assert_eq!(pieces.len(), 4);
    }

    #[test]
    fn split_preserves_reading_order() {
        let pieces = split_page(page(10, 100, "a"), 400);
        // Each piece starts where the previous one ended.
        let mut expected_row = 0u32;
        for piece in &pieces {
            let top_left = piece.image.get_pixel(0, 0);
            assert_eq!(top_left[0], (expected_row % 256) as u8);
            expected_row += piece.height();
        }
        assert_eq!(expected_row, 100);
    }

    #[test]
    fn split_is_idempotent_on_its_own_output() {
        let first = split_page(page(100, 100, "a"), 3_000);
        let first_dims: Vec<_> = first.iter().map(|p| (p.width(), p.height())).collect();

        let second: Vec<_> = first
            .into_iter()
            .flat_map(|p| split_page(p, 3_000))
            .collect();
        let second_dims: Vec<_> = second.iter().map(|p| (p.width(), p.height())).collect();

        assert_eq!(first_dims, second_dims);
    }

    #[test]
    fn split_emits_unhalvable_slivers_as_is() {
        let pieces = split_page(page(100, 1, "a"), 50);
        assert_eq!(pieces.len(), 1);
        assert_eq!((pieces[0].width(), pieces[0].height()), (100, 1));
    }

    #[test]
    fn resize_is_identity_at_or_below_threshold() {
        let resized = resize_page(page(100, 100, "a"), 10_000);
        assert_eq!((resized.width(), resized.height()), (100, 100));
    }

    #[test]
    fn resize_shrinks_to_threshold() {
        let resized = resize_page(page(1_000, 1_000, "a"), 250_000);
        assert_eq!((resized.width(), resized.height()), (500, 500));
        assert!(resized.area() <= 250_000);
    }

    #[test]
    fn resize_never_drops_a_dimension_below_one() {
        let resized = resize_page(page(1, 1_000, "a"), 100);
        assert_eq!(resized.width(), 1);
        assert!(resized.height() >= 1);
        assert!(resized.area() <= 1_000);
    }

    #[test]
    fn clamp_pages_preserves_page_order() {
        let pages = vec![page(100, 100, "first"), page(10, 10, "second")];
        let clamped = clamp_pages(pages, 3_000, ClampStrategy::Split);

        let origins: Vec<_> = clamped.iter().map(|p| p.origin.as_str()).collect();
        assert_eq!(origins, vec!["first", "first", "first", "first", "second"]);
    }
}
