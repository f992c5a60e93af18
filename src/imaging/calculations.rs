//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Fit `source` dimensions within `max_width`, keeping the aspect ratio.
///
/// Images already narrow enough are returned unchanged; nothing is ever
/// upscaled. The height never rounds down to zero.
///
/// # Examples
/// ```
/// # use siteforge::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((1500, 1000), 750), (750, 500));
/// assert_eq!(calculate_bounded_dimensions((600, 400), 750), (600, 400));
/// ```
pub fn calculate_bounded_dimensions(source: (u32, u32), max_width: u32) -> (u32, u32) {
    let (width, height) = source;
    if width <= max_width || width == 0 {
        return source;
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_scaled_to_max_width() {
        assert_eq!(calculate_bounded_dimensions((1200, 800), 750), (750, 500));
    }

    #[test]
    fn portrait_keeps_aspect_ratio() {
        assert_eq!(calculate_bounded_dimensions((1000, 2000), 750), (750, 1500));
    }

    #[test]
    fn exact_width_is_untouched() {
        assert_eq!(calculate_bounded_dimensions((750, 300), 750), (750, 300));
    }

    #[test]
    fn small_images_never_upscale() {
        assert_eq!(calculate_bounded_dimensions((100, 80), 750), (100, 80));
    }

    #[test]
    fn rounding_to_nearest_pixel() {
        // 333 * 750 / 1000 = 249.75
        assert_eq!(calculate_bounded_dimensions((1000, 333), 750), (750, 250));
    }

    #[test]
    fn extreme_panorama_keeps_one_pixel_height() {
        assert_eq!(calculate_bounded_dimensions((100_000, 10), 750), (750, 1));
    }
}
