// THEORY:
// The `ColorSampler` turns a point on the frame into a reference color. A single
// pixel is far too noisy for that (sensor noise, JPEG blocks, specular
// highlights), so it pools a small square window around the point, exactly like
// a `Chunk` pools its pixels into an average.
//
// Key steps:
// 1.  **Window**: a square of `half_size` pixels in every direction around the
//     query point, clipped to the frame. The query point itself must be inside
//     the frame, otherwise nothing is sampled.
// 2.  **Perceptual mean**: every window pixel is converted to full-range HSV and
//     the channels are averaged. The result is fractional and is what the
//     segmentation stage consumes.
// 3.  **Display color**: the mean is converted back to RGBA, as if it were a
//     1x1 image, so the UI can show the user which color is being tracked.
//
// Sampling is read-only: the source frame is never touched.

use crate::core_modules::frame::{FrameView, Rect};
use crate::core_modules::pixel::pixel::{HsvColor, Pixel};
use crate::error::{Result, ScanError};

/// Default half-size of the sampling window, in pixels.
pub const DEFAULT_HALF_SIZE: u32 = 4;

/// The averaged color of a small window of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSample {
    /// The sampled window, already clipped to the frame.
    pub window: Rect,
    /// Mean full-range HSV color of the window.
    pub hsv: HsvColor,
    /// `hsv` converted back to display space.
    pub rgba: Pixel,
}

impl ColorSample {
    /// Number of pixels that contributed to the mean.
    pub fn pixel_count(&self) -> u64 {
        self.window.area()
    }
}

/// Builds the sampling window around an in-bounds point.
///
/// The window is never empty: a `half_size` of zero still covers the point itself.
pub fn sampling_window(center_x: u32, center_y: u32, half_size: u32, width: u32, height: u32) -> Rect {
    Rect {
        left: center_x.saturating_sub(half_size),
        top: center_y.saturating_sub(half_size),
        right: center_x.saturating_add(half_size.max(1)).min(width),
        bottom: center_y.saturating_add(half_size.max(1)).min(height),
    }
}

/// Samples the mean color of the window around `(center_x, center_y)`.
pub fn sample_color(frame: &FrameView<'_>, center_x: i64, center_y: i64, half_size: u32) -> Result<ColorSample> {
    if !frame.contains(center_x, center_y) {
        return Err(ScanError::OutOfBounds {
            x: center_x,
            y: center_y,
            width: frame.width(),
            height: frame.height(),
        });
    }

    let window = sampling_window(
        center_x as u32,
        center_y as u32,
        half_size,
        frame.width(),
        frame.height(),
    );

    let mut sum_hue = 0u64;
    let mut sum_saturation = 0u64;
    let mut sum_value = 0u64;
    for pixel in frame.pixels_in(window) {
        let hsv = pixel.to_hsv();
        sum_hue += hsv.hue as u64;
        sum_saturation += hsv.saturation as u64;
        sum_value += hsv.value as u64;
    }

    let pixel_count = window.area() as f64;
    let hsv = HsvColor::new(
        sum_hue as f64 / pixel_count,
        sum_saturation as f64 / pixel_count,
        sum_value as f64 / pixel_count,
    );
    let rgba = hsv.to_rgba();

    log::debug!(
        "sampled {}x{} window at ({center_x}, {center_y}): hsv=({:.1}, {:.1}, {:.1}) rgba=({}, {}, {}, {})",
        window.width(),
        window.height(),
        hsv.hue,
        hsv.saturation,
        hsv.value,
        rgba.red,
        rgba.green,
        rgba.blue,
        rgba.alpha
    );

    Ok(ColorSample { window, hsv, rgba })
}
