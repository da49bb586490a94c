// THEORY:
// A frame is a flat, row-major RGBA8 buffer plus its declared dimensions. The
// engine never owns camera memory: it borrows the buffer for the duration of
// one video tick, either read-only (`FrameView`, for sampling and
// segmentation) or mutably (`FrameMut`, for painting annotations in place).
// Both check the buffer length against the dimensions once, on construction,
// so every later pixel access can index directly.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{Result, ScanError};

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Intersects this rectangle with `[0, width) x [0, height)`.
    pub fn clip(&self, width: u32, height: u32) -> Rect {
        let right = self.right.min(width);
        let bottom = self.bottom.min(height);
        Rect {
            left: self.left.min(right),
            top: self.top.min(bottom),
            right,
            bottom,
        }
    }
}

fn check_len(width: u32, height: u32, actual: usize) -> Result<()> {
    let expected = width as usize * height as usize * CHANNELS;
    if expected != actual {
        return Err(ScanError::InvalidFrame { expected, actual });
    }
    Ok(())
}

/// Read-only view over an RGBA8 frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The frame's geometric center, `(width / 2, height / 2)`.
    pub fn center(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Reads the pixel at `(x, y)`. The caller guarantees the point is in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Pixel::new(
            self.data[index],
            self.data[index + 1],
            self.data[index + 2],
            self.data[index + 3],
        )
    }

    /// Iterates the pixels of `rect`, row by row. `rect` is clipped to the frame first.
    pub fn pixels_in(&self, rect: Rect) -> impl Iterator<Item = Pixel> + '_ {
        let rect = rect.clip(self.width, self.height);
        (rect.top..rect.bottom)
            .flat_map(move |y| (rect.left..rect.right).map(move |x| self.pixel(x, y)))
    }
}

impl<'a> From<&'a image::RgbaImage> for FrameView<'a> {
    fn from(image: &'a image::RgbaImage) -> Self {
        // An `RgbaImage` always holds exactly width * height * 4 bytes.
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw(),
        }
    }
}

/// Mutable view over an RGBA8 frame; annotations are painted through it in place.
#[derive(Debug)]
pub struct FrameMut<'a> {
    width: u32,
    height: u32,
    data: &'a mut [u8],
}

impl<'a> FrameMut<'a> {
    pub fn new(width: u32, height: u32, data: &'a mut [u8]) -> Result<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            data: &*self.data,
        }
    }

    /// Writes a pixel, ignoring points outside the frame.
    pub fn put_pixel(&mut self, x: i64, y: i64, pixel: Pixel) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let bytes: [u8; CHANNELS] = pixel.into();
        self.data[index..index + CHANNELS].copy_from_slice(&bytes);
    }
}

impl<'a> From<&'a mut image::RgbaImage> for FrameMut<'a> {
    fn from(image: &'a mut image::RgbaImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            width,
            height,
            data: &mut **image,
        }
    }
}
