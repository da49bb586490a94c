pub mod image_helper {
    use std::path::Path;

    use image::{ExtendedColorType, ImageEncoder, ImageResult, RgbaImage};

    use crate::core_modules::frame::FrameView;

    /// Writes `frame` to `path` as an RGBA PNG.
    pub fn save_frame(path: impl AsRef<Path>, frame: &FrameView<'_>) -> ImageResult<()> {
        let output = std::io::BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(frame.data(), frame.width(), frame.height(), ExtendedColorType::Rgba8)?;

        Ok(())
    }

    /// Loads any supported image file as RGBA.
    pub fn load_rgba(path: impl AsRef<Path>) -> ImageResult<RgbaImage> {
        Ok(image::open(path)?.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::core_modules::frame::FrameView;

    #[test]
    fn saved_frame_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        let (width, height) = (30u32, 20u32);
        let mut buffer = vec![255u8; (width * height * 4) as usize];
        for (i, pixel) in buffer.chunks_mut(4).enumerate() {
            pixel[0] = (i % 255) as u8;
            pixel[1] = (i / width as usize) as u8;
        }

        let frame = FrameView::new(width, height, &buffer).unwrap();
        save_frame(&path, &frame).unwrap();

        let loaded = load_rgba(&path).unwrap();
        assert_eq!(loaded.dimensions(), (width, height));
        assert_eq!(loaded.as_raw(), &buffer);
    }

    #[test]
    fn non_square_frames_keep_their_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        let buffer = vec![0u8; 8 * 2 * 4];
        save_frame(&path, &FrameView::new(8, 2, &buffer).unwrap()).unwrap();
        assert_eq!(load_rgba(&path).unwrap().dimensions(), (8, 2));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = vec![0u8; 4];
        let frame = FrameView::new(1, 1, &buffer).unwrap();
        assert!(save_frame(dir.path().join("nope").join("x.png"), &frame).is_err());
    }
}
