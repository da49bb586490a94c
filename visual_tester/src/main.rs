use anyhow::{Context, Result};
use mole_scanner::core_modules::annotation::{Canvas, render};
use mole_scanner::core_modules::frame::{FrameView, Rect as FrameRect};
use mole_scanner::core_modules::pixel::pixel::{HsvColor, Pixel};
use mole_scanner::core_modules::region::{Point, Region};
use mole_scanner::core_modules::segmentation::{ColorRange, Segmenter, SegmenterConfig};
use mole_scanner::core_modules::utils::image_helper::image_helper;
use mole_scanner::pipeline::{MoleScanPipeline, PipelineConfig};
use opencv::{
    core::{self, Mat, Scalar, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: visual_tester <input_video_path> <output_video_path> [config.json]");
        return Ok(());
    }
    let input_path = &args[1];
    let output_path = &args[2];
    let config = match args.get(3) {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading pipeline config from {path}"))?,
        None => PipelineConfig::default(),
    };

    // --- 2. Video I/O Initialization ---
    let mut cap = VideoCapture::from_file(input_path, videoio::CAP_ANY)
        .with_context(|| format!("opening {input_path}"))?;
    if !cap.is_opened()? {
        anyhow::bail!("could not open video file {input_path}");
    }

    let frame_width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
    let frame_height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
    let fps = cap.get(videoio::CAP_PROP_FPS)?;
    log::info!("{input_path}: {frame_width}x{frame_height} at {fps:.1} fps");

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let mut writer = VideoWriter::new(
        output_path,
        fourcc,
        fps,
        Size::new(frame_width as i32, frame_height as i32),
        true,
    )
    .with_context(|| format!("creating {output_path}"))?;

    // --- 3. Pipeline Initialization ---
    let segmenter = OpenCvSegmenter::new(config.segmenter);
    let mut pipeline = MoleScanPipeline::new(config, segmenter);

    // --- 4. Main Processing Loop ---
    let mut frame = Mat::default();
    let mut output_frame = Mat::default();
    let mut frames = 0usize;
    let mut targets = 0usize;
    let mut score_sum = 0usize;
    loop {
        match cap.read(&mut frame) {
            Ok(true) => {
                if frame.empty() {
                    break;
                }

                // --- 5. Frame Conversion & Analysis ---
                // Convert the OpenCV Mat (BGR) to an RGBA buffer for the pipeline.
                let mut rgba_frame = Mat::default();
                imgproc::cvt_color(&frame, &mut rgba_frame, imgproc::COLOR_BGR2RGBA, 0)?;
                let frame_buffer: Vec<u8> = rgba_frame.data_bytes()?.to_vec();
                let view = match frame_view(&rgba_frame, &frame_buffer) {
                    Ok(view) => view,
                    Err(err) => {
                        log::warn!("skipping undecodable frame after {frames}: {err}");
                        writer.write(&frame)?;
                        continue;
                    }
                };

                let analysis = pipeline.analyze_frame(&view);
                frames += 1;
                if let Some(score) = analysis.score() {
                    targets += 1;
                    score_sum += score;
                }

                // --- 6. Visualization ---
                output_frame = frame.clone();
                render(&analysis.annotations, &mut OpenCvCanvas::new(&mut output_frame));

                // --- 7. Write Output Frame ---
                writer.write(&output_frame)?;

                if frames % 30 == 0 {
                    log::info!("{frames} frames, target in {targets}");
                }
            }
            Ok(false) => {
                // End of video
                break;
            }
            Err(e) => {
                log::error!("Error reading frame: {e:?}");
                break;
            }
        }
    }

    // --- 8. Snapshot of the last annotated frame ---
    if !output_frame.empty() {
        let snapshot_path = Path::new(output_path).with_extension("png");
        save_snapshot(&output_frame, &snapshot_path)
            .with_context(|| format!("saving snapshot {}", snapshot_path.display()))?;
        log::info!("Snapshot saved to {}", snapshot_path.display());
    }

    if targets > 0 {
        log::info!(
            "Target found in {targets} of {frames} frames, mean score {:.2}",
            score_sum as f64 / targets as f64
        );
    } else {
        log::info!("No target found in {frames} frames");
    }
    log::info!("Processing complete. Output saved to {}", output_path);
    Ok(())
}

/// Views `buffer` with the dimensions of the decoded `rgba` Mat it was copied from.
fn frame_view<'a>(rgba: &Mat, buffer: &'a [u8]) -> mole_scanner::Result<FrameView<'a>> {
    FrameView::new(rgba.cols().max(0) as u32, rgba.rows().max(0) as u32, buffer)
}

fn save_snapshot(bgr: &Mat, path: &Path) -> Result<()> {
    let mut rgba = Mat::default();
    imgproc::cvt_color(bgr, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
    let view = frame_view(&rgba, rgba.data_bytes()?)?;
    image_helper::save_frame(path, &view)?;
    Ok(())
}

/// Segments with OpenCV: pyramid downscale, HSV threshold, dilate, external contours.
struct OpenCvSegmenter {
    config: SegmenterConfig,
}

impl OpenCvSegmenter {
    fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    fn try_segment(&self, frame: &FrameView<'_>, reference: &HsvColor) -> opencv::Result<Vec<Region>> {
        let mut rgba = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC4,
            Scalar::all(0.0),
        )?;
        rgba.data_bytes_mut()?.copy_from_slice(frame.data());
        let mut rgb = Mat::default();
        imgproc::cvt_color(&rgba, &mut rgb, imgproc::COLOR_RGBA2RGB, 0)?;

        // pyrDown halves each time, so the factor is rounded down to a power of two.
        let mut scale = 1u32;
        while scale * 2 <= self.config.downscale {
            let mut smaller = Mat::default();
            imgproc::pyr_down(&rgb, &mut smaller, Size::default(), core::BORDER_DEFAULT)?;
            rgb = smaller;
            scale *= 2;
        }

        let mut hsv = Mat::default();
        imgproc::cvt_color(&rgb, &mut hsv, imgproc::COLOR_RGB2HSV_FULL, 0)?;

        let range = ColorRange::around(reference, &self.config.color_radius);
        let lower = Scalar::new(range.lower.hue, range.lower.saturation, range.lower.value, 0.0);
        let upper = Scalar::new(range.upper.hue, range.upper.saturation, range.upper.value, 255.0);
        let mut mask = Mat::default();
        core::in_range(&hsv, &lower, &upper, &mut mask)?;

        let kernel =
            imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), core::Point::new(-1, -1))?;
        let mut dilated = Mat::default();
        imgproc::dilate(
            &mask,
            &mut dilated,
            &kernel,
            core::Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            Scalar::default(),
        )?;

        let mut contours = core::Vector::<core::Vector<core::Point>>::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_NONE,
            core::Point::new(0, 0),
        )?;

        let mut areas = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            areas.push(imgproc::contour_area(&contour, false)?);
        }
        let max_area = areas.iter().copied().fold(0.0, f64::max);

        let factor = scale as f64;
        let regions = contours
            .iter()
            .zip(areas)
            .filter(|(_, area)| *area > self.config.min_area_ratio * max_area)
            .map(|(contour, _)| {
                Region::new(
                    contour
                        .iter()
                        .map(|p| Point::new(p.x as f64 * factor, p.y as f64 * factor))
                        .collect(),
                )
            })
            .collect();
        Ok(regions)
    }
}

impl Segmenter for OpenCvSegmenter {
    fn segment(&mut self, frame: &FrameView<'_>, reference: &HsvColor) -> Vec<Region> {
        self.try_segment(frame, reference).unwrap_or_else(|err| {
            log::warn!("segmentation failed, treating frame as empty: {err}");
            Vec::new()
        })
    }
}

/// Draws annotations onto a BGR `Mat` with OpenCV, text included.
struct OpenCvCanvas<'m> {
    mat: &'m mut Mat,
}

impl<'m> OpenCvCanvas<'m> {
    fn new(mat: &'m mut Mat) -> Self {
        Self { mat }
    }

    fn report(what: &str, result: opencv::Result<()>) {
        if let Err(err) = result {
            log::warn!("failed to draw {what}: {err}");
        }
    }
}

fn bgr(color: Pixel) -> Scalar {
    Scalar::new(color.blue as f64, color.green as f64, color.red as f64, 0.0)
}

fn cv_point(point: Point) -> core::Point {
    core::Point::new(point.x.round() as i32, point.y.round() as i32)
}

impl Canvas for OpenCvCanvas<'_> {
    fn line(&mut self, from: Point, to: Point, color: Pixel, thickness: u32) {
        let result = imgproc::line(
            self.mat,
            cv_point(from),
            cv_point(to),
            bgr(color),
            thickness.max(1) as i32,
            imgproc::LINE_8,
            0,
        );
        Self::report("line", result);
    }

    fn circle(&mut self, center: Point, radius: f64, color: Pixel, filled: bool) {
        let thickness = if filled { imgproc::FILLED } else { 1 };
        let result = imgproc::circle(
            self.mat,
            cv_point(center),
            radius.round() as i32,
            bgr(color),
            thickness,
            imgproc::LINE_8,
            0,
        );
        Self::report("circle", result);
    }

    fn text(&mut self, text: &str, origin: Point, color: Pixel, scale: f64) {
        let result = imgproc::put_text(
            self.mat,
            text,
            cv_point(origin),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            bgr(color),
            2,
            imgproc::LINE_8,
            false,
        );
        Self::report("text", result);
    }

    fn fill_rect(&mut self, rect: FrameRect, color: Pixel) {
        let rect = core::Rect::new(
            rect.left as i32,
            rect.top as i32,
            rect.width() as i32,
            rect.height() as i32,
        );
        let result = imgproc::rectangle(self.mat, rect, bgr(color), imgproc::FILLED, imgproc::LINE_8, 0);
        Self::report("rectangle", result);
    }

    fn blit(&mut self, left: u32, top: u32, width: u32, pixels: &[Pixel]) {
        if width == 0 {
            return;
        }
        let (cols, rows) = (self.mat.cols(), self.mat.rows());
        for (index, pixel) in pixels.iter().enumerate() {
            let x = (left + index as u32 % width) as i32;
            let y = (top + index as u32 / width) as i32;
            if x >= cols || y >= rows {
                continue;
            }
            match self.mat.at_2d_mut::<core::Vec3b>(y, x) {
                Ok(target) => {
                    target[0] = pixel.blue;
                    target[1] = pixel.green;
                    target[2] = pixel.red;
                }
                Err(err) => {
                    log::warn!("failed to blit patch: {err}");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mole_scanner::ScanError;

    #[test]
    fn frame_view_uses_the_decoded_size() {
        let rgba = Mat::new_rows_cols_with_default(3, 5, core::CV_8UC4, Scalar::all(7.0)).unwrap();
        let buffer = rgba.data_bytes().unwrap().to_vec();
        let view = frame_view(&rgba, &buffer).unwrap();
        assert_eq!((view.width(), view.height()), (5, 3));
    }

    #[test]
    fn short_buffer_is_rejected_not_fatal() {
        let rgba = Mat::new_rows_cols_with_default(3, 5, core::CV_8UC4, Scalar::all(0.0)).unwrap();
        let buffer = vec![0u8; 4 * 4];
        assert_eq!(
            frame_view(&rgba, &buffer).map(|view| view.width()),
            Err(ScanError::InvalidFrame {
                expected: 5 * 3 * 4,
                actual: 16
            })
        );
    }
}
