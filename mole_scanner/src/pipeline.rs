// THEORY:
// The `pipeline` module is the top-level API of the scanner. It sequences the
// stages once per incoming frame and turns their output into something a UI can
// show and a program can consume:
//
// 1.  **Reference color**: decide which color we are looking for. How that
//     color is chosen is an explicit policy (`ColorSelectionMode`): re-sampled
//     from the frame center on every frame, set by the user touching the
//     screen, or locked.
// 2.  **Segmentation**: hand the frame and the reference color to the injected
//     `Segmenter` and get back region outlines.
// 3.  **Selection**: keep the first region that straddles the screen center.
// 4.  **Scoring**: measure that region's quadrant balance around its own center.
// 5.  **Annotation**: describe the overlay (crosshair, outline, center marker,
//     counts, score, color previews) as a list of `Annotation` values, and
//     optionally paint it into the frame.
//
// The pipeline is single-threaded and frame-synchronous. The only state that
// survives from one frame to the next is the reference color. A failure in any
// stage degrades that one frame's output and never the next one's.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core_modules::annotation::{Annotation, RgbaCanvas, render};
use crate::core_modules::blob_selector::blob_selector::select_center_region;
use crate::core_modules::color_sampler::{ColorSample, DEFAULT_HALF_SIZE, sample_color};
use crate::core_modules::frame::{FrameMut, FrameView, Rect};
use crate::core_modules::pixel::pixel::{HsvColor, Pixel};
use crate::core_modules::region::{BoundingExtent, Point, Region};
use crate::core_modules::segmentation::{
    ColorRange, Segmenter, SegmenterConfig, ThresholdSegmenter,
};
use crate::core_modules::symmetry::{SymmetryReport, SymmetryScore, score_symmetry};
use crate::error::{ConfigError, Result, ScanError};

// Re-export key data structures for the public API.
pub use crate::core_modules::region::QuadrantCounts;

/// Shown when no region straddles the screen center.
pub const NO_TARGET_MESSAGE: &str = "Place mole in center";

const CROSSHAIR_COLOR: Pixel = Pixel::opaque(0, 255, 0);
const CROSSHAIR_THICKNESS: u32 = 3;
const REGION_COLOR: Pixel = Pixel::opaque(255, 0, 0);
const CENTER_REGION_COLOR: Pixel = Pixel::opaque(0, 0, 255);
const CENTER_MARKER_COLOR: Pixel = Pixel::opaque(255, 0, 0);
const CENTER_MARKER_RADIUS: f64 = 3.0;
const TEXT_COLOR: Pixel = Pixel::opaque(255, 255, 0);
const TEXT_SCALE: f64 = 1.0;

/// Color preview patch: a square in the top-left corner.
const COLOR_PATCH_ORIGIN: u32 = 4;
const COLOR_PATCH_SIZE: u32 = 64;
/// Hue spectrum strip, to the right of the color patch.
const SPECTRUM_LEFT: u32 = 70;
const SPECTRUM_TOP: u32 = 4;
const SPECTRUM_WIDTH: u32 = 200;
const SPECTRUM_HEIGHT: u32 = 64;

/// How the reference color is chosen from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSelectionMode {
    /// Re-sample the frame center on every frame. Any user selection only lasts
    /// until the next frame.
    #[default]
    FrameCenter,
    /// Keep whatever `select_color_at` last picked.
    UserTouch,
    /// Keep the current color; only `set_reference_color` changes it.
    Locked,
}

/// Configuration for the `MoleScanPipeline`, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Half-size of the color sampling window, in pixels.
    pub sample_half_size: u32,
    pub selection_mode: ColorSelectionMode,
    /// Reference color used until the first successful sample.
    pub initial_color: HsvColor,
    /// Also outline every segmented region, not just the selected one.
    pub draw_all_regions: bool,
    pub segmenter: SegmenterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_half_size: DEFAULT_HALF_SIZE,
            selection_mode: ColorSelectionMode::default(),
            initial_color: HsvColor::new(255.0, 0.0, 0.0),
            draw_all_regions: false,
            segmenter: SegmenterConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Everything known about the region found at the screen center.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetData {
    /// Position of the region in the segmenter's output for this frame.
    pub region_index: usize,
    pub region: Region,
    pub extent: BoundingExtent,
    pub symmetry: SymmetryReport,
}

/// The programmatic outcome of a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    NoTargetFound,
    Target(TargetData),
}

/// The primary output of the pipeline for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub report: Report,
    /// Overlay for this frame, in drawing order.
    pub annotations: Vec<Annotation>,
    /// Reference color the frame was segmented with.
    pub reference_color: HsvColor,
    /// Number of regions the segmenter returned.
    pub region_count: usize,
}

impl FrameAnalysis {
    pub fn score(&self) -> Option<SymmetryScore> {
        match &self.report {
            Report::Target(target) => Some(target.symmetry.score),
            Report::NoTargetFound => None,
        }
    }

    pub fn target(&self) -> Option<&TargetData> {
        match &self.report {
            Report::Target(target) => Some(target),
            Report::NoTargetFound => None,
        }
    }
}

/// The main, top-level struct for the scanner.
pub struct MoleScanPipeline<S> {
    config: PipelineConfig,
    segmenter: S,
    reference_color: HsvColor,
    display_color: Pixel,
    spectrum: Vec<Pixel>,
}

impl MoleScanPipeline<ThresholdSegmenter> {
    /// A pipeline backed by the crate's own `ThresholdSegmenter`, configured from `config.segmenter`.
    pub fn with_threshold_segmenter(config: PipelineConfig) -> Self {
        let segmenter = ThresholdSegmenter::new(config.segmenter);
        Self::new(config, segmenter)
    }
}

impl<S: Segmenter> MoleScanPipeline<S> {
    pub fn new(config: PipelineConfig, segmenter: S) -> Self {
        let initial_color = config.initial_color;
        let mut pipeline = Self {
            config,
            segmenter,
            reference_color: initial_color,
            display_color: Pixel::default(),
            spectrum: Vec::new(),
        };
        pipeline.set_reference_color(initial_color);
        pipeline
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &S {
        &self.segmenter
    }

    pub fn selection_mode(&self) -> ColorSelectionMode {
        self.config.selection_mode
    }

    pub fn set_selection_mode(&mut self, mode: ColorSelectionMode) {
        log::debug!("color selection mode {:?} -> {mode:?}", self.config.selection_mode);
        self.config.selection_mode = mode;
    }

    pub fn reference_color(&self) -> HsvColor {
        self.reference_color
    }

    /// Display-space version of the reference color.
    pub fn display_color(&self) -> Pixel {
        self.display_color
    }

    /// Replaces the reference color, whatever the selection mode.
    pub fn set_reference_color(&mut self, color: HsvColor) {
        self.reference_color = color;
        self.display_color = color.to_rgba();
        self.spectrum = ColorRange::around(&color, &self.config.segmenter.color_radius).spectrum();
    }

    /// Samples the color around a touched point and, unless the color is locked,
    /// makes it the reference color.
    ///
    /// In `FrameCenter` mode the selection is applied but replaced on the next frame.
    pub fn select_color_at(&mut self, frame: &FrameView<'_>, x: i64, y: i64) -> Result<ColorSample> {
        let sample = sample_color(frame, x, y, self.config.sample_half_size)?;
        if self.config.selection_mode == ColorSelectionMode::Locked {
            log::debug!("reference color is locked, ignoring selection at ({x}, {y})");
        } else {
            self.apply_sample(&sample);
        }
        Ok(sample)
    }

    /// Runs every stage on `frame` and describes the overlay without painting it.
    pub fn analyze_frame(&mut self, frame: &FrameView<'_>) -> FrameAnalysis {
        if self.config.selection_mode == ColorSelectionMode::FrameCenter {
            let (center_x, center_y) = frame.center();
            match sample_color(frame, center_x as i64, center_y as i64, self.config.sample_half_size) {
                Ok(sample) => self.apply_sample(&sample),
                Err(err) => log::warn!("keeping previous reference color: {err}"),
            }
        }

        let regions = self.segmenter.segment(frame, &self.reference_color);
        let (center_x, center_y) = frame.center();
        let screen_center = Point::new(center_x as f64, center_y as f64);
        log::debug!(
            "{} regions for reference hsv=({:.1}, {:.1}, {:.1})",
            regions.len(),
            self.reference_color.hue,
            self.reference_color.saturation,
            self.reference_color.value
        );

        let target = match Self::find_target(&regions, screen_center) {
            Ok(target) => target,
            Err(err) => {
                log::error!("dropping target for this frame: {err}");
                debug_assert!(
                    !matches!(err, ScanError::DegenerateRegion),
                    "a region straddling the center cannot be empty"
                );
                None
            }
        };

        let annotations = match &target {
            Some(target) => self.compose_target(frame, &regions, target),
            None => Self::compose_no_target(frame),
        };

        let region_count = regions.len();
        FrameAnalysis {
            report: target.map_or(Report::NoTargetFound, Report::Target),
            annotations,
            reference_color: self.reference_color,
            region_count,
        }
    }

    /// Runs every stage on `frame` and paints the overlay into it.
    ///
    /// The buffer behind `frame` is modified in place.
    pub fn process_frame(&mut self, frame: &mut FrameMut<'_>) -> FrameAnalysis {
        let analysis = self.analyze_frame(&frame.as_view());
        render(&analysis.annotations, &mut RgbaCanvas::new(frame));
        analysis
    }

    fn apply_sample(&mut self, sample: &ColorSample) {
        self.set_reference_color(sample.hsv);
        // The sampler's own conversion is authoritative for the preview.
        self.display_color = sample.rgba;
    }

    fn find_target(regions: &[Region], screen_center: Point) -> Result<Option<TargetData>> {
        let Some(selected) = select_center_region(regions, screen_center)? else {
            return Ok(None);
        };
        let symmetry = score_symmetry(selected.region)?;
        log::debug!(
            "region {} straddles the center, counts {:?}, score {}",
            selected.index,
            symmetry.counts,
            symmetry.score
        );
        Ok(Some(TargetData {
            region_index: selected.index,
            region: selected.region.clone(),
            extent: selected.extent,
            symmetry,
        }))
    }

    fn compose_target(&self, frame: &FrameView<'_>, regions: &[Region], target: &TargetData) -> Vec<Annotation> {
        let (width, height) = (frame.width(), frame.height());
        let (center_x, center_y) = frame.center();
        let mut annotations = Vec::new();

        annotations.push(Annotation::Line {
            from: Point::new(0.0, center_y as f64),
            to: Point::new(width as f64, center_y as f64),
            color: CROSSHAIR_COLOR,
            thickness: CROSSHAIR_THICKNESS,
        });
        annotations.push(Annotation::Line {
            from: Point::new(center_x as f64, 0.0),
            to: Point::new(center_x as f64, height as f64),
            color: CROSSHAIR_COLOR,
            thickness: CROSSHAIR_THICKNESS,
        });

        if self.config.draw_all_regions {
            annotations.extend(regions.iter().map(|region| Annotation::Outline {
                points: region.points.clone(),
                color: REGION_COLOR,
                thickness: 1,
            }));
        }

        annotations.push(Annotation::Outline {
            points: target.region.points.clone(),
            color: CENTER_REGION_COLOR,
            thickness: 1,
        });
        annotations.push(Annotation::Circle {
            center: target.symmetry.center,
            radius: CENTER_MARKER_RADIUS,
            color: CENTER_MARKER_COLOR,
            filled: true,
        });

        let counts = target.symmetry.counts;
        let labels = [
            ("UL", counts.upper_left, center_x / 2, center_y * 3 / 2),
            ("UR", counts.upper_right, center_x * 3 / 2, center_y * 3 / 2),
            ("LL", counts.lower_left, center_x / 2, center_y / 2),
            ("LR", counts.lower_right, center_x * 3 / 2, center_y / 2),
        ];
        for (name, count, x, y) in labels {
            annotations.push(text(format!("{name} size: {count}"), x, y));
        }
        annotations.push(text(format!("Difference: {}", target.symmetry.score), center_x, center_y));

        annotations.push(Annotation::FillRect {
            rect: Rect {
                left: COLOR_PATCH_ORIGIN,
                top: COLOR_PATCH_ORIGIN,
                right: COLOR_PATCH_ORIGIN + COLOR_PATCH_SIZE,
                bottom: COLOR_PATCH_ORIGIN + COLOR_PATCH_SIZE,
            },
            color: self.display_color,
        });
        if !self.spectrum.is_empty() {
            annotations.push(Annotation::Patch {
                left: SPECTRUM_LEFT,
                top: SPECTRUM_TOP,
                width: SPECTRUM_WIDTH,
                pixels: stretch_strip(&self.spectrum, SPECTRUM_WIDTH, SPECTRUM_HEIGHT),
            });
        }

        annotations
    }

    fn compose_no_target(frame: &FrameView<'_>) -> Vec<Annotation> {
        let (center_x, center_y) = frame.center();
        vec![text(NO_TARGET_MESSAGE.to_string(), center_x, center_y)]
    }
}

fn text(text: String, x: u32, y: u32) -> Annotation {
    Annotation::Text {
        text,
        origin: Point::new(x as f64, y as f64),
        color: TEXT_COLOR,
        scale: TEXT_SCALE,
    }
}

/// Nearest-neighbour stretch of a one-row strip to `width` x `height`.
fn stretch_strip(strip: &[Pixel], width: u32, height: u32) -> Vec<Pixel> {
    let row: Vec<Pixel> = (0..width as usize)
        .map(|column| strip[column * strip.len() / width as usize])
        .collect();
    row.repeat(height as usize)
}
