use mole_scanner::ScanError;
use mole_scanner::core_modules::annotation::Annotation;
use mole_scanner::core_modules::color_sampler::sample_color;
use mole_scanner::core_modules::frame::{FrameMut, FrameView, Rect};
use mole_scanner::core_modules::pixel::pixel::{HsvColor, Pixel};
use mole_scanner::core_modules::region::{Point, Region};
use mole_scanner::core_modules::segmentation::Segmenter;
use mole_scanner::pipeline::{
    ColorSelectionMode, MoleScanPipeline, NO_TARGET_MESSAGE, PipelineConfig, Report,
};

/// Returns the same regions for every frame and remembers the colors it was asked for.
struct FixedRegions {
    regions: Vec<Region>,
    requested: Vec<HsvColor>,
}

impl FixedRegions {
    fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            requested: Vec::new(),
        }
    }
}

impl Segmenter for FixedRegions {
    fn segment(&mut self, _frame: &FrameView<'_>, reference: &HsvColor) -> Vec<Region> {
        self.requested.push(*reference);
        self.regions.clone()
    }
}

/// Outline of the square `min..max`, with `(max - min) / step` points per edge
/// placed at the middle of each step. Corners are left out.
fn square_outline(min: f64, max: f64, step: f64) -> Region {
    let per_edge = ((max - min) / step) as usize;
    let along: Vec<f64> = (0..per_edge).map(|i| min + step * (i as f64 + 0.5)).collect();
    let mut points = Vec::new();
    points.extend(along.iter().map(|&t| Point::new(t, min)));
    points.extend(along.iter().map(|&t| Point::new(max, t)));
    points.extend(along.iter().map(|&t| Point::new(max + min - t, max)));
    points.extend(along.iter().map(|&t| Point::new(min, max + min - t)));
    Region::new(points)
}

fn filled(width: u32, height: u32, color: Pixel) -> Vec<u8> {
    let bytes: [u8; 4] = color.into();
    bytes.repeat((width * height) as usize)
}

fn paint_square(data: &mut [u8], width: u32, rect: Rect, color: Pixel) {
    let bytes: [u8; 4] = color.into();
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            let index = ((y * width + x) * 4) as usize;
            data[index..index + 4].copy_from_slice(&bytes);
        }
    }
}

#[test]
fn centered_square_is_balanced() {
    let data = filled(100, 100, Pixel::opaque(0, 0, 0));
    let frame = FrameView::new(100, 100, &data).unwrap();
    let mut pipeline = MoleScanPipeline::new(
        PipelineConfig::default(),
        FixedRegions::new(vec![square_outline(10.0, 90.0, 10.0)]),
    );

    let analysis = pipeline.analyze_frame(&frame);
    let target = analysis.target().expect("the square straddles the center");
    assert_eq!(target.region_index, 0);
    assert_eq!(target.symmetry.center, Point::new(50.0, 50.0));
    assert_eq!(target.symmetry.counts.as_array(), [8, 8, 8, 8]);
    assert_eq!(analysis.score(), Some(0));
}

#[test]
fn off_center_region_reports_no_target() {
    let data = filled(100, 100, Pixel::opaque(0, 0, 0));
    let frame = FrameView::new(100, 100, &data).unwrap();
    let mut pipeline = MoleScanPipeline::new(
        PipelineConfig::default(),
        FixedRegions::new(vec![square_outline(60.0, 90.0, 5.0)]),
    );

    let analysis = pipeline.analyze_frame(&frame);
    assert_eq!(analysis.report, Report::NoTargetFound);
    assert_eq!(analysis.region_count, 1);
    assert_eq!(
        analysis.annotations,
        vec![Annotation::Text {
            text: NO_TARGET_MESSAGE.to_string(),
            origin: Point::new(50.0, 50.0),
            color: Pixel::opaque(255, 255, 0),
            scale: 1.0,
        }]
    );
}

#[test]
fn corner_sample_is_clipped_to_the_frame() {
    let data = filled(100, 100, Pixel::opaque(0, 0, 255));
    let frame = FrameView::new(100, 100, &data).unwrap();

    let sample = sample_color(&frame, 0, 0, 4).unwrap();
    assert_eq!(
        sample.window,
        Rect {
            left: 0,
            top: 0,
            right: 4,
            bottom: 4
        }
    );
    assert_eq!(sample.pixel_count(), 16);
}

#[test]
fn out_of_bounds_selection_keeps_the_previous_color() {
    let data = filled(100, 100, Pixel::opaque(0, 255, 0));
    let frame = FrameView::new(100, 100, &data).unwrap();
    let config = PipelineConfig {
        selection_mode: ColorSelectionMode::UserTouch,
        ..PipelineConfig::default()
    };
    let mut pipeline = MoleScanPipeline::new(config, FixedRegions::new(Vec::new()));
    let initial = pipeline.reference_color();
    assert_eq!(initial, HsvColor::new(255.0, 0.0, 0.0));

    assert_eq!(
        pipeline.select_color_at(&frame, 150, 50),
        Err(ScanError::OutOfBounds {
            x: 150,
            y: 50,
            width: 100,
            height: 100
        })
    );
    assert_eq!(pipeline.reference_color(), initial);

    // A later valid selection still takes effect.
    pipeline.select_color_at(&frame, 50, 50).unwrap();
    assert_eq!(pipeline.reference_color(), HsvColor::new(85.0, 255.0, 255.0));
}

#[test]
fn empty_frame_keeps_the_previous_color() {
    let mut pipeline = MoleScanPipeline::new(PipelineConfig::default(), FixedRegions::new(Vec::new()));
    let frame = FrameView::new(0, 0, &[]).unwrap();
    let analysis = pipeline.analyze_frame(&frame);
    assert_eq!(analysis.reference_color, HsvColor::new(255.0, 0.0, 0.0));
    assert_eq!(analysis.report, Report::NoTargetFound);
}

#[test]
fn segmenter_receives_the_center_color() {
    let mut data = filled(60, 60, Pixel::opaque(255, 255, 255));
    paint_square(
        &mut data,
        60,
        Rect {
            left: 20,
            top: 20,
            right: 40,
            bottom: 40,
        },
        Pixel::opaque(0, 0, 255),
    );
    let frame = FrameView::new(60, 60, &data).unwrap();
    let mut pipeline = MoleScanPipeline::new(PipelineConfig::default(), FixedRegions::new(Vec::new()));

    pipeline.analyze_frame(&frame);
    assert_eq!(pipeline.segmenter().requested, vec![HsvColor::new(171.0, 255.0, 255.0)]);
}

#[test]
fn threshold_segmenter_finds_a_centered_mole() {
    let mut data = filled(80, 80, Pixel::opaque(255, 255, 255));
    paint_square(
        &mut data,
        80,
        Rect {
            left: 24,
            top: 24,
            right: 56,
            bottom: 56,
        },
        Pixel::opaque(255, 0, 0),
    );
    let mut frame = FrameMut::new(80, 80, &mut data).unwrap();
    let mut pipeline = MoleScanPipeline::with_threshold_segmenter(PipelineConfig::default());

    let analysis = pipeline.process_frame(&mut frame);
    assert_eq!(analysis.reference_color, HsvColor::new(0.0, 255.0, 255.0));
    assert_eq!(analysis.region_count, 1);
    assert_eq!(analysis.score(), Some(0));
    let target = analysis.target().unwrap();
    assert!(target.extent.min_x < 40.0 && target.extent.max_x > 40.0);
}

#[test]
fn touched_mole_away_from_the_center_is_not_a_target() {
    let mut data = filled(80, 80, Pixel::opaque(255, 255, 255));
    paint_square(
        &mut data,
        80,
        Rect {
            left: 4,
            top: 4,
            right: 20,
            bottom: 20,
        },
        Pixel::opaque(255, 0, 0),
    );
    let frame = FrameView::new(80, 80, &data).unwrap();
    let config = PipelineConfig {
        selection_mode: ColorSelectionMode::UserTouch,
        ..PipelineConfig::default()
    };
    let mut pipeline = MoleScanPipeline::with_threshold_segmenter(config);

    pipeline.select_color_at(&frame, 10, 10).unwrap();
    let analysis = pipeline.analyze_frame(&frame);
    assert_eq!(analysis.region_count, 1);
    assert_eq!(analysis.report, Report::NoTargetFound);
}

#[test]
fn distant_outline_vertex_is_drawn_without_walking_off_screen() {
    let mut data = filled(100, 100, Pixel::opaque(0, 0, 0));
    let mut frame = FrameMut::new(100, 100, &mut data).unwrap();
    let region = Region::from(vec![(-2e8, 10.0), (10.0, 90.0), (90.0, 10.0), (90.0, 90.0)]);
    let mut pipeline = MoleScanPipeline::new(PipelineConfig::default(), FixedRegions::new(vec![region]));

    let analysis = pipeline.process_frame(&mut frame);
    assert_eq!(analysis.score(), Some(2));
    assert_eq!(frame.as_view().pixel(90, 90), Pixel::opaque(0, 0, 255));
}
