// THEORY:
// Segmentation turns "the color the user is pointing at" into a list of region
// outlines. The pipeline only depends on the `Segmenter` contract below; it
// never looks inside. That keeps the geometric stages testable with fake region
// lists, and it lets a caller plug in whatever thresholding engine it already
// has (the visual tester uses OpenCV).
//
// `ThresholdSegmenter` is the engine that ships with the crate. It follows the
// classic color-blob recipe:
// 1.  **Downscale** the frame by an integer factor, averaging each block of
//     pixels the way a `Chunk` averages its pixels. This is both a speed-up and
//     a noise filter.
// 2.  **Threshold** every downscaled pixel against a `ColorRange` built around
//     the reference color (a tolerance radius on each HSV channel).
// 3.  **Dilate** the mask with a 3x3 kernel to close pinholes and hairline gaps.
// 4.  **Label** 8-connected components with an iterative flood fill.
// 5.  **Trace** the outer boundary of each component (Moore neighbour tracing),
//     producing an ordered, closed outline.
// 6.  **Filter** out components that are tiny compared to the largest one, and
//     scale the surviving outlines back to full-frame coordinates.
//
// The tolerance radius, downscale factor and area ratio are configuration: the
// right values depend on the camera and the lighting, not on the algorithm.

use serde::{Deserialize, Serialize};

use crate::core_modules::frame::FrameView;
use crate::core_modules::pixel::pixel::{HsvColor, HsvPixel, Pixel};
use crate::core_modules::region::{Point, Region};

/// Produces region outlines whose pixels are color-similar to a reference color.
///
/// No ordering is guaranteed among the returned regions, and the list may be empty.
pub trait Segmenter {
    fn segment(&mut self, frame: &FrameView<'_>, reference: &HsvColor) -> Vec<Region>;
}

impl<F> Segmenter for F
where
    F: FnMut(&FrameView<'_>, &HsvColor) -> Vec<Region>,
{
    fn segment(&mut self, frame: &FrameView<'_>, reference: &HsvColor) -> Vec<Region> {
        self(frame, reference)
    }
}

/// Per-channel tolerance around the reference color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRadius {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Default for ColorRadius {
    fn default() -> Self {
        Self {
            hue: 25.0,
            saturation: 50.0,
            value: 50.0,
        }
    }
}

/// Inclusive HSV bounds a pixel must fall within to belong to a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRange {
    pub lower: HsvColor,
    pub upper: HsvColor,
}

impl ColorRange {
    /// Builds the range `reference -+ radius`. Hue is clamped to `[0, 255]`
    /// rather than wrapped; saturation and value are left unclamped.
    pub fn around(reference: &HsvColor, radius: &ColorRadius) -> Self {
        let min_hue = if reference.hue >= radius.hue {
            reference.hue - radius.hue
        } else {
            0.0
        };
        let max_hue = if reference.hue + radius.hue <= 255.0 {
            reference.hue + radius.hue
        } else {
            255.0
        };

        Self {
            lower: HsvColor::new(
                min_hue,
                reference.saturation - radius.saturation,
                reference.value - radius.value,
            ),
            upper: HsvColor::new(
                max_hue,
                reference.saturation + radius.saturation,
                reference.value + radius.value,
            ),
        }
    }

    pub fn contains(&self, pixel: HsvPixel) -> bool {
        let hue = pixel.hue as f64;
        let saturation = pixel.saturation as f64;
        let value = pixel.value as f64;
        hue >= self.lower.hue
            && hue <= self.upper.hue
            && saturation >= self.lower.saturation
            && saturation <= self.upper.saturation
            && value >= self.lower.value
            && value <= self.upper.value
    }

    /// One fully saturated, full-value swatch per hue step in the range.
    pub fn spectrum(&self) -> Vec<Pixel> {
        let steps = (self.upper.hue - self.lower.hue).max(0.0) as usize;
        (0..steps)
            .map(|step| {
                let hue = (self.lower.hue as usize + step).min(255) as u8;
                HsvPixel::new(hue, 255, 255).to_rgba()
            })
            .collect()
    }
}

fn default_downscale() -> u32 {
    4
}

fn default_min_area_ratio() -> f64 {
    0.1
}

/// Tuning knobs for `ThresholdSegmenter`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    #[serde(default)]
    pub color_radius: ColorRadius,
    /// Integer downscale factor applied before thresholding; 1 disables it.
    #[serde(default = "default_downscale")]
    pub downscale: u32,
    /// Components not strictly larger than this fraction of the largest one are dropped.
    #[serde(default = "default_min_area_ratio")]
    pub min_area_ratio: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            color_radius: ColorRadius::default(),
            downscale: default_downscale(),
            min_area_ratio: default_min_area_ratio(),
        }
    }
}

/// Clockwise 8-neighbourhood in image coordinates (y grows downwards), starting east.
const NEIGHBORS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

/// A binary grid at the downscaled resolution.
struct Mask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Mask {
    fn get(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.cells[y as usize * self.width + x as usize]
    }

    fn dilate(&self) -> Mask {
        let mut cells = vec![false; self.cells.len()];
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                cells[y as usize * self.width + x as usize] =
                    (-1..=1).any(|dy| (-1..=1).any(|dx| self.get(x + dx, y + dy)));
            }
        }
        Mask {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

/// One labelled connected component of the mask.
struct Component {
    label: u32,
    area: usize,
    /// First pixel of the component in raster order; its west and north neighbours are outside.
    start: (i64, i64),
}

/// Component labels for every mask cell; 0 is background.
struct Labels {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl Labels {
    fn is(&self, x: i64, y: i64, label: u32) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.cells[y as usize * self.width + x as usize] == label
    }
}

/// The reference `Segmenter`: HSV thresholding plus boundary tracing.
#[derive(Debug, Clone, Default)]
pub struct ThresholdSegmenter {
    config: SegmenterConfig,
}

impl ThresholdSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// The color range this segmenter thresholds against for `reference`.
    pub fn color_range(&self, reference: &HsvColor) -> ColorRange {
        ColorRange::around(reference, &self.config.color_radius)
    }

    /// Block-averages the frame by the downscale factor and thresholds each block.
    fn threshold(&self, frame: &FrameView<'_>, range: &ColorRange) -> Mask {
        let factor = self.config.downscale.max(1);
        let width = (frame.width() / factor) as usize;
        let height = (frame.height() / factor) as usize;
        let block_pixels = factor * factor;

        let mut cells = Vec::with_capacity(width * height);
        for block_y in 0..height as u32 {
            for block_x in 0..width as u32 {
                let mut sum = [0u32; 4];
                for dy in 0..factor {
                    for dx in 0..factor {
                        let pixel = frame.pixel(block_x * factor + dx, block_y * factor + dy);
                        sum[0] += pixel.red as u32;
                        sum[1] += pixel.green as u32;
                        sum[2] += pixel.blue as u32;
                        sum[3] += pixel.alpha as u32;
                    }
                }
                let average = Pixel::new(
                    (sum[0] / block_pixels) as u8,
                    (sum[1] / block_pixels) as u8,
                    (sum[2] / block_pixels) as u8,
                    (sum[3] / block_pixels) as u8,
                );
                cells.push(range.contains(average.to_hsv()));
            }
        }

        Mask {
            width,
            height,
            cells,
        }
    }

    /// Flood-fills 8-connected components of the mask.
    fn label(mask: &Mask) -> (Labels, Vec<Component>) {
        let mut cells = vec![0u32; mask.cells.len()];
        let mut components = Vec::new();
        let mut stack: Vec<(i64, i64)> = Vec::new();

        for y in 0..mask.height as i64 {
            for x in 0..mask.width as i64 {
                let index = y as usize * mask.width + x as usize;
                if !mask.cells[index] || cells[index] != 0 {
                    continue;
                }

                let label = components.len() as u32 + 1;
                let mut area = 0;
                cells[index] = label;
                stack.push((x, y));

                while let Some((cx, cy)) = stack.pop() {
                    area += 1;
                    for (dx, dy) in NEIGHBORS {
                        let (nx, ny) = (cx + dx, cy + dy);
                        if !mask.get(nx, ny) {
                            continue;
                        }
                        let neighbor = ny as usize * mask.width + nx as usize;
                        if cells[neighbor] == 0 {
                            cells[neighbor] = label;
                            stack.push((nx, ny));
                        }
                    }
                }

                components.push(Component {
                    label,
                    area,
                    start: (x, y),
                });
            }
        }

        let labels = Labels {
            width: mask.width,
            height: mask.height,
            cells,
        };
        (labels, components)
    }

    /// Moore neighbour tracing of one component's outer boundary, clockwise from its start pixel.
    fn trace(labels: &Labels, component: &Component) -> Vec<(i64, i64)> {
        let start = component.start;
        let mut outline = vec![start];
        let mut current = start;
        // Direction from `current` to the last background pixel examined.
        let mut backtrack = WEST;
        let mut first_step: Option<(i64, i64)> = None;

        // Each boundary pixel is entered at most four times.
        let max_steps = 4 * component.area + 8;
        for _ in 0..max_steps {
            let mut found = None;
            for offset in 1..=8 {
                let direction = (backtrack + offset) % 8;
                let (dx, dy) = NEIGHBORS[direction];
                let candidate = (current.0 + dx, current.1 + dy);
                if labels.is(candidate.0, candidate.1, component.label) {
                    found = Some((candidate, (backtrack + offset - 1) % 8));
                    break;
                }
            }

            // Isolated pixel.
            let Some((next, previous_direction)) = found else {
                break;
            };

            if current == start {
                match first_step {
                    None => first_step = Some(next),
                    Some(step) if step == next => break,
                    Some(_) => {}
                }
            }

            let (px, py) = NEIGHBORS[previous_direction];
            let previous = (current.0 + px, current.1 + py);
            backtrack = NEIGHBORS
                .iter()
                .position(|&(dx, dy)| (next.0 + dx, next.1 + dy) == previous)
                .unwrap_or(WEST);

            outline.push(next);
            current = next;
        }

        if outline.len() > 1 && outline.last() == outline.first() {
            outline.pop();
        }
        outline
    }
}

impl Segmenter for ThresholdSegmenter {
    fn segment(&mut self, frame: &FrameView<'_>, reference: &HsvColor) -> Vec<Region> {
        let range = self.color_range(reference);
        let mask = self.threshold(frame, &range).dilate();
        let (labels, components) = Self::label(&mask);

        let max_area = components.iter().map(|c| c.area).max().unwrap_or(0) as f64;
        let min_area = self.config.min_area_ratio * max_area;
        let scale = self.config.downscale.max(1) as f64;

        let regions: Vec<Region> = components
            .iter()
            .filter(|component| component.area as f64 > min_area)
            .map(|component| {
                let points = Self::trace(&labels, component)
                    .into_iter()
                    .map(|(x, y)| Point::new(x as f64 * scale, y as f64 * scale))
                    .collect();
                Region::new(points)
            })
            .collect();

        log::debug!(
            "segmented {} components, kept {} (min area {:.1} cells)",
            components.len(),
            regions.len(),
            min_area
        );
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob_selector::blob_selector::select_center_region;

    const RED: Pixel = Pixel::opaque(255, 0, 0);
    const GRAY: Pixel = Pixel::opaque(100, 100, 100);

    fn canvas(width: u32, height: u32, squares: &[(u32, u32, u32, u32)]) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = squares
                    .iter()
                    .any(|&(left, top, right, bottom)| x >= left && x < right && y >= top && y < bottom);
                let bytes: [u8; 4] = if inside { RED } else { GRAY }.into();
                data.extend_from_slice(&bytes);
            }
        }
        data
    }

    fn mask_from(rows: &[&str]) -> Mask {
        Mask {
            width: rows[0].len(),
            height: rows.len(),
            cells: rows
                .iter()
                .flat_map(|row| row.chars().map(|c| c == '#'))
                .collect(),
        }
    }

    #[test]
    fn range_clamps_hue_only() {
        let range = ColorRange::around(&HsvColor::new(10.0, 30.0, 240.0), &ColorRadius::default());
        assert_eq!(range.lower, HsvColor::new(0.0, -20.0, 190.0));
        assert_eq!(range.upper, HsvColor::new(35.0, 80.0, 290.0));

        let high = ColorRange::around(&HsvColor::new(250.0, 100.0, 100.0), &ColorRadius::default());
        assert_eq!(high.lower.hue, 225.0);
        assert_eq!(high.upper.hue, 255.0);
    }

    #[test]
    fn spectrum_spans_the_hue_range() {
        let range = ColorRange::around(&HsvColor::new(100.0, 200.0, 200.0), &ColorRadius::default());
        let spectrum = range.spectrum();
        assert_eq!(spectrum.len(), 50);
        assert_eq!(spectrum[0], HsvPixel::new(75, 255, 255).to_rgba());
        assert!(spectrum.iter().all(|p| p.alpha == 255));
    }

    #[test]
    fn traces_a_block_clockwise() {
        let mask = mask_from(&["###", "###", "###"]);
        let (labels, components) = ThresholdSegmenter::label(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].area, 9);
        let outline = ThresholdSegmenter::trace(&labels, &components[0]);
        assert_eq!(
            outline,
            vec![(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1)]
        );
    }

    #[test]
    fn traces_degenerate_components() {
        let mask = mask_from(&["#...", "....", "..##"]);
        let (labels, components) = ThresholdSegmenter::label(&mask);
        assert_eq!(components.len(), 2);
        assert_eq!(ThresholdSegmenter::trace(&labels, &components[0]), vec![(0, 0)]);
        assert_eq!(ThresholdSegmenter::trace(&labels, &components[1]), vec![(2, 2), (3, 2)]);
    }

    #[test]
    fn diagonal_neighbours_share_a_component() {
        let mask = mask_from(&["#..", ".#.", "..#"]);
        let (labels, components) = ThresholdSegmenter::label(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].area, 3);
        assert_eq!(
            ThresholdSegmenter::trace(&labels, &components[0]),
            vec![(0, 0), (1, 1), (2, 2), (1, 1)]
        );
    }

    #[test]
    fn dilation_grows_by_one_cell() {
        let mask = mask_from(&[".....", ".....", "..#..", ".....", "....."]).dilate();
        assert_eq!(mask.cells.iter().filter(|&&c| c).count(), 9);
        assert!(mask.get(1, 1) && mask.get(3, 3));
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn finds_the_square_matching_the_reference() {
        let data = canvas(40, 40, &[(12, 12, 28, 28)]);
        let frame = FrameView::new(40, 40, &data).unwrap();
        let reference = HsvColor::from(RED.to_hsv());

        let regions = ThresholdSegmenter::default().segment(&frame, &reference);
        assert_eq!(regions.len(), 1);
        // 4x4 cells dilated to 6x6, whose outline has 20 cells.
        assert_eq!(regions[0].len(), 20);
        let extent = regions[0].extent().unwrap();
        assert_eq!((extent.min_x, extent.max_x), (8.0, 28.0));
        assert_eq!((extent.min_y, extent.max_y), (8.0, 28.0));

        let selected = select_center_region(&regions, Point::new(20.0, 20.0)).unwrap();
        assert!(selected.is_some());
    }

    #[test]
    fn unmatched_reference_finds_nothing() {
        let data = canvas(40, 40, &[(12, 12, 28, 28)]);
        let frame = FrameView::new(40, 40, &data).unwrap();
        // Saturated blue: neither the gray background nor the red square is within range.
        let reference = HsvColor::new(171.0, 255.0, 255.0);
        assert!(ThresholdSegmenter::default().segment(&frame, &reference).is_empty());
    }

    #[test]
    fn small_components_are_filtered_by_area_ratio() {
        let data = canvas(80, 40, &[(12, 12, 28, 28), (60, 20, 64, 24)]);
        let frame = FrameView::new(80, 40, &data).unwrap();
        let reference = HsvColor::from(RED.to_hsv());

        let lenient = ThresholdSegmenter::default().segment(&frame, &reference);
        assert_eq!(lenient.len(), 2);

        let strict = ThresholdSegmenter::new(SegmenterConfig {
            min_area_ratio: 0.5,
            ..SegmenterConfig::default()
        })
        .segment(&frame, &reference);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].len(), 20);
    }

    #[test]
    fn functions_are_segmenters() {
        fn single_point(_: &FrameView<'_>, _: &HsvColor) -> Vec<Region> {
            vec![Region::from(vec![(1.0, 2.0)])]
        }

        let mut segmenter = single_point;
        let data = vec![0u8; 4];
        let frame = FrameView::new(1, 1, &data).unwrap();
        assert_eq!(segmenter.segment(&frame, &HsvColor::default()).len(), 1);
    }
}
