// THEORY:
// A `Region` is the outline of one color-segmented area: an ordered, closed
// loop of sub-pixel points handed to us by the segmentation stage. Like
// `SmartBlob`, it is a "dumb" data container that lives for a single frame and
// has no identity across frames.
//
// The only geometry the engine needs from a region is:
// - its bounding extent (min/max on each axis), whose midpoint is the
//   region-local center;
// - a quadrant histogram of its points around some center.
//
// Quadrant classification is deliberately lopsided. On each axis a point is on
// the "low" side only when its coordinate is strictly less than the center;
// a point exactly on the line goes to the "high" side. Every point therefore
// lands in exactly one bucket, and the symmetry score's behavior at the
// boundaries depends on this exact rule, so it must not be "balanced".

/// A point in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One of the four buckets around a center. "Lower" means a smaller y coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    LowerLeft,
    UpperLeft,
    LowerRight,
    UpperRight,
}

impl Quadrant {
    /// Classifies `point` around `center`: strictly less is "low", anything else is "high".
    pub fn classify(point: Point, center: Point) -> Quadrant {
        match (point.x < center.x, point.y < center.y) {
            (true, true) => Quadrant::LowerLeft,
            (true, false) => Quadrant::UpperLeft,
            (false, true) => Quadrant::LowerRight,
            (false, false) => Quadrant::UpperRight,
        }
    }
}

/// How many points of a region fall into each quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuadrantCounts {
    pub lower_left: usize,
    pub upper_left: usize,
    pub lower_right: usize,
    pub upper_right: usize,
}

impl QuadrantCounts {
    /// Buckets every point around `center`.
    pub fn tally<'a>(points: impl IntoIterator<Item = &'a Point>, center: Point) -> Self {
        let mut counts = QuadrantCounts::default();
        for point in points {
            counts.add(Quadrant::classify(*point, center));
        }
        counts
    }

    pub fn add(&mut self, quadrant: Quadrant) {
        match quadrant {
            Quadrant::LowerLeft => self.lower_left += 1,
            Quadrant::UpperLeft => self.upper_left += 1,
            Quadrant::LowerRight => self.lower_right += 1,
            Quadrant::UpperRight => self.upper_right += 1,
        }
    }

    pub fn as_array(&self) -> [usize; 4] {
        [
            self.lower_left,
            self.upper_left,
            self.lower_right,
            self.upper_right,
        ]
    }

    pub fn total(&self) -> usize {
        self.as_array().iter().sum()
    }

    /// True when every quadrant holds at least one point.
    pub fn covers_all_quadrants(&self) -> bool {
        self.as_array().iter().all(|&count| count > 0)
    }

    /// `max - min` across the four counts.
    pub fn spread(&self) -> usize {
        let counts = self.as_array();
        let max = counts.iter().copied().max().unwrap_or(0);
        let min = counts.iter().copied().min().unwrap_or(0);
        max - min
    }
}

/// Axis-aligned extent of a region's points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingExtent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingExtent {
    /// Midpoint of the extent on each axis.
    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + (self.max_x - self.min_x) / 2.0,
            self.min_y + (self.max_y - self.min_y) / 2.0,
        )
    }
}

/// A closed outline of one segmented area.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub points: Vec<Point>,
}

impl Region {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding extent of the outline, or `None` for an empty region.
    pub fn extent(&self) -> Option<BoundingExtent> {
        let first = self.points.first()?;
        let mut extent = BoundingExtent {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for point in &self.points[1..] {
            extent.min_x = extent.min_x.min(point.x);
            extent.max_x = extent.max_x.max(point.x);
            extent.min_y = extent.min_y.min(point.y);
            extent.max_y = extent.max_y.max(point.y);
        }
        Some(extent)
    }

    pub fn quadrant_counts(&self, center: Point) -> QuadrantCounts {
        QuadrantCounts::tally(&self.points, center)
    }
}

impl From<Vec<(f64, f64)>> for Region {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Region::new(points.into_iter().map(|(x, y)| Point::new(x, y)).collect())
    }
}
