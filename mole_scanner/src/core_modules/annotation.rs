// THEORY:
// The engine decides *what* to draw and *where*; it does not decide how pixels
// are blended. An `Annotation` is a plain value describing one overlay element
// (a line, an outline, a marker, a label, a color patch). A frame's analysis
// produces a list of them, and a `Canvas` turns that list into pixels.
//
// Two canvases exist:
// - `RgbaCanvas` (here) rasterizes straight into the RGBA frame buffer. It has
//   no font, so text annotations are skipped; the numbers they carry are also
//   available programmatically on the frame's report.
// - The visual tester implements `Canvas` over OpenCV's drawing calls, which do
//   render text.

use crate::core_modules::frame::{FrameMut, Rect};
use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::region::Point;

/// One overlay element.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Line {
        from: Point,
        to: Point,
        color: Pixel,
        thickness: u32,
    },
    /// A closed polygon through `points`.
    Outline {
        points: Vec<Point>,
        color: Pixel,
        thickness: u32,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Pixel,
        filled: bool,
    },
    /// Text whose baseline starts at `origin`.
    Text {
        text: String,
        origin: Point,
        color: Pixel,
        scale: f64,
    },
    FillRect {
        rect: Rect,
        color: Pixel,
    },
    /// A row-major block of pixels, `width` pixels per row, placed with its top-left at `(left, top)`.
    Patch {
        left: u32,
        top: u32,
        width: u32,
        pixels: Vec<Pixel>,
    },
}

/// Drawing primitives an annotation can be rendered with.
pub trait Canvas {
    fn line(&mut self, from: Point, to: Point, color: Pixel, thickness: u32);

    fn circle(&mut self, center: Point, radius: f64, color: Pixel, filled: bool);

    fn text(&mut self, text: &str, origin: Point, color: Pixel, scale: f64);

    fn fill_rect(&mut self, rect: Rect, color: Pixel);

    fn blit(&mut self, left: u32, top: u32, width: u32, pixels: &[Pixel]);

    /// Closed polygon; the default joins consecutive points with `line`.
    fn polyline(&mut self, points: &[Point], color: Pixel, thickness: u32) {
        match points {
            [] => {}
            [single] => self.line(*single, *single, color, thickness),
            _ => {
                for pair in points.windows(2) {
                    self.line(pair[0], pair[1], color, thickness);
                }
                self.line(points[points.len() - 1], points[0], color, thickness);
            }
        }
    }
}

impl Annotation {
    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        match self {
            Annotation::Line {
                from,
                to,
                color,
                thickness,
            } => canvas.line(*from, *to, *color, *thickness),
            Annotation::Outline {
                points,
                color,
                thickness,
            } => canvas.polyline(points, *color, *thickness),
            Annotation::Circle {
                center,
                radius,
                color,
                filled,
            } => canvas.circle(*center, *radius, *color, *filled),
            Annotation::Text {
                text,
                origin,
                color,
                scale,
            } => canvas.text(text, *origin, *color, *scale),
            Annotation::FillRect { rect, color } => canvas.fill_rect(*rect, *color),
            Annotation::Patch {
                left,
                top,
                width,
                pixels,
            } => canvas.blit(*left, *top, *width, pixels),
        }
    }
}

/// Draws every annotation, in order.
pub fn render<C: Canvas + ?Sized>(annotations: &[Annotation], canvas: &mut C) {
    for annotation in annotations {
        annotation.draw(canvas);
    }
}

/// Rasterizes annotations directly into an RGBA frame.
pub struct RgbaCanvas<'f, 'a> {
    frame: &'f mut FrameMut<'a>,
}

impl<'f, 'a> RgbaCanvas<'f, 'a> {
    pub fn new(frame: &'f mut FrameMut<'a>) -> Self {
        Self { frame }
    }

    /// Paints a square brush of side `thickness` centered on `(x, y)`.
    fn stamp(&mut self, x: i64, y: i64, color: Pixel, thickness: u32) {
        let reach = (thickness.max(1) as i64 - 1) / 2;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                self.frame.put_pixel(x + dx, y + dy, color);
            }
        }
    }
}

/// Liang-Barsky clip of the segment `from -> to` to `[min.x, max.x] x [min.y, max.y]`.
///
/// Returns `None` when nothing of the segment is inside or an endpoint is not finite.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    if ![from.x, from.y, to.x, to.y].iter().all(|v| v.is_finite()) {
        return None;
    }

    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut enter = 0.0f64;
    let mut leave = 1.0f64;
    for (p, q) in [
        (-dx, from.x - min.x),
        (dx, max.x - from.x),
        (-dy, from.y - min.y),
        (dy, max.y - from.y),
    ] {
        if p == 0.0 {
            // Parallel to this edge.
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            leave = leave.min(t);
        }
        if enter > leave {
            return None;
        }
    }

    Some((
        Point::new(from.x + enter * dx, from.y + enter * dy),
        Point::new(from.x + leave * dx, from.y + leave * dy),
    ))
}

impl Canvas for RgbaCanvas<'_, '_> {
    fn line(&mut self, from: Point, to: Point, color: Pixel, thickness: u32) {
        // Walk only the part of the segment a brush stamp can reach.
        let margin = (thickness.max(1) as f64 - 1.0) / 2.0 + 1.0;
        let min = Point::new(-margin, -margin);
        let max = Point::new(
            self.frame.width() as f64 - 1.0 + margin,
            self.frame.height() as f64 - 1.0 + margin,
        );
        let Some((from, to)) = clip_segment(from, to, min, max) else {
            return;
        };

        // Bresenham over rounded endpoints.
        let (mut x, mut y) = (from.x.round() as i64, from.y.round() as i64);
        let (end_x, end_y) = (to.x.round() as i64, to.y.round() as i64);
        let dx = (end_x - x).abs();
        let dy = -(end_y - y).abs();
        let step_x = if x < end_x { 1 } else { -1 };
        let step_y = if y < end_y { 1 } else { -1 };
        let mut error = dx + dy;

        loop {
            self.stamp(x, y, color, thickness);
            if x == end_x && y == end_y {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += step_x;
            }
            if doubled <= dx {
                error += dx;
                y += step_y;
            }
        }
    }

    fn circle(&mut self, center: Point, radius: f64, color: Pixel, filled: bool) {
        let reach = radius.ceil() as i64 + 1;
        let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let inside = if filled {
                    distance <= radius
                } else {
                    (distance - radius).abs() <= 0.5
                };
                if inside {
                    self.frame.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn text(&mut self, text: &str, origin: Point, _color: Pixel, _scale: f64) {
        log::trace!("no font on the RGBA canvas, skipping {text:?} at ({:.0}, {:.0})", origin.x, origin.y);
    }

    fn fill_rect(&mut self, rect: Rect, color: Pixel) {
        let rect = rect.clip(self.frame.width(), self.frame.height());
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.frame.put_pixel(x as i64, y as i64, color);
            }
        }
    }

    fn blit(&mut self, left: u32, top: u32, width: u32, pixels: &[Pixel]) {
        if width == 0 {
            return;
        }
        for (index, pixel) in pixels.iter().enumerate() {
            let x = left as i64 + (index as u32 % width) as i64;
            let y = top as i64 + (index as u32 / width) as i64;
            self.frame.put_pixel(x, y, *pixel);
        }
    }
}
