// THEORY:
// The `SymmetryScorer` reduces the selected region to one number. It re-centers
// on the region itself (the midpoint of its bounding extent), buckets every
// outline point into the four quadrants around that point with the same
// strict-less tie-break the selector uses, and reports how far apart the
// fullest and emptiest quadrants are.
//
// A perfectly balanced outline scores 0. An outline whose points all fall in a
// single quadrant scores its point count. This is a coarse screening heuristic,
// nothing more: it depends on how densely the segmenter sampled each edge.

use crate::core_modules::region::{Point, QuadrantCounts, Region};
use crate::error::{Result, ScanError};

/// `max(counts) - min(counts)`; lower is more symmetric.
pub type SymmetryScore = usize;

/// The score together with what it was computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetryReport {
    /// Region-local center the points were bucketed around.
    pub center: Point,
    pub counts: QuadrantCounts,
    pub score: SymmetryScore,
}

/// Scores the quadrant balance of `region` around its own center.
pub fn score_symmetry(region: &Region) -> Result<SymmetryReport> {
    let extent = region.extent().ok_or(ScanError::DegenerateRegion)?;
    let center = extent.center();
    let counts = region.quadrant_counts(center);
    let score = counts.spread();

    log::trace!("symmetry around ({:.1}, {:.1}): {counts:?} -> {score}", center.x, center.y);

    Ok(SymmetryReport {
        center,
        counts,
        score,
    })
}
