// THEORY:
// The `BlobSelector` picks the one segmented region the user is pointing the
// camera at. The user is told to place the mole in the middle of the frame, so
// "the region of interest" is defined purely geometrically: a region that
// straddles the screen center, i.e. has at least one outline point in each of
// the four quadrants around it.
//
// Key principles:
// 1.  **Screen-centered test**: quadrants are taken around the frame's
//     geometric center, not around the region's own center. A small region
//     sitting off to one side never qualifies, no matter how well it matches
//     the reference color.
// 2.  **First hit wins**: regions are scanned in the order the segmentation
//     stage returned them and scanning stops at the first region covering all
//     four quadrants. There is no "best of many" comparison.
// 3.  **Extent for the winner only**: the bounding extent, and with it the
//     region-local center, is computed only for the selected region.
// 4.  **Stateless Utility**: nothing is remembered between frames.

use crate::core_modules::region::{BoundingExtent, Point, Region};
use crate::error::ScanError;

pub mod blob_selector {
    use super::*;

    /// The region straddling the screen center, together with its extent.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct CenterRegion<'a> {
        /// Position of the region in the list passed to `select_center_region`.
        pub index: usize,
        pub region: &'a Region,
        pub extent: BoundingExtent,
    }

    impl CenterRegion<'_> {
        /// Midpoint of the region's bounding extent.
        pub fn local_center(&self) -> Point {
            self.extent.center()
        }
    }

    /// True when `region` has at least one point in each quadrant around `screen_center`.
    pub fn straddles(region: &Region, screen_center: Point) -> bool {
        region.quadrant_counts(screen_center).covers_all_quadrants()
    }

    /// Returns the first region that straddles `screen_center`, if any.
    pub fn select_center_region(
        regions: &[Region],
        screen_center: Point,
    ) -> Result<Option<CenterRegion<'_>>, ScanError> {
        let Some((index, region)) = regions
            .iter()
            .enumerate()
            .find(|(_, region)| straddles(region, screen_center))
        else {
            log::trace!("none of {} regions straddles the screen center", regions.len());
            return Ok(None);
        };

        let extent = region.extent().ok_or(ScanError::DegenerateRegion)?;
        log::trace!("region {index} straddles the screen center, extent {extent:?}");

        Ok(Some(CenterRegion {
            index,
            region,
            extent,
        }))
    }
}
