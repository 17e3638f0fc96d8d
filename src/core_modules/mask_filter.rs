//! Area-ceiling filtering of raw masks.
//!
//! The segmentation capability occasionally reports large background
//! regions as candidate objects. Everything above the configured area
//! ceiling is dropped before suppression so oversized masks never compete
//! with real detections.

use crate::core_modules::mask::RawMask;

/// Returns the subsequence of `masks` whose area is at or below
/// `max_area_px`, preserving the input order. The area is the reported
/// value when present and the set-pixel count otherwise.
pub fn filter_by_area(masks: Vec<RawMask>, max_area_px: u64) -> Vec<RawMask> {
    masks
        .into_iter()
        .filter(|mask| mask.area_px() <= max_area_px)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::mask::MaskGrid;

    fn mask_with_area(area: u64) -> RawMask {
        RawMask::with_area(MaskGrid::new(4, 4), area, 0.5)
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(filter_by_area(Vec::new(), 10_000).is_empty());
    }

    #[test]
    fn ceiling_is_inclusive() {
        let kept = filter_by_area(vec![mask_with_area(100), mask_with_area(101)], 100);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].area_px(), 100);
    }

    #[test]
    fn order_is_preserved() {
        let masks = vec![
            mask_with_area(5),
            mask_with_area(500),
            mask_with_area(3),
            mask_with_area(8),
        ];
        let kept = filter_by_area(masks, 100);
        let areas: Vec<u64> = kept.iter().map(RawMask::area_px).collect();
        assert_eq!(areas, vec![5, 3, 8]);
    }

    #[test]
    fn counted_area_is_used_when_none_reported() {
        // 16 set pixels, no reported area.
        let full = RawMask::new(MaskGrid::from_fn(4, 4, |_, _| true), 0.5);
        assert!(filter_by_area(vec![full.clone()], 15).is_empty());
        assert_eq!(filter_by_area(vec![full], 16).len(), 1);
    }
}
