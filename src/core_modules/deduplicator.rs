// THEORY:
// The `deduplicator` removes redundant detections of the same physical
// object. Automatic mask generators frequently report several overlapping
// masks for one dot, each with its own confidence score; this module keeps
// the most confident version of each object and discards the rest.
//
// Key architectural principles & algorithm steps:
// 1.  **Confidence ranking**: masks are sorted by confidence, highest
//     first, with a stable sort so equal scores keep their original
//     relative order. The ranking fixes which mask "wins" every conflict
//     before any pair is compared, making the output deterministic.
// 2.  **Single-pass suppression**: each kept mask is compared against
//     every lower-ranked mask still marked keep. When the pixel
//     intersection divided by the smaller mask's area exceeds the
//     threshold, the lower-ranked mask is discarded. Decisions are final;
//     there is no iterative re-scoring after a discard.
// 3.  **Swappable strategy**: an externally supplied `OverlapStrategy` can
//     replace the built-in algorithm entirely. If it is absent or fails,
//     the built-in greedy suppression runs instead, so deduplication never
//     becomes the reason an analysis call dies.

use std::cmp::Ordering;

use log::debug;

use crate::core_modules::mask::RawMask;

/// An externally supplied replacement for the built-in suppression
/// algorithm. Implementations receive the filtered masks exactly as the
/// pipeline would and return the subset to keep.
pub trait OverlapStrategy: Send + Sync {
    fn apply(&self, masks: &[RawMask], overlap_threshold: f64) -> anyhow::Result<Vec<RawMask>>;
}

/// Deduplicates `masks`, delegating to `strategy` when one is configured
/// and falling back to [`greedy_suppress`] when it is absent or fails.
pub fn deduplicate(
    masks: Vec<RawMask>,
    overlap_threshold: f64,
    strategy: Option<&dyn OverlapStrategy>,
) -> Vec<RawMask> {
    if masks.len() <= 1 {
        return masks;
    }

    if let Some(strategy) = strategy {
        match strategy.apply(&masks, overlap_threshold) {
            Ok(deduplicated) => return deduplicated,
            Err(err) => {
                debug!("overlap strategy failed, using built-in suppression: {err}");
            }
        }
    }

    greedy_suppress(masks, overlap_threshold)
}

/// The built-in suppression algorithm: confidence-ranked, single-pass,
/// greedy. Returns the retained masks in confidence-sorted order.
pub fn greedy_suppress(mut masks: Vec<RawMask>, overlap_threshold: f64) -> Vec<RawMask> {
    if masks.len() <= 1 {
        return masks;
    }

    // Stable sort: ties keep their original relative order.
    masks.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept = vec![true; masks.len()];
    for i in 0..masks.len() {
        if !kept[i] {
            continue;
        }
        let area_i = masks[i].area_px();
        for j in (i + 1)..masks.len() {
            if !kept[j] {
                continue;
            }
            let intersection = masks[i].grid.intersection_count(&masks[j].grid);
            if intersection == 0 {
                continue;
            }
            // A zero-area mask can neither suppress nor be suppressed.
            let smaller = area_i.min(masks[j].area_px());
            if smaller > 0 && intersection as f64 / smaller as f64 > overlap_threshold {
                kept[j] = false;
            }
        }
    }

    masks
        .into_iter()
        .zip(kept)
        .filter_map(|(mask, keep)| keep.then_some(mask))
        .collect()
}
