//! Spatial deduplication of fused text detections.

use reelsift_models::Detection;

/// Greedy first-kept-wins deduplication.
///
/// Walks `detections` in order and drops any detection whose box overlaps an
/// already kept box by more than half of the smaller of the two areas.
/// Earlier layers therefore win over later ones.
pub fn dedup_overlapping(detections: Vec<Detection>) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let duplicate = kept.iter().any(|k| overlaps_majority(k, &candidate));
        if !duplicate {
            kept.push(candidate);
        }
    }
    kept
}

fn overlaps_majority(a: &Detection, b: &Detection) -> bool {
    let overlap = a.bbox.overlap_area(&b.bbox);
    if overlap == 0 {
        return false;
    }
    let smaller = a.bbox.area().min(b.bbox.area());
    overlap * 2 > smaller
}
