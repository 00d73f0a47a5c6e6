use crate::data::{Label, Segment, Segmentation, TrainingExample};

/// Convert a per-token label sequence into the sequence of maximal contiguous
/// runs of equal labels. Pure and deterministic: the output spans cover the
/// whole input in order, with no gaps, and no two adjacent segments share a
/// label. An empty label sequence yields an empty segmentation.
pub fn segment_labels(labels: &[Label]) -> Segmentation {
    let mut segments: Vec<Segment> = vec![];
    for (token_idx, label) in labels.iter().enumerate() {
        match segments.last_mut() {
            Some(accumulator) if accumulator.label == *label => {
                accumulator.range.end += 1;
            }
            _ => segments.push(Segment::new(label.clone(), token_idx..token_idx + 1)),
        }
    }
    Segmentation::new(segments)
}

/// Segment a training example's gold label sequence
pub fn segment(example: &TrainingExample) -> Segmentation {
    segment_labels(&example.labels)
}
