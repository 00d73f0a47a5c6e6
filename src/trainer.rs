use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::TrainingExample;
use crate::errors::{
    EmptyCorpusError, InconsistentLabelError, TrainError, TrainRootError, TrainingCancelledError,
};
use crate::segmenter::segment;
use crate::symbol_table::LabelSymbolTable;
use crate::tagger::{TaggerModel, WeightTotals};

const DEFAULT_EPOCHS: usize = 10;

/// Builder configuring and running a training run of the semi-Markov tagger.
///
/// Training fits the segment and transition weights with an averaged
/// structured perceptron: each epoch decodes every example with the current
/// weights and applies a +gold/-predicted update on every mismatch. The
/// procedure is deterministic — fixed corpus order, no randomness — so the
/// same corpus always yields the same model.
///
/// Training is a single long-running CPU-bound batch computation. A shared
/// cancellation flag, checked between epochs, lets a caller abort a long run;
/// cancellation fails the run without touching any previously persisted model
/// (persistence is a separate, atomic `TaggerModel::dump`).
pub struct TaggerTrainer<'a> {
    examples: &'a [TrainingExample],
    epochs: usize,
    max_segment_length: Option<usize>,
    cancellation_flag: Option<Arc<AtomicBool>>,
}

impl<'a> TaggerTrainer<'a> {
    /// Instantiate a new TaggerTrainer over a segmented training corpus
    pub fn new(examples: &'a [TrainingExample]) -> TaggerTrainer<'a> {
        TaggerTrainer {
            examples,
            epochs: DEFAULT_EPOCHS,
            max_segment_length: None,
            cancellation_flag: None,
        }
    }

    /// Set the maximum number of passes over the corpus. Training stops early
    /// when a full pass completes without a single correction.
    pub fn epochs(mut self, epochs: usize) -> TaggerTrainer<'a> {
        self.epochs = epochs;
        self
    }

    /// Override the labeled-segment length cap considered during decoding.
    /// Defaults to the longest labeled span observed in the corpus, which
    /// keeps the segmental search near-linear in practice.
    pub fn max_segment_length(mut self, max_segment_length: usize) -> TaggerTrainer<'a> {
        self.max_segment_length = Some(max_segment_length);
        self
    }

    /// Install a cancellation flag checked between epochs
    pub fn cancellation_flag(mut self, flag: Arc<AtomicBool>) -> TaggerTrainer<'a> {
        self.cancellation_flag = Some(flag);
        self
    }

    /// Run the training and produce a fitted, immutable model
    pub fn train(self) -> Result<TaggerModel, TrainError> {
        if self.examples.is_empty() {
            return Err(TrainError {
                cause: TrainRootError::EmptyCorpusError(EmptyCorpusError),
            });
        }

        // First pass: validate the gold segmentations, collect the label
        // vocabulary and the longest labeled span
        let mut labels = LabelSymbolTable::new();
        let mut observed_max_length = 1;
        let mut gold_segmentations = Vec::with_capacity(self.examples.len());
        for example in self.examples {
            if example.tokens.len() != example.labels.len() {
                return Err(inconsistent(
                    example.id,
                    format!(
                        "{} tokens but {} labels",
                        example.tokens.len(),
                        example.labels.len()
                    ),
                ));
            }
            let segmentation = segment(example);
            if !segmentation.is_contiguous_cover(example.tokens.len()) {
                return Err(inconsistent(
                    example.id,
                    "spans do not form a contiguous cover of the token sequence".to_string(),
                ));
            }
            for gold_segment in &segmentation.segments {
                labels.add_label(&gold_segment.label);
                if !gold_segment.label.is_outside() {
                    observed_max_length = observed_max_length.max(gold_segment.range.len());
                }
            }
            gold_segmentations.push(segmentation);
        }
        let max_segment_length = self.max_segment_length.unwrap_or(observed_max_length);

        info!(
            "training tagger: {} examples, {} labels, max segment length {}",
            self.examples.len(),
            labels.len(),
            max_segment_length
        );

        let mut model = TaggerModel::with_vocabulary(labels, max_segment_length);
        let mut totals = WeightTotals::new(model.n_labels());
        let mut step = 0.0;

        for epoch in 0..self.epochs {
            if let Some(ref flag) = self.cancellation_flag {
                if flag.load(Ordering::Relaxed) {
                    info!("training cancelled during epoch {}", epoch + 1);
                    return Err(TrainError {
                        cause: TrainRootError::TrainingCancelledError(TrainingCancelledError),
                    });
                }
            }
            let mut corrections = 0;
            for (example, gold) in self.examples.iter().zip(&gold_segmentations) {
                step += 1.0;
                let token_texts: Vec<&str> =
                    example.tokens.iter().map(String::as_str).collect();
                let predicted = model.decode(&token_texts);
                if predicted.segments != gold.segments {
                    corrections += 1;
                    model.update_weights(&token_texts, gold, 1.0, step, &mut totals);
                    model.update_weights(&token_texts, &predicted, -1.0, step, &mut totals);
                }
            }
            info!(
                "epoch {}/{}: {} corrections over {} examples",
                epoch + 1,
                self.epochs,
                corrections,
                self.examples.len()
            );
            if corrections == 0 {
                debug!("converged after {} epochs", epoch + 1);
                break;
            }
        }

        model.average(&totals, step);
        debug!("model holds {} interned segment features", model.n_features());
        Ok(model)
    }
}

fn inconsistent(example_id: usize, detail: String) -> TrainError {
    TrainError {
        cause: TrainRootError::InconsistentLabelError(InconsistentLabelError { example_id, detail }),
    }
}
