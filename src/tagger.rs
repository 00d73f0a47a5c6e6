use std::fs;
use std::ops::Range;
use std::path::Path;

use fnv::FnvHashMap as HashMap;
use rmp_serde::{from_read, Serializer};
use serde::Serialize;

use crate::constants::{MODEL_FILENAME, MODEL_FORMAT_VERSION, METADATA_FILENAME};
use crate::data::{Label, Segmentation, Token};
use crate::errors::{
    DeserializationError, DumpError, LoadError, ModelFormatError, SerializationError, TagError,
    UntrainedModelError,
};
use crate::segmenter::segment_labels;
use crate::symbol_table::{FeatureSymbolTable, LabelSymbolTable, OUTSIDE_LABEL_IDX};

// Segment lengths are bucketed together above this value in the length feature
const LEN_FEATURE_CAP: usize = 6;

/// Extract the feature strings of a candidate segment: its tokens, the joined
/// phrase, first/last tokens, a capped length bucket and the boundary context
/// tokens. Everything is lowercased so that casing differences between the
/// corpus and live queries don't fragment the weights.
pub(crate) fn segment_features(tokens: &[&str], range: &Range<usize>) -> Vec<String> {
    let span = &tokens[range.start..range.end];
    let mut features = Vec::with_capacity(span.len() + 6);
    for token in span {
        features.push(format!("tok={}", token.to_lowercase()));
    }
    features.push(format!("phrase={}", span.join(" ").to_lowercase()));
    features.push(format!("first={}", span[0].to_lowercase()));
    features.push(format!("last={}", span[span.len() - 1].to_lowercase()));
    features.push(format!("len={}", range.len().min(LEN_FEATURE_CAP)));
    features.push(match range.start {
        0 => "prev=<bos>".to_string(),
        start => format!("prev={}", tokens[start - 1].to_lowercase()),
    });
    features.push(if range.end == tokens.len() {
        "next=<eos>".to_string()
    } else {
        format!("next={}", tokens[range.end].to_lowercase())
    });
    features
}

/// Running totals used by the trainer to average the perceptron weights.
/// For an update of `delta` applied at step `t`, the totals accumulate
/// `t * delta`; the averaged weight is then `w - totals / t_final`.
#[derive(Debug, Default)]
pub(crate) struct WeightTotals {
    feature: HashMap<u32, Vec<f64>>,
    start: Vec<f64>,
    transition: Vec<Vec<f64>>,
}

impl WeightTotals {
    pub(crate) fn new(n_labels: usize) -> WeightTotals {
        WeightTotals {
            feature: HashMap::default(),
            start: vec![0.0; n_labels],
            transition: vec![vec![0.0; n_labels]; n_labels],
        }
    }
}

/// Trained parameter set of the semi-Markov tagger. Owns the label vocabulary
/// learned from the corpus, the interned segment features and the fitted
/// weights. Immutable once training completes: inference takes `&self`,
/// performs no I/O, and a loaded model can be shared (e.g. behind an `Arc`)
/// across any number of concurrent callers.
#[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct TaggerModel {
    // Label vocabulary; the outside label sits at index 0
    labels: LabelSymbolTable,
    // Interned segment feature strings
    features: FeatureSymbolTable,
    // Per-feature vectors of per-label emission weights
    feature_weights: HashMap<u32, Vec<f64>>,
    // transition_weights[prev][next]
    transition_weights: Vec<Vec<f64>>,
    // Weights of opening the sequence with each label
    start_weights: Vec<f64>,
    // Length cap for labeled candidate segments, taken from the longest
    // labeled span observed in training. The outside label is exempt so the
    // all-unlabeled segmentation always remains reachable.
    max_segment_length: usize,
}

#[derive(Serialize, Deserialize)]
struct ModelConfig {
    version: String,
    model_filename: String,
    labels: Vec<String>,
    max_segment_length: usize,
}

impl TaggerModel {
    /// Fresh zero-weight model over a fixed vocabulary, ready for training
    pub(crate) fn with_vocabulary(
        labels: LabelSymbolTable,
        max_segment_length: usize,
    ) -> TaggerModel {
        let n_labels = labels.len();
        TaggerModel {
            labels,
            features: FeatureSymbolTable::default(),
            feature_weights: HashMap::default(),
            transition_weights: vec![vec![0.0; n_labels]; n_labels],
            start_weights: vec![0.0; n_labels],
            max_segment_length: max_segment_length.max(1),
        }
    }

    fn is_trained(&self) -> bool {
        !self.start_weights.is_empty()
    }

    pub(crate) fn n_labels(&self) -> usize {
        self.labels.len()
    }

    pub(crate) fn n_features(&self) -> usize {
        self.features.len()
    }

    /// The label vocabulary learned at training time
    pub fn label_vocabulary(&self) -> &[Label] {
        self.labels.labels()
    }

    fn lookup_features(&self, tokens: &[&str], range: &Range<usize>) -> Vec<u32> {
        segment_features(tokens, range)
            .iter()
            .filter_map(|feature| self.features.find_symbol(feature).cloned())
            .collect()
    }

    fn emission_score(&self, feature_ids: &[u32], label_idx: usize) -> f64 {
        feature_ids
            .iter()
            .map(|feature_idx| {
                self.feature_weights
                    .get(feature_idx)
                    .map(|weights| weights[label_idx])
                    .unwrap_or(0.0)
            })
            .sum()
    }

    /// Find the highest-scoring label-segmentation of the input tokens.
    ///
    /// Dynamic programming over all ways to partition the token sequence into
    /// segments (the semi-Markov analogue of Viterbi): `best[end][y]` is the
    /// best score of a segmentation of `tokens[0..end]` whose last segment
    /// carries label `y`. Labeled segments are capped at the longest span
    /// length observed in training; the outside label has no cap, so a valid
    /// segmentation always exists. Ties are broken by strict improvement in a
    /// fixed scan order, so the earliest-found optimum wins deterministically.
    pub fn tag(&self, tokens: &[Token]) -> Result<Segmentation, TagError> {
        if !self.is_trained() {
            return Err(TagError {
                cause: UntrainedModelError,
            });
        }
        let token_texts: Vec<&str> = tokens.iter().map(|token| token.text.as_str()).collect();
        Ok(self.decode(&token_texts))
    }

    pub(crate) fn decode(&self, tokens: &[&str]) -> Segmentation {
        let n_tokens = tokens.len();
        if n_tokens == 0 {
            return Segmentation::default();
        }
        let n_labels = self.labels.len();
        // Sentinel previous-label index marking the start of the sequence
        let start_sentinel = n_labels;

        let mut best = vec![vec![f64::NEG_INFINITY; n_labels]; n_tokens + 1];
        // back[end][y] = (segment start, previous label index)
        let mut back = vec![vec![(0usize, start_sentinel); n_labels]; n_tokens + 1];

        for end in 1..=n_tokens {
            for length in 1..=end {
                let start = end - length;
                let range = start..end;
                let feature_ids = self.lookup_features(tokens, &range);
                for label_idx in 0..n_labels {
                    if label_idx != OUTSIDE_LABEL_IDX && length > self.max_segment_length {
                        continue;
                    }
                    let emission = self.emission_score(&feature_ids, label_idx);
                    if start == 0 {
                        let score = self.start_weights[label_idx] + emission;
                        if score > best[end][label_idx] {
                            best[end][label_idx] = score;
                            back[end][label_idx] = (0, start_sentinel);
                        }
                    } else {
                        for prev_idx in 0..n_labels {
                            if best[start][prev_idx] == f64::NEG_INFINITY {
                                continue;
                            }
                            let score = best[start][prev_idx]
                                + self.transition_weights[prev_idx][label_idx]
                                + emission;
                            if score > best[end][label_idx] {
                                best[end][label_idx] = score;
                                back[end][label_idx] = (start, prev_idx);
                            }
                        }
                    }
                }
            }
        }

        let mut best_label = OUTSIDE_LABEL_IDX;
        let mut best_score = best[n_tokens][OUTSIDE_LABEL_IDX];
        for label_idx in 0..n_labels {
            if best[n_tokens][label_idx] > best_score {
                best_score = best[n_tokens][label_idx];
                best_label = label_idx;
            }
        }

        // Traceback into a per-token label sequence, then merge adjacent equal
        // labels so the output honors the segmentation invariant
        let mut token_labels = vec![Label::outside(); n_tokens];
        let mut end = n_tokens;
        let mut label_idx = best_label;
        while end > 0 {
            let (start, prev_idx) = back[end][label_idx];
            let label = self
                .labels
                .find_index(label_idx)
                .cloned()
                .unwrap_or_else(Label::outside);
            for token_idx in start..end {
                token_labels[token_idx] = label.clone();
            }
            end = start;
            if end > 0 {
                label_idx = prev_idx;
            }
        }
        let mut segmentation = segment_labels(&token_labels);
        segmentation.score = Some(best_score);
        segmentation
    }

    /// Apply a perceptron update of `delta` to every feature and transition
    /// fired by the segmentation, accumulating the averaging totals
    pub(crate) fn update_weights(
        &mut self,
        tokens: &[&str],
        segmentation: &Segmentation,
        delta: f64,
        timestamp: f64,
        totals: &mut WeightTotals,
    ) {
        let n_labels = self.labels.len();
        let mut prev: Option<usize> = None;
        for segment in &segmentation.segments {
            let label_idx = self
                .labels
                .find_label(&segment.label)
                .unwrap_or(OUTSIDE_LABEL_IDX);
            for feature in segment_features(tokens, &segment.range) {
                let feature_idx = self.features.add_symbol(feature);
                let weights = self
                    .feature_weights
                    .entry(feature_idx)
                    .or_insert_with(|| vec![0.0; n_labels]);
                weights[label_idx] += delta;
                let accumulated = totals
                    .feature
                    .entry(feature_idx)
                    .or_insert_with(|| vec![0.0; n_labels]);
                accumulated[label_idx] += timestamp * delta;
            }
            match prev {
                None => {
                    self.start_weights[label_idx] += delta;
                    totals.start[label_idx] += timestamp * delta;
                }
                Some(prev_idx) => {
                    self.transition_weights[prev_idx][label_idx] += delta;
                    totals.transition[prev_idx][label_idx] += timestamp * delta;
                }
            }
            prev = Some(label_idx);
        }
    }

    /// Replace the raw weights with their average over all training steps
    pub(crate) fn average(&mut self, totals: &WeightTotals, n_steps: f64) {
        if n_steps == 0.0 {
            return;
        }
        for (feature_idx, weights) in self.feature_weights.iter_mut() {
            if let Some(accumulated) = totals.feature.get(feature_idx) {
                for (weight, total) in weights.iter_mut().zip(accumulated) {
                    *weight -= total / n_steps;
                }
            }
        }
        for (weight, total) in self.start_weights.iter_mut().zip(&totals.start) {
            *weight -= total / n_steps;
        }
        for (row, total_row) in self.transition_weights.iter_mut().zip(&totals.transition) {
            for (weight, total) in row.iter_mut().zip(total_row) {
                *weight -= total / n_steps;
            }
        }
    }

    fn get_config(&self) -> ModelConfig {
        ModelConfig {
            version: MODEL_FORMAT_VERSION.to_string(),
            model_filename: MODEL_FILENAME.to_string(),
            labels: self
                .labels
                .labels()
                .iter()
                .map(|label| label.to_string())
                .collect(),
            max_segment_length: self.max_segment_length,
        }
    }

    /// Dump the model to a folder: a JSON metadata file carrying the format
    /// version next to a MessagePack blob with the weights. The dump is
    /// staged in a temporary sibling folder and renamed into place on
    /// success, so a crashed or cancelled dump never leaves a partial model
    /// at the target path.
    pub fn dump<P: AsRef<Path>>(&self, folder_name: P) -> Result<(), DumpError> {
        let target = folder_name.as_ref();
        let staging = target.with_extension("tmp");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|cause| DumpError {
                cause: SerializationError::Io {
                    path: staging.clone(),
                    cause,
                },
            })?;
        }
        fs::create_dir_all(&staging).map_err(|cause| DumpError {
            cause: SerializationError::Io {
                path: staging.clone(),
                cause,
            },
        })?;

        let config = self.get_config();
        let metadata_path = staging.join(METADATA_FILENAME);
        let writer = fs::File::create(&metadata_path).map_err(|cause| DumpError {
            cause: SerializationError::Io {
                path: metadata_path.clone(),
                cause,
            },
        })?;
        serde_json::to_writer(writer, &config).map_err(|cause| DumpError {
            cause: SerializationError::InvalidConfigFormat {
                path: metadata_path.clone(),
                cause,
            },
        })?;

        let model_path = staging.join(&config.model_filename);
        let mut writer = fs::File::create(&model_path).map_err(|cause| DumpError {
            cause: SerializationError::Io {
                path: model_path.clone(),
                cause,
            },
        })?;
        self.serialize(&mut Serializer::new(&mut writer))
            .map_err(|cause| DumpError {
                cause: SerializationError::ModelSerializationError {
                    path: model_path.clone(),
                    cause,
                },
            })?;

        if target.exists() {
            fs::remove_dir_all(target).map_err(|cause| DumpError {
                cause: SerializationError::Io {
                    path: target.to_path_buf(),
                    cause,
                },
            })?;
        }
        fs::rename(&staging, target).map_err(|cause| DumpError {
            cause: SerializationError::Io {
                path: target.to_path_buf(),
                cause,
            },
        })
    }

    /// Load a model from a folder previously written by `dump`. The metadata
    /// format version is checked before the blob is deserialized: an
    /// incompatible dump fails closed with a `ModelFormatError` instead of
    /// silently producing garbage tags.
    pub fn from_folder<P: AsRef<Path>>(folder_name: P) -> Result<TaggerModel, LoadError> {
        let metadata_path = folder_name.as_ref().join(METADATA_FILENAME);
        let metadata_file = fs::File::open(&metadata_path).map_err(|cause| LoadError {
            cause: DeserializationError::Io {
                path: metadata_path.clone(),
                cause,
            },
        })?;
        let config: ModelConfig =
            serde_json::from_reader(metadata_file).map_err(|cause| LoadError {
                cause: DeserializationError::ReadConfigError {
                    path: metadata_path,
                    cause,
                },
            })?;

        if config.version != MODEL_FORMAT_VERSION {
            return Err(LoadError {
                cause: DeserializationError::FormatError(ModelFormatError {
                    found: config.version,
                    expected: MODEL_FORMAT_VERSION.to_string(),
                }),
            });
        }

        let model_path = folder_name.as_ref().join(&config.model_filename);
        let reader = fs::File::open(&model_path).map_err(|cause| LoadError {
            cause: DeserializationError::Io {
                path: model_path.clone(),
                cause,
            },
        })?;
        from_read(reader).map_err(|cause| LoadError {
            cause: DeserializationError::ModelDeserializationError {
                path: model_path,
                cause,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate tempfile;

    use self::tempfile::tempdir;
    use super::*;
    use crate::data::tokenize;
    use crate::trainer::TaggerTrainer;
    use crate::TrainingExample;

    fn trained_fixture_model() -> TaggerModel {
        let examples = vec![
            TrainingExample::new(
                0,
                vec!["the", "martian", "in", "san", "francisco", "tomorrow"],
                vec![
                    "MOVIE_NAME",
                    "MOVIE_NAME",
                    "PREPOSITION",
                    "THEATER_LOCATION",
                    "THEATER_LOCATION",
                    "TIME_EXPRESSION",
                ],
            ),
            TrainingExample::new(
                1,
                vec!["amc", "next", "wednesday"],
                vec!["THEATER_NAME", "TIME_EXPRESSION", "TIME_EXPRESSION"],
            ),
        ];
        TaggerTrainer::new(&examples).epochs(20).train().unwrap()
    }

    #[test]
    fn test_untrained_model_cannot_tag() {
        let model = TaggerModel::default();
        let tokens = tokenize("the martian");
        assert!(model.tag(&tokens).is_err());
    }

    #[test]
    fn test_empty_input_yields_empty_segmentation() {
        let model = trained_fixture_model();
        let segmentation = model.tag(&[]).unwrap();
        assert!(segmentation.is_empty());
    }

    #[test]
    fn test_degenerate_model_still_covers_the_input() {
        // A zero-weight model must fall back to the all-unlabeled segmentation
        let model = TaggerModel::with_vocabulary(LabelSymbolTable::new(), 1);
        let tokens = tokenize("an utterly unknown query of many many tokens");
        let segmentation = model.tag(&tokens).unwrap();
        assert!(segmentation.is_contiguous_cover(tokens.len()));
        assert_eq!(1, segmentation.segments.len());
        assert!(segmentation.segments[0].label.is_outside());
    }

    #[test]
    fn test_trained_model_covers_unseen_input() {
        let model = trained_fixture_model();
        let tokens = tokenize("completely unrelated words here");
        let segmentation = model.tag(&tokens).unwrap();
        assert!(segmentation.is_contiguous_cover(tokens.len()));
        for window in segmentation.segments.windows(2) {
            assert_ne!(window[0].label, window[1].label);
        }
    }

    #[test]
    fn test_tagging_carries_a_score() {
        let model = trained_fixture_model();
        let tokens = tokenize("the martian in san francisco tomorrow");
        let segmentation = model.tag(&tokens).unwrap();
        assert!(segmentation.score.is_some());
    }

    #[test]
    fn test_serialization_deserialization() {
        let tdir = tempdir().unwrap();
        let model = trained_fixture_model();
        model.dump(tdir.as_ref().join("tagger")).unwrap();
        let reloaded_model = TaggerModel::from_folder(tdir.as_ref().join("tagger")).unwrap();

        assert_eq!(model, reloaded_model);

        // Reloaded model must tag identically
        let tokens = tokenize("the martian in san francisco tomorrow");
        assert_eq!(
            model.tag(&tokens).unwrap(),
            reloaded_model.tag(&tokens).unwrap()
        );

        // Check content of metadata
        let metadata_path = tdir.as_ref().join("tagger").join(METADATA_FILENAME);
        let metadata_file = fs::File::open(&metadata_path).unwrap();
        let config: ModelConfig = serde_json::from_reader(metadata_file).unwrap();
        assert_eq!(MODEL_FORMAT_VERSION, config.version);
        assert_eq!(MODEL_FILENAME, config.model_filename);
        assert!(config.labels.contains(&"O".to_string()));
        assert!(config.labels.contains(&"MOVIE_NAME".to_string()));
        assert!(config.max_segment_length >= 2);

        tdir.close().unwrap();
    }

    #[test]
    fn test_dump_overwrites_previous_dump() {
        let tdir = tempdir().unwrap();
        let model = trained_fixture_model();
        model.dump(tdir.as_ref().join("tagger")).unwrap();
        model.dump(tdir.as_ref().join("tagger")).unwrap();
        let reloaded_model = TaggerModel::from_folder(tdir.as_ref().join("tagger")).unwrap();
        assert_eq!(model, reloaded_model);
        tdir.close().unwrap();
    }

    #[test]
    fn test_incompatible_format_version_fails_closed() {
        let tdir = tempdir().unwrap();
        let model = trained_fixture_model();
        let model_dir = tdir.as_ref().join("tagger");
        model.dump(&model_dir).unwrap();

        // Rewrite the metadata with a version this loader does not understand
        let metadata_path = model_dir.join(METADATA_FILENAME);
        let metadata_file = fs::File::open(&metadata_path).unwrap();
        let mut config: serde_json::Value = serde_json::from_reader(metadata_file).unwrap();
        config["version"] = serde_json::Value::String("0".to_string());
        let writer = fs::File::create(&metadata_path).unwrap();
        serde_json::to_writer(writer, &config).unwrap();

        let error = TaggerModel::from_folder(&model_dir).unwrap_err();
        match error.cause {
            DeserializationError::FormatError(cause) => {
                assert_eq!("0", cause.found);
                assert_eq!(MODEL_FORMAT_VERSION, cause.expected);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
        tdir.close().unwrap();
    }
}
