use std::io;
use std::path::PathBuf;

use rmp_serde;
use serde_json;

/// Corpus / format errors. Fatal to the training run that hit them; the
/// offending line or example is identified and no previously persisted model
/// is touched.

#[derive(Debug, Fail, Clone, PartialEq)]
#[fail(
    display = "Malformed corpus record at line {}: expected \"<token> <LABEL>\", got {:?}",
    line, content
)]
pub struct MalformedRecordError {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Fail)]
pub enum CorpusLoadError {
    #[fail(display = "Io error while reading corpus")]
    Io(#[cause] io::Error),
    #[fail(display = "Caused by: ")]
    MalformedRecordError(#[cause] MalformedRecordError),
}

#[derive(Debug, Fail, Clone)]
#[fail(display = "Cannot train a tagger on an empty corpus")]
pub struct EmptyCorpusError;

#[derive(Debug, Fail, Clone)]
#[fail(
    display = "Example {} has an inconsistent segmentation: {}",
    example_id, detail
)]
pub struct InconsistentLabelError {
    pub example_id: usize,
    pub detail: String,
}

#[derive(Debug, Fail, Clone)]
#[fail(display = "Training run was cancelled between convergence iterations")]
pub struct TrainingCancelledError;

#[derive(Debug, Fail)]
pub enum TrainRootError {
    #[fail(display = "Caused by: ")]
    EmptyCorpusError(#[cause] EmptyCorpusError),
    #[fail(display = "Caused by: ")]
    InconsistentLabelError(#[cause] InconsistentLabelError),
    #[fail(display = "Caused by: ")]
    TrainingCancelledError(#[cause] TrainingCancelledError),
}

#[derive(Debug, Fail)]
#[fail(display = "Error training tagger")]
pub struct TrainError {
    #[cause]
    pub cause: TrainRootError,
}

/// Model errors. Fatal to the inference call that triggered them, never to
/// the process: the caller gets a typed failure and may fall back to an
/// empty query.

#[derive(Debug, Fail, Clone)]
#[fail(display = "Model has no fitted parameters: train it or load a trained model first")]
pub struct UntrainedModelError;

#[derive(Debug, Fail)]
#[fail(display = "Error tagging input")]
pub struct TagError {
    #[cause]
    pub cause: UntrainedModelError,
}

#[derive(Debug, Fail, Clone, PartialEq)]
#[fail(
    display = "Incompatible model format: found version {}, expected {}",
    found, expected
)]
pub struct ModelFormatError {
    pub found: String,
    pub expected: String,
}

#[derive(Debug, Fail)]
pub enum SerializationError {
    #[fail(display = "Io error {:?}", path)]
    Io {
        path: PathBuf,
        #[cause]
        cause: io::Error,
    },
    #[fail(display = "Unable to write metadata in JSON to {:?}", path)]
    InvalidConfigFormat {
        path: PathBuf,
        #[cause]
        cause: serde_json::Error,
    },
    #[fail(display = "Unable to serialize model to {:?}", path)]
    ModelSerializationError {
        path: PathBuf,
        #[cause]
        cause: rmp_serde::encode::Error,
    },
}

#[derive(Debug, Fail)]
pub enum DeserializationError {
    #[fail(display = "Io error {:?}", path)]
    Io {
        path: PathBuf,
        #[cause]
        cause: io::Error,
    },
    #[fail(display = "Unable to read JSON metadata at {:?}", path)]
    ReadConfigError {
        path: PathBuf,
        #[cause]
        cause: serde_json::Error,
    },
    #[fail(display = "Caused by: ")]
    FormatError(#[cause] ModelFormatError),
    #[fail(display = "Unable to deserialize model at {:?}", path)]
    ModelDeserializationError {
        path: PathBuf,
        #[cause]
        cause: rmp_serde::decode::Error,
    },
}

#[derive(Debug, Fail)]
#[fail(display = "Error dumping model")]
pub struct DumpError {
    #[cause]
    pub cause: SerializationError,
}

#[derive(Debug, Fail)]
#[fail(display = "Error loading model")]
pub struct LoadError {
    #[cause]
    pub cause: DeserializationError,
}

/// Time-resolution errors. Recovered locally by the query builder: the time
/// facet is left absent and the rest of the query is still constructed.

#[derive(Debug, Fail, Clone, PartialEq)]
#[fail(display = "Time expression {:?} matches no recognized pattern", expression)]
pub struct UnparseableTimeExpressionError {
    pub expression: String,
}
