//! Sequence-tagging pipeline turning a free-text movie query (e.g. "the
//! martian in san francisco tomorrow") into a structured query over three
//! facets: movie, theater and a date/time range. A semi-Markov tagger is
//! trained offline on a two-column labeled corpus, persisted, and loaded back
//! for inference; tagged spans are then projected onto a typed `Query`.

extern crate chrono;
#[macro_use]
extern crate failure;
extern crate fnv;
#[macro_use]
extern crate log;
extern crate rmp_serde;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;

mod constants;
mod corpus;
mod data;
mod macros;
mod query;
mod segmenter;
mod symbol_table;
mod tagger;
mod trainer;
mod utils;

pub mod errors;

pub use corpus::{load_corpus, load_corpus_file};
pub use data::{tokenize, Label, Segment, Segmentation, Token, TrainingExample};
pub use query::{MovieSelector, Query, QueryBuilder, TheaterSelector, TimeRange, TimeResolver};
pub use segmenter::{segment, segment_labels};
pub use tagger::TaggerModel;
pub use trainer::TaggerTrainer;
