use std::fmt;
use std::ops::Range;

use crate::constants::OUTSIDE_LABEL;
use crate::utils::whitespace_tokenizer;

/// A single token of the input text, along with the range of the characters
/// composing it in the original string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    // character-level
    pub range: Range<usize>,
}

/// Split the input text into an ordered sequence of tokens. Splits on
/// whitespace runs, preserves the original casing. Total function: empty
/// input yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<Token> {
    whitespace_tokenizer(text)
        .map(|(range, text)| Token { text, range })
        .collect()
}

/// A domain label assigned to a span of tokens. The label vocabulary is not a
/// closed enum: it is derived from the training corpus, so that new domains
/// can be trained without touching this crate. The only distinguished value
/// is the catch-all outside label for tokens belonging to no span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    pub fn new<T: ToString>(name: T) -> Label {
        Label(name.to_string())
    }

    /// The catch-all "no label" class
    pub fn outside() -> Label {
        Label(OUTSIDE_LABEL.to_string())
    }

    pub fn is_outside(&self) -> bool {
        self.0 == OUTSIDE_LABEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> From<&'a str> for Label {
    fn from(name: &'a str) -> Label {
        Label(name.to_string())
    }
}

/// A maximal run of tokens sharing one label. The `range` attribute is the
/// half-open range of token indices covered by the segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub label: Label,
    pub range: Range<usize>,
}

impl Segment {
    pub fn new<L: Into<Label>>(label: L, range: Range<usize>) -> Segment {
        Segment {
            label: label.into(),
            range,
        }
    }

    /// The surface text covered by the segment, with single spaces between tokens
    pub fn surface(&self, tokens: &[Token]) -> String {
        tokens[self.range.start..self.range.end]
            .iter()
            .map(|token| token.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An ordered sequence of segments covering a full token sequence. Invariants:
/// the segments are non-overlapping, contiguous and in order, and no two
/// adjacent segments share the same label. The optional `score` carries the
/// model confidence when the segmentation was produced by inference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    pub score: Option<f64>,
}

impl Segmentation {
    pub fn new(segments: Vec<Segment>) -> Segmentation {
        Segmentation {
            segments,
            score: None,
        }
    }

    pub fn with_score(segments: Vec<Segment>, score: f64) -> Segmentation {
        Segmentation {
            segments,
            score: Some(score),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of tokens covered by the segmentation
    pub fn coverage_len(&self) -> usize {
        self.segments.last().map(|seg| seg.range.end).unwrap_or(0)
    }

    /// Check that the segments exactly cover `0..n_tokens` with no gaps, no
    /// overlaps and no empty segment
    pub fn is_contiguous_cover(&self, n_tokens: usize) -> bool {
        let mut expected_start = 0;
        for segment in &self.segments {
            if segment.range.start != expected_start || segment.range.end <= segment.range.start {
                return false;
            }
            expected_start = segment.range.end;
        }
        expected_start == n_tokens
    }

    /// Re-expand the segmentation into a per-token label sequence
    pub fn token_labels(&self) -> Vec<Label> {
        self.segments
            .iter()
            .flat_map(|segment| segment.range.clone().map(move |_| segment.label.clone()))
            .collect()
    }

    /// Render the segmentation as a string of bracketed `[LABEL: surface text]`
    /// chunks in token order, with unlabeled runs left as plain text. Meant for
    /// diagnostics and test assertions.
    pub fn render(&self, tokens: &[Token]) -> String {
        self.segments
            .iter()
            .map(|segment| {
                if segment.label.is_outside() {
                    segment.surface(tokens)
                } else {
                    format!("[{}: {}]", segment.label, segment.surface(tokens))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single labeled example of the training corpus: a token sequence, the
/// per-token label sequence and a positional identifier assigned by the
/// corpus loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub id: usize,
    pub tokens: Vec<String>,
    pub labels: Vec<Label>,
}

impl TrainingExample {
    pub fn new<T, L>(id: usize, tokens: Vec<T>, labels: Vec<L>) -> TrainingExample
    where
        T: ToString,
        L: Into<Label>,
    {
        TrainingExample {
            id,
            tokens: tokens.into_iter().map(|t| t.to_string()).collect(),
            labels: labels.into_iter().map(|l| l.into()).collect(),
        }
    }
}
