use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::data::{Label, TrainingExample};
use crate::errors::{CorpusLoadError, MalformedRecordError};

/// Load a labeled training corpus from a reader. The format is one
/// `"<token> <LABEL>"` pair per line; a blank line terminates the current
/// example and starts the next one. Trailing blank lines are tolerated.
/// Examples are produced in file order and get positional identifiers.
///
/// A non-blank line that does not split into exactly two whitespace-separated
/// fields fails the whole load with a `MalformedRecordError` carrying the
/// 1-based line number; no partial example is emitted for that record.
pub fn load_corpus<R: Read>(reader: R) -> Result<Vec<TrainingExample>, CorpusLoadError> {
    let mut examples: Vec<TrainingExample> = vec![];
    let mut tokens: Vec<String> = vec![];
    let mut labels: Vec<Label> = vec![];

    for (line_idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(CorpusLoadError::Io)?;
        if line.trim().is_empty() {
            if !tokens.is_empty() {
                let id = examples.len();
                examples.push(TrainingExample {
                    id,
                    tokens: std::mem::replace(&mut tokens, vec![]),
                    labels: std::mem::replace(&mut labels, vec![]),
                });
            }
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(token), Some(label), None) => {
                tokens.push(token.to_string());
                labels.push(Label::from(label));
            }
            _ => {
                return Err(CorpusLoadError::MalformedRecordError(MalformedRecordError {
                    line: line_idx + 1,
                    content: line,
                }));
            }
        }
    }

    // Flush the last example when the file does not end with a blank line
    if !tokens.is_empty() {
        let id = examples.len();
        examples.push(TrainingExample { id, tokens, labels });
    }

    Ok(examples)
}

/// Load a labeled training corpus from a file path
pub fn load_corpus_file<P: AsRef<Path>>(path: P) -> Result<Vec<TrainingExample>, CorpusLoadError> {
    let file = fs::File::open(path).map_err(CorpusLoadError::Io)?;
    load_corpus(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_corpus_groups_examples_on_blank_lines() {
        let corpus = "the MOVIE_NAME\n\
                      martian MOVIE_NAME\n\
                      in PREPOSITION\n\
                      san THEATER_LOCATION\n\
                      francisco THEATER_LOCATION\n\
                      tomorrow TIME_EXPRESSION\n\
                      \n\
                      amc THEATER_NAME\n\
                      next TIME_EXPRESSION\n\
                      wednesday TIME_EXPRESSION\n";

        let examples = load_corpus(corpus.as_bytes()).unwrap();

        assert_eq!(2, examples.len());
        assert_eq!(0, examples[0].id);
        assert_eq!(1, examples[1].id);
        assert_eq!(
            vec!["the", "martian", "in", "san", "francisco", "tomorrow"],
            examples[0].tokens
        );
        assert_eq!(
            vec![
                Label::from("MOVIE_NAME"),
                Label::from("MOVIE_NAME"),
                Label::from("PREPOSITION"),
                Label::from("THEATER_LOCATION"),
                Label::from("THEATER_LOCATION"),
                Label::from("TIME_EXPRESSION"),
            ],
            examples[0].labels
        );
        assert_eq!(vec!["amc", "next", "wednesday"], examples[1].tokens);
    }

    #[test]
    fn test_load_corpus_tolerates_trailing_blank_lines() {
        let corpus = "amc THEATER_NAME\n\n\n\n";
        let examples = load_corpus(corpus.as_bytes()).unwrap();
        assert_eq!(1, examples.len());
        assert_eq!(vec!["amc"], examples[0].tokens);
    }

    #[test]
    fn test_load_corpus_rejects_single_field_record() {
        let corpus = "amc THEATER_NAME\ntomorrow\n";
        let error = load_corpus(corpus.as_bytes()).unwrap_err();
        match error {
            CorpusLoadError::MalformedRecordError(cause) => {
                assert_eq!(2, cause.line);
                assert_eq!("tomorrow", cause.content);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_corpus_rejects_record_with_too_many_fields() {
        let corpus = "the martian MOVIE_NAME\n";
        let error = load_corpus(corpus.as_bytes()).unwrap_err();
        match error {
            CorpusLoadError::MalformedRecordError(cause) => assert_eq!(1, cause.line),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_corpus_empty_input_yields_no_examples() {
        let examples = load_corpus("".as_bytes()).unwrap();
        assert!(examples.is_empty());
    }
}
