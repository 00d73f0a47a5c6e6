use chrono::{DateTime, Utc};

use crate::constants::{
    MOVIE_GENRE_LABEL, MOVIE_NAME_LABEL, PREPOSITION_LABEL, THEATER_LOCATION_LABEL,
    THEATER_NAME_LABEL, TIME_EXPRESSION_LABEL,
};
use crate::data::{Segmentation, Token};
use crate::errors::UnparseableTimeExpressionError;

/// Movie facet of a query: either a title or a genre, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovieSelector {
    Name(String),
    Genre(String),
}

/// Theater facet of a query: either a theater name or a location, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TheaterSelector {
    Name(String),
    Location(String),
}

/// Resolved date/time range. A point in time is represented as `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> TimeRange {
        TimeRange { from, to }
    }

    pub fn instant(at: DateTime<Utc>) -> TimeRange {
        TimeRange { from: at, to: at }
    }
}

/// Structured domain query built from a tagged segmentation. An absent field
/// means "no constraint", never "empty string".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    pub movie: Option<MovieSelector>,
    pub theater: Option<TheaterSelector>,
    pub time: Option<TimeRange>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.movie.is_none() && self.theater.is_none() && self.time.is_none()
    }
}

/// External collaborator resolving natural-language time expressions
/// ("tomorrow", "next week") against a reference instant. Not implemented in
/// this crate; the query builder only needs the contract.
pub trait TimeResolver {
    fn resolve(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<TimeRange, UnparseableTimeExpressionError>;
}

/// Builds a `Query` out of a tagged segmentation. The resolver and the
/// reference instant are injected explicitly so that test suites can
/// substitute fixtures without process-wide state.
///
/// Ambiguity policy: the tagger's label choice per segment is authoritative
/// (the builder never re-adjudicates name vs. genre or name vs. location),
/// and within each facet the first occurrence wins — a later movie-class
/// segment never displaces an earlier one, whatever its variant.
pub struct QueryBuilder<'a, R: TimeResolver> {
    resolver: &'a R,
    reference: DateTime<Utc>,
}

impl<'a, R: TimeResolver> QueryBuilder<'a, R> {
    pub fn new(resolver: &'a R, reference: DateTime<Utc>) -> QueryBuilder<'a, R> {
        QueryBuilder {
            resolver,
            reference,
        }
    }

    /// Project the tagged segments onto the query facets. Never fails: an
    /// entirely unrecognized input yields a query with all fields absent, and
    /// an unparseable time expression leaves the time facet absent rather
    /// than failing the whole query.
    pub fn build(&self, segmentation: &Segmentation, tokens: &[Token]) -> Query {
        let mut query = Query::default();
        for segment in &segmentation.segments {
            let label = segment.label.as_str();
            if label == MOVIE_NAME_LABEL {
                if query.movie.is_none() {
                    query.movie = Some(MovieSelector::Name(segment.surface(tokens)));
                }
            } else if label == MOVIE_GENRE_LABEL {
                if query.movie.is_none() {
                    query.movie = Some(MovieSelector::Genre(segment.surface(tokens)));
                }
            } else if label == THEATER_NAME_LABEL {
                if query.theater.is_none() {
                    query.theater = Some(TheaterSelector::Name(segment.surface(tokens)));
                }
            } else if label == THEATER_LOCATION_LABEL {
                if query.theater.is_none() {
                    query.theater = Some(TheaterSelector::Location(segment.surface(tokens)));
                }
            } else if label == TIME_EXPRESSION_LABEL {
                if query.time.is_none() {
                    // A resolver miss leaves the facet absent; later time
                    // segments still get their chance
                    if let Ok(range) = self.resolver.resolve(&segment.surface(tokens), self.reference)
                    {
                        query.time = Some(range);
                    }
                }
            } else if label == PREPOSITION_LABEL {
                // Connective tissue between facets, carries no constraint
            }
            // Outside tokens and unknown labels are discarded as well
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::data::{tokenize, Segment};

    /// Fixture resolver recognizing the handful of expressions used in tests
    struct FixtureResolver;

    impl TimeResolver for FixtureResolver {
        fn resolve(
            &self,
            text: &str,
            reference: DateTime<Utc>,
        ) -> Result<TimeRange, UnparseableTimeExpressionError> {
            match text {
                "tomorrow" => Ok(TimeRange::instant(reference + Duration::days(1))),
                "next wednesday" => Ok(TimeRange::instant(reference + Duration::days(3))),
                "next week" => Ok(TimeRange::new(
                    reference + Duration::days(7),
                    reference + Duration::days(14),
                )),
                _ => Err(UnparseableTimeExpressionError {
                    expression: text.to_string(),
                }),
            }
        }
    }

    fn reference() -> DateTime<Utc> {
        Utc.ymd(2015, 10, 3).and_hms(12, 0, 0)
    }

    #[test]
    fn test_movie_theater_and_time_facets() {
        let tokens = tokenize("the martian in san francisco tomorrow");
        let segmentation = Segmentation::new(vec![
            Segment::new("MOVIE_NAME", 0..2),
            Segment::new("PREPOSITION", 2..3),
            Segment::new("THEATER_LOCATION", 3..5),
            Segment::new("TIME_EXPRESSION", 5..6),
        ]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(
            Some(MovieSelector::Name("the martian".to_string())),
            query.movie
        );
        assert_eq!(
            Some(TheaterSelector::Location("san francisco".to_string())),
            query.theater
        );
        assert_eq!(
            Some(TimeRange::instant(reference() + Duration::days(1))),
            query.time
        );
    }

    #[test]
    fn test_theater_name_and_multi_token_time_expression() {
        let tokens = tokenize("amc next wednesday");
        let segmentation = Segmentation::new(vec![
            Segment::new("THEATER_NAME", 0..1),
            Segment::new("TIME_EXPRESSION", 1..3),
        ]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(Some(TheaterSelector::Name("amc".to_string())), query.theater);
        assert_eq!(None, query.movie);
        assert_eq!(
            Some(TimeRange::instant(reference() + Duration::days(3))),
            query.time
        );
    }

    #[test]
    fn test_outside_tokens_leave_facets_absent() {
        let tokens = tokenize("cinemark next week");
        let segmentation = Segmentation::new(vec![
            Segment::new("O", 0..1),
            Segment::new("TIME_EXPRESSION", 1..3),
        ]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(None, query.movie);
        assert_eq!(None, query.theater);
        assert_eq!(
            Some(TimeRange::new(
                reference() + Duration::days(7),
                reference() + Duration::days(14),
            )),
            query.time
        );
    }

    #[test]
    fn test_single_facet_exclusivity() {
        let tokens = tokenize("amc");
        let segmentation = Segmentation::new(vec![Segment::new("THEATER_NAME", 0..1)]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(Some(TheaterSelector::Name("amc".to_string())), query.theater);
        assert_eq!(None, query.movie);
        assert_eq!(None, query.time);
    }

    #[test]
    fn test_unrecognized_input_yields_empty_query() {
        let tokens = tokenize("hello there");
        let segmentation = Segmentation::new(vec![Segment::new("O", 0..2)]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert!(query.is_empty());
    }

    #[test]
    fn test_first_occurrence_wins_on_conflicting_movie_segments() {
        let tokens = tokenize("the martian comedy");
        let segmentation = Segmentation::new(vec![
            Segment::new("MOVIE_NAME", 0..2),
            Segment::new("MOVIE_GENRE", 2..3),
        ]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(
            Some(MovieSelector::Name("the martian".to_string())),
            query.movie
        );
    }

    #[test]
    fn test_full_pipeline_from_raw_text_to_query() {
        use crate::TaggerTrainer;

        let corpus = vec![
            crate::training_example![
                0,
                ("the", "MOVIE_NAME"),
                ("martian", "MOVIE_NAME"),
                ("in", "PREPOSITION"),
                ("san", "THEATER_LOCATION"),
                ("francisco", "THEATER_LOCATION"),
                ("tomorrow", "TIME_EXPRESSION"),
            ],
            crate::training_example![
                1,
                ("amc", "THEATER_NAME"),
                ("next", "TIME_EXPRESSION"),
                ("wednesday", "TIME_EXPRESSION"),
            ],
        ];
        let model = TaggerTrainer::new(&corpus).epochs(20).train().unwrap();

        let tokens = tokenize("the martian in san francisco tomorrow");
        let segmentation = model.tag(&tokens).unwrap();
        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        assert_eq!(
            Some(MovieSelector::Name("the martian".to_string())),
            query.movie
        );
        assert_eq!(
            Some(TheaterSelector::Location("san francisco".to_string())),
            query.theater
        );
        assert_eq!(
            Some(TimeRange::instant(reference() + Duration::days(1))),
            query.time
        );
    }

    #[test]
    fn test_unresolvable_time_expression_leaves_time_absent() {
        let tokens = tokenize("amc someday");
        let segmentation = Segmentation::new(vec![
            Segment::new("THEATER_NAME", 0..1),
            Segment::new("TIME_EXPRESSION", 1..2),
        ]);

        let query = QueryBuilder::new(&FixtureResolver, reference()).build(&segmentation, &tokens);

        // The rest of the query is still constructed
        assert_eq!(Some(TheaterSelector::Name("amc".to_string())), query.theater);
        assert_eq!(None, query.time);
    }
}
