pub static METADATA_FILENAME: &str = "metadata.json";
pub static MODEL_FILENAME: &str = "tagger.bin";

/// Version of the persisted model layout. Bumped on every incompatible change
/// so that an old loader fails closed instead of decoding garbage weights.
pub static MODEL_FORMAT_VERSION: &str = "1";

/// Catch-all class for tokens outside any labeled span
pub static OUTSIDE_LABEL: &str = "O";

/// Domain labels interpreted by the query builder. The tagger itself learns
/// its vocabulary from the corpus; these names only matter at projection time.
pub static MOVIE_NAME_LABEL: &str = "MOVIE_NAME";
pub static MOVIE_GENRE_LABEL: &str = "MOVIE_GENRE";
pub static THEATER_NAME_LABEL: &str = "THEATER_NAME";
pub static THEATER_LOCATION_LABEL: &str = "THEATER_LOCATION";
pub static TIME_EXPRESSION_LABEL: &str = "TIME_EXPRESSION";
pub static PREPOSITION_LABEL: &str = "PREPOSITION";
