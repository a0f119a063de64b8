use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::clock::Clock;
use crate::errors::TransformError;
use crate::record::{GENRE_DELIMITER, MovieRecord, RatingRecord, TagRecord};
use crate::source::RawRecord;

/// Trailing `(YYYY)` with exactly four ASCII digits, plus the whitespace around it.
static TITLE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?s)(?P<title>.*?)\s*\((?P<year>[0-9]{4})\)\s*$")
        .expect("title/year pattern is valid")
});

/// Maps one raw row into a typed record.
pub trait Transformer {
    type Output;

    fn transform(&self, raw: &RawRecord) -> Result<Self::Output, TransformError>;
}

fn split_title_year(raw_title: &str) -> (&str, Option<i32>) {
    match TITLE_YEAR.captures(raw_title) {
        Some(caps) => {
            let year = caps["year"].parse().ok();
            let title = caps.name("title").map_or(raw_title, |m| m.as_str());
            (title, year)
        }
        None => (raw_title, None),
    }
}

/// `"Toy Story (1995)"` gives `"Toy Story"`; titles without a trailing year come back unchanged.
pub fn extract_title(raw_title: &str) -> String {
    split_title_year(raw_title).0.to_string()
}

pub fn extract_year(raw_title: &str) -> Option<i32> {
    split_title_year(raw_title).1
}

pub fn split_genres(raw_genres: &str) -> Vec<String> {
    if raw_genres.trim().is_empty() {
        return Vec::new();
    }
    raw_genres
        .split(GENRE_DELIMITER)
        .map(str::to_string)
        .collect()
}

/// Epoch milliseconds to an instant. Blank input means "now" as told by `clock`.
/// `line` is only used to report a bad value.
pub fn parse_timestamp(
    raw: Option<&str>,
    line: u64,
    clock: &dyn Clock,
) -> Result<DateTime<Utc>, TransformError> {
    let value = match raw.map(str::trim) {
        None | Some("") => return Ok(clock.now()),
        Some(value) => value,
    };
    let invalid = |reason: String| TransformError::FieldParse {
        line,
        field: "timestamp".to_string(),
        value: value.to_string(),
        reason,
    };

    let millis: i64 = value
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| invalid(format!("{} is outside the supported time range", millis)))
}

fn parse_field<T>(raw: &RawRecord, field: &str) -> Result<T, TransformError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = raw.require(field)?;
    value.trim().parse().map_err(|e: T::Err| TransformError::FieldParse {
        line: raw.line,
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_rating(raw: &RawRecord, field: &str) -> Result<f64, TransformError> {
    let value: f64 = parse_field(raw, field)?;
    if !value.is_finite() {
        return Err(TransformError::FieldParse {
            line: raw.line,
            field: field.to_string(),
            value: value.to_string(),
            reason: "rating must be a finite number".to_string(),
        });
    }
    Ok(value)
}

fn observed_at(raw: &RawRecord, clock: &dyn Clock) -> Result<DateTime<Utc>, TransformError> {
    parse_timestamp(raw.get("timestamp"), raw.line, clock)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MovieTransformer;

impl Transformer for MovieTransformer {
    type Output = MovieRecord;

    fn transform(&self, raw: &RawRecord) -> Result<MovieRecord, TransformError> {
        let id = parse_field(raw, "movieId")?;
        let (title, year) = split_title_year(raw.require("movieTitle")?);
        let genres = split_genres(raw.require("movieGenres")?);

        Ok(MovieRecord {
            id,
            title: title.to_string(),
            year,
            genres,
        })
    }
}

#[derive(Clone)]
pub struct RatingTransformer {
    clock: Arc<dyn Clock>,
}

impl RatingTransformer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Transformer for RatingTransformer {
    type Output = RatingRecord;

    fn transform(&self, raw: &RawRecord) -> Result<RatingRecord, TransformError> {
        Ok(RatingRecord {
            id: None,
            user_id: parse_field(raw, "userId")?,
            movie_id: parse_field(raw, "movieId")?,
            value: parse_rating(raw, "rating")?,
            observed_at: observed_at(raw, self.clock.as_ref())?,
        })
    }
}

#[derive(Clone)]
pub struct TagTransformer {
    clock: Arc<dyn Clock>,
}

impl TagTransformer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Transformer for TagTransformer {
    type Output = TagRecord;

    fn transform(&self, raw: &RawRecord) -> Result<TagRecord, TransformError> {
        Ok(TagRecord {
            id: None,
            user_id: parse_field(raw, "userId")?,
            movie_id: parse_field(raw, "movieId")?,
            text: raw.require("tag")?.to_string(),
            observed_at: observed_at(raw, self.clock.as_ref())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::source::shared_columns;

    fn raw(columns: &[&str], values: &[&str]) -> RawRecord {
        RawRecord::new(
            2,
            shared_columns(columns),
            values.iter().map(|v| v.to_string()).collect(),
        )
    }

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::from_millis(1_600_000_000_000).unwrap())
    }

    #[test]
    fn test_extract_title_and_year() {
        assert_eq!(extract_title("Toy Story (1995)"), "Toy Story");
        assert_eq!(extract_year("Toy Story (1995)"), Some(1995));

        assert_eq!(extract_title("Heat"), "Heat");
        assert_eq!(extract_year("Heat"), None);
    }

    #[test]
    fn test_only_the_trailing_year_group_counts() {
        let raw = "Seven (a.k.a. Se7en) (1995)";
        assert_eq!(extract_title(raw), "Seven (a.k.a. Se7en)");
        assert_eq!(extract_year(raw), Some(1995));

        let raw = "Blade Runner 2049 (2017)";
        assert_eq!(extract_title(raw), "Blade Runner 2049");
        assert_eq!(extract_year(raw), Some(2017));

        let raw = "Ready Player One (2018) ";
        assert_eq!(extract_title(raw), "Ready Player One");
        assert_eq!(extract_year(raw), Some(2018));
    }

    #[test]
    fn test_non_year_suffixes_leave_title_untouched() {
        for raw in ["1941", "Babylon 5", "Movie (199)", "Movie (19955)", "(1995) Movie", "Movie (abcd)"] {
            assert_eq!(extract_title(raw), raw);
            assert_eq!(extract_year(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_split_genres() {
        assert_eq!(
            split_genres("Adventure|Animation|Comedy"),
            vec!["Adventure", "Animation", "Comedy"]
        );
        assert!(split_genres("").is_empty());
        assert_eq!(split_genres("(no genres listed)"), vec!["(no genres listed)"]);
    }

    #[test]
    fn test_movie_transform() {
        let record = MovieTransformer
            .transform(&raw(
                &["movieId", "movieTitle", "movieGenres"],
                &["1", "Toy Story (1995)", "Adventure|Animation|Children|Comedy|Fantasy"],
            ))
            .unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(record.title, "Toy Story");
        assert_eq!(record.year, Some(1995));
        assert_eq!(record.genres.len(), 5);
        assert_eq!(
            record.genres_column(),
            "Adventure|Animation|Children|Comedy|Fantasy"
        );
    }

    #[test]
    fn test_movie_transform_rejects_non_numeric_id() {
        let err = MovieTransformer
            .transform(&raw(
                &["movieId", "movieTitle", "movieGenres"],
                &["one", "Heat", "Action"],
            ))
            .unwrap_err();

        match err {
            TransformError::FieldParse { line, field, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(field, "movieId");
                assert_eq!(value, "one");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_rating_transform_keeps_populated_timestamp() {
        let transformer = RatingTransformer::new(fixed_clock());
        let record = transformer
            .transform(&raw(
                &["userId", "movieId", "rating", "timestamp"],
                &["1", "1", "4.0", "964982703000"],
            ))
            .unwrap();

        assert_eq!(record.id, None);
        assert_eq!(record.user_id, 1);
        assert_eq!(record.value, 4.0);
        assert_eq!(record.observed_at.timestamp_millis(), 964_982_703_000);
    }

    #[test]
    fn test_blank_timestamp_uses_injected_clock() {
        let clock = fixed_clock();
        let transformer = RatingTransformer::new(clock.clone());

        for blank in ["", "   "] {
            let record = transformer
                .transform(&raw(
                    &["userId", "movieId", "rating", "timestamp"],
                    &["1", "1", "3.5", blank],
                ))
                .unwrap();
            assert_eq!(record.observed_at, clock.now());
        }

        let tags = TagTransformer::new(clock.clone());
        let record = tags
            .transform(&raw(&["userId", "movieId", "tag"], &["2", "60756", "funny"]))
            .unwrap();
        assert_eq!(record.observed_at, clock.now());

        for blank in ["", "   "] {
            let record = tags
                .transform(&raw(
                    &["userId", "movieId", "tag", "timestamp"],
                    &["2", "60756", "funny", blank],
                ))
                .unwrap();
            assert_eq!(record.observed_at, clock.now());
        }
    }

    #[test]
    fn test_rating_transform_rejects_bad_fields() {
        let transformer = RatingTransformer::new(fixed_clock());
        let columns = ["userId", "movieId", "rating", "timestamp"];

        let bad_user = transformer.transform(&raw(&columns, &["x", "1", "4.0", ""]));
        assert!(matches!(bad_user, Err(TransformError::FieldParse { ref field, .. }) if field == "userId"));

        let bad_rating = transformer.transform(&raw(&columns, &["1", "1", "NaN", ""]));
        assert!(matches!(bad_rating, Err(TransformError::FieldParse { ref field, .. }) if field == "rating"));

        let bad_ts = transformer.transform(&raw(&columns, &["1", "1", "4.0", "yesterday"]));
        assert!(matches!(bad_ts, Err(TransformError::FieldParse { ref field, .. }) if field == "timestamp"));
    }

    #[test]
    fn test_tag_transform_passes_text_through() {
        let transformer = TagTransformer::new(fixed_clock());
        let record = transformer
            .transform(&raw(
                &["userId", "movieId", "tag", "timestamp"],
                &[" 2 ", "60756", " Highly quotable, funny ", "1445714994000"],
            ))
            .unwrap();

        assert_eq!(record.user_id, 2);
        assert_eq!(record.movie_id, 60756);
        assert_eq!(record.text, " Highly quotable, funny ");
        assert_eq!(record.observed_at.timestamp_millis(), 1_445_714_994_000);
    }

    #[test]
    fn test_parse_timestamp_round_trips_epoch_millis() {
        let clock = FixedClock::from_millis(0).unwrap();
        let instant = parse_timestamp(Some("964982703000"), 2, &clock).unwrap();
        assert_eq!(instant.timestamp_millis().to_string(), "964982703000");

        match parse_timestamp(Some(&i64::MAX.to_string()), 9, &clock) {
            Err(TransformError::FieldParse { line, field, .. }) => {
                assert_eq!(line, 9);
                assert_eq!(field, "timestamp");
            }
            other => panic!("expected timestamp parse error, got {other:?}"),
        }
    }
}
