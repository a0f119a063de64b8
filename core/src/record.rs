use chrono::{DateTime, Utc};
use serde::Serialize;

pub const GENRE_DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieRecord {
    pub id: i64,
    /// Title with any trailing `(YYYY)` removed.
    pub title: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
}

impl MovieRecord {
    /// Genres in the delimited form they are stored in.
    pub fn genres_column(&self) -> String {
        self.genres.join(&GENRE_DELIMITER.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    /// Assigned by the destination table on insert.
    pub id: Option<i64>,
    pub user_id: i64,
    pub movie_id: i64,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRecord {
    /// Assigned by the destination table on insert.
    pub id: Option<i64>,
    pub user_id: i64,
    pub movie_id: i64,
    pub text: String,
    pub observed_at: DateTime<Utc>,
}
