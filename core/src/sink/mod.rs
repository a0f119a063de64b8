pub mod sqlite;

use std::future::Future;

use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

use crate::errors::SinkError;
use crate::record::{MovieRecord, RatingRecord, TagRecord};

pub use self::sqlite::SqliteSink;

pub type InsertQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// The `Sink` trait defines the contract for any destination of typed records.
///
/// Each call receives one chunk. Either every record in it becomes visible or,
/// on failure, none of them do.
pub trait Sink<R> {
    fn write_batch(&mut self, batch: &[R]) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// A record that knows which table it lands in and how to bind itself to an insert.
pub trait TableRecord: Send + Sync {
    const TABLE: &'static str;
    const INSERT_SQL: &'static str;

    fn bind<'q>(&'q self, query: InsertQuery<'q>) -> InsertQuery<'q>;
}

impl TableRecord for MovieRecord {
    const TABLE: &'static str = "Movie";
    const INSERT_SQL: &'static str =
        "INSERT INTO Movie (movie_id, movie_title, movie_year, movie_genres) VALUES (?, ?, ?, ?)";

    fn bind<'q>(&'q self, query: InsertQuery<'q>) -> InsertQuery<'q> {
        query
            .bind(self.id)
            .bind(self.title.as_str())
            .bind(self.year)
            .bind(self.genres_column())
    }
}

impl TableRecord for RatingRecord {
    const TABLE: &'static str = "Rating";
    const INSERT_SQL: &'static str =
        "INSERT INTO Rating (user_id, movie_id, rating, timestamp) VALUES (?, ?, ?, ?)";

    fn bind<'q>(&'q self, query: InsertQuery<'q>) -> InsertQuery<'q> {
        query
            .bind(self.user_id)
            .bind(self.movie_id)
            .bind(self.value)
            .bind(self.observed_at)
    }
}

impl TableRecord for TagRecord {
    const TABLE: &'static str = "Tag";
    const INSERT_SQL: &'static str =
        "INSERT INTO Tag (user_id, movie_id, tag, timestamp) VALUES (?, ?, ?, ?)";

    fn bind<'q>(&'q self, query: InsertQuery<'q>) -> InsertQuery<'q> {
        query
            .bind(self.user_id)
            .bind(self.movie_id)
            .bind(self.text.as_str())
            .bind(self.observed_at)
    }
}
