use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use thiserror::Error;
use tracing::{event, Level};

use crate::password::PasswordHasher;

macro_rules! time {
  ($s:expr, $e:expr) => {{
    let start = std::time::Instant::now();
    let result = $e;
    metrics::histogram!($s, start.elapsed().as_secs_f64());
    result
  }}
}

macro_rules! update {
  ($t:expr, $u:expr, $c:expr) => {
    if $t != $u {
      $t = $u;
      $c = true;
    }
  }
}

diesel::define_sql_function!(fn unicode_lower(text: diesel::sql_types::Text) -> diesel::sql_types::Text);

pub mod track;
pub mod user;
pub mod rating;
pub mod tracked_track;


#[derive(Clone)]
pub struct Database {
  connection_pool: Pool<ConnectionManager<SqliteConnection>>,
  inner: Arc<Inner>,
}

struct Inner {
  password_hasher: PasswordHasher,
}


// Creation

#[derive(Debug, Error)]
pub enum DatabaseCreateError {
  #[error("Failed to create database connection pool")]
  ConnectionPoolCreateFail(#[from] r2d2::PoolError),
  #[error("Failed to create database schema")]
  SchemaCreateFail(#[from] diesel::result::Error),
}

impl Database {
  pub fn new<D: AsRef<str>>(
    database_url: D,
    password_hasher: PasswordHasher,
  ) -> Result<Database, DatabaseCreateError> {
    let connection_pool = Pool::builder()
      .max_size(16)
      .connection_customizer(Box::new(ConnectionOptions))
      .build(ConnectionManager::<SqliteConnection>::new(database_url.as_ref()))?;
    connection_pool.get()?.batch_execute(include_str!("database/schema.sql"))?;
    event!(Level::DEBUG, database_url = database_url.as_ref(), "Opened database");
    let inner = Arc::new(Inner { password_hasher });
    Ok(Database { connection_pool, inner })
  }
}

/// Per-connection settings; SQLite does not persist these in the database file.
#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
  fn on_acquire(&self, connection: &mut SqliteConnection) -> Result<(), r2d2::Error> {
    connection.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
      .map_err(r2d2::Error::QueryError)?;
    // SQLite's own `lower` and `LIKE` only fold ASCII letters.
    unicode_lower_utils::register_impl(connection, |text: String| text.to_lowercase())
      .map_err(r2d2::Error::QueryError)
  }
}


// Connecting to the database

pub struct DatabaseConnection {
  connection: PooledConnection<ConnectionManager<SqliteConnection>>,
  inner: Arc<Inner>,
}

#[derive(Debug, Error)]
pub enum DatabaseConnectError {
  #[error("Failed to get database connection from database connection pool")]
  ConnectionGetFail(#[from] r2d2::PoolError),
}

impl Database {
  pub fn connect(&self) -> Result<DatabaseConnection, DatabaseConnectError> {
    let connection = self.connection_pool.get()?;
    let inner = self.inner.clone();
    Ok(DatabaseConnection { connection, inner })
  }
}

impl DatabaseConnection {
  #[inline]
  fn connection(&mut self) -> &mut SqliteConnection {
    &mut *self.connection
  }
}


// Generic database query error.

#[derive(Debug, Error)]
pub enum DatabaseQueryError {
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}


// Helpers

pub(crate) fn now() -> NaiveDateTime {
  Utc::now().naive_utc()
}

/// Creates a `LIKE` pattern matching values that contain `query`, with `\` as the escape character.
pub(crate) fn contains_pattern(query: &str) -> String {
  let escaped = query
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_");
  format!("%{}%", escaped)
}

pub(crate) fn user_exists(connection: &mut SqliteConnection, user_id: i32) -> QueryResult<bool> {
  use diesel::dsl::exists;
  use tracktracker_core::schema::user;
  diesel::select(exists(user::table.find(user_id))).get_result(connection)
}

pub(crate) fn track_exists(connection: &mut SqliteConnection, track_id: i32) -> QueryResult<bool> {
  use diesel::dsl::exists;
  use tracktracker_core::schema::track;
  diesel::select(exists(track::table.find(track_id))).get_result(connection)
}

/// Trims `value`, mapping blank values to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
  value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}


// Debug implementations

impl Debug for Database {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "Database")
  }
}

impl Debug for DatabaseConnection {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "DatabaseConnection")
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contains_pattern_escapes_wildcards() {
    assert_eq!(contains_pattern("abc"), "%abc%");
    assert_eq!(contains_pattern("100%"), "%100\\%%");
    assert_eq!(contains_pattern("a_b\\c"), "%a\\_b\\\\c%");
  }

  #[test]
  fn non_blank_trims_and_drops_empty() {
    assert_eq!(non_blank(Some("  Al ")), Some("Al".to_owned()));
    assert_eq!(non_blank(Some("   ")), None);
    assert_eq!(non_blank(None), None);
  }
}
