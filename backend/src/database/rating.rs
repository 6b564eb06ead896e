use diesel::prelude::*;
use thiserror::Error;
use tracing::{event, instrument, Level};

use tracktracker_core::model::{NewRating, Rating};
use tracktracker_core::schema::rating;

use super::{DatabaseConnection, DatabaseQueryError, non_blank, now, track_exists, user_exists};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

// Setting ratings

#[derive(Debug, Error)]
pub enum RatingSetError {
  #[error("Rating must be between 1 and 5")]
  RatingOutOfRangeFail(i32),
  #[error("User not found")]
  UserNotFoundFail(i32),
  #[error("Track not found")]
  TrackNotFoundFail(i32),
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl RatingSetError {
  pub fn is_validation_failure(&self) -> bool {
    !matches!(self, RatingSetError::DatabaseQueryFail(_))
  }
}

impl DatabaseConnection {
  /// Creates the rating of a user for a track, or replaces the value and comment of the existing one.
  #[instrument(level = "debug", skip(self, new_rating), fields(user_id = new_rating.user_id, track_id = new_rating.track_id))]
  pub fn set_rating(&mut self, new_rating: &NewRating) -> Result<Rating, RatingSetError> {
    use RatingSetError::*;
    let NewRating { user_id, track_id, rating: value, .. } = *new_rating;
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
      return Err(RatingOutOfRangeFail(value));
    }
    let comment = non_blank(new_rating.comment.as_deref());
    let rating = self.connection().immediate_transaction(|connection| -> Result<Rating, RatingSetError> {
      ensure_user_and_track_exist(connection, user_id, track_id)?;
      let timestamp = now();
      let updated: Option<Rating> = time!("set_rating.update", diesel::update(rating::table)
        .filter(rating::user_id.eq(user_id))
        .filter(rating::track_id.eq(track_id))
        .set((rating::score.eq(value), rating::comment.eq(&comment), rating::updated_at.eq(timestamp)))
        .returning(Rating::as_returning())
        .get_result(connection)
        .optional()?);
      if let Some(rating) = updated {
        return Ok(rating);
      }
      Ok(time!("set_rating.insert", diesel::insert_into(rating::table)
        .values((
          rating::user_id.eq(user_id),
          rating::track_id.eq(track_id),
          rating::score.eq(value),
          rating::comment.eq(&comment),
          rating::created_at.eq(timestamp),
          rating::updated_at.eq(timestamp),
        ))
        .returning(Rating::as_returning())
        .get_result(connection)?))
    })?;
    event!(Level::DEBUG, id = rating.id, rating = rating.rating, "Set rating");
    Ok(rating)
  }
}

/// Fails with the not-found error of [`RatingSetError`] for the first of the user or track that does not exist.
fn ensure_user_and_track_exist(connection: &mut SqliteConnection, user_id: i32, track_id: i32) -> Result<(), RatingSetError> {
  if !user_exists(connection, user_id)? {
    return Err(RatingSetError::UserNotFoundFail(user_id));
  }
  if !track_exists(connection, track_id)? {
    return Err(RatingSetError::TrackNotFoundFail(track_id));
  }
  Ok(())
}

// Querying ratings

impl DatabaseConnection {
  pub fn get_rating(&mut self, user_id: i32, track_id: i32) -> Result<Option<Rating>, DatabaseQueryError> {
    Ok(rating::table
      .filter(rating::user_id.eq(user_id))
      .filter(rating::track_id.eq(track_id))
      .select(Rating::as_select())
      .first(self.connection())
      .optional()?)
  }

  pub fn list_ratings_by_track(&mut self, track_id: i32) -> Result<Vec<Rating>, DatabaseQueryError> {
    Ok(rating::table
      .filter(rating::track_id.eq(track_id))
      .order(rating::id)
      .select(Rating::as_select())
      .load(self.connection())?)
  }

  pub fn list_ratings_by_user(&mut self, user_id: i32) -> Result<Vec<Rating>, DatabaseQueryError> {
    Ok(rating::table
      .filter(rating::user_id.eq(user_id))
      .order(rating::id)
      .select(Rating::as_select())
      .load(self.connection())?)
  }

  /// Arithmetic mean of all ratings of a track, or `None` when the track has no ratings.
  pub fn average_rating(&mut self, track_id: i32) -> Result<Option<f64>, DatabaseQueryError> {
    let values: Vec<i32> = time!("average_rating.select", rating::table
      .filter(rating::track_id.eq(track_id))
      .select(rating::score)
      .load(self.connection())?);
    Ok(average(&values))
  }
}

fn average(values: &[i32]) -> Option<f64> {
  if values.is_empty() {
    None
  } else {
    let sum: i64 = values.iter().map(|v| *v as i64).sum();
    Some(sum as f64 / values.len() as f64)
  }
}
