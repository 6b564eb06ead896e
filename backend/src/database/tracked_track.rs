use diesel::prelude::*;
use thiserror::Error;
use tracing::{event, instrument, Level};

use tracktracker_core::model::{NewTrackedTrack, TrackedTrack};
use tracktracker_core::schema::tracked_track;

use super::{DatabaseConnection, DatabaseQueryError, non_blank, now, track_exists, user_exists};

// Tracking and untracking

#[derive(Debug, Error)]
pub enum TrackedTrackError {
  #[error("User not found")]
  UserNotFoundFail(i32),
  #[error("Track not found")]
  TrackNotFoundFail(i32),
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl TrackedTrackError {
  pub fn is_validation_failure(&self) -> bool {
    !matches!(self, TrackedTrackError::DatabaseQueryFail(_))
  }
}

impl DatabaseConnection {
  /// Adds a track to the collection of a user. Tracking an already tracked track returns the existing entry unchanged.
  #[instrument(level = "debug", skip(self, new_tracked_track), fields(user_id = new_tracked_track.user_id, track_id = new_tracked_track.track_id))]
  pub fn track_track(&mut self, new_tracked_track: &NewTrackedTrack) -> Result<TrackedTrack, TrackedTrackError> {
    use TrackedTrackError::*;
    let user_id = new_tracked_track.user_id;
    let track_id = new_tracked_track.track_id;
    let notes = non_blank(new_tracked_track.notes.as_deref());
    self.connection().immediate_transaction(|connection| {
      if !user_exists(connection, user_id)? {
        return Err(UserNotFoundFail(user_id));
      }
      if !track_exists(connection, track_id)? {
        return Err(TrackNotFoundFail(track_id));
      }
      let existing: Option<TrackedTrack> = tracked_track::table
        .filter(tracked_track::user_id.eq(user_id))
        .filter(tracked_track::track_id.eq(track_id))
        .select(TrackedTrack::as_select())
        .first(connection)
        .optional()?;
      if let Some(existing) = existing {
        event!(Level::DEBUG, id = existing.id, "Track already tracked");
        return Ok(existing);
      }
      Ok(time!("track_track.insert", diesel::insert_into(tracked_track::table)
        .values((
          tracked_track::user_id.eq(user_id),
          tracked_track::track_id.eq(track_id),
          tracked_track::tracked_at.eq(now()),
          tracked_track::notes.eq(&notes),
          tracked_track::play_count.eq(0),
        ))
        .returning(TrackedTrack::as_returning())
        .get_result(connection)?))
    })
  }

  /// Removes a track from the collection of a user, returning whether it was tracked.
  pub fn untrack_track(&mut self, user_id: i32, track_id: i32) -> Result<bool, DatabaseQueryError> {
    let deleted = time!("untrack_track.delete", diesel::delete(tracked_track::table)
      .filter(tracked_track::user_id.eq(user_id))
      .filter(tracked_track::track_id.eq(track_id))
      .execute(self.connection())?);
    Ok(deleted > 0)
  }

  /// Increments the play count of a tracked track. Returns `None` without creating anything when the track is not
  /// tracked by the user.
  pub fn increment_play_count(&mut self, user_id: i32, track_id: i32) -> Result<Option<TrackedTrack>, DatabaseQueryError> {
    Ok(time!("increment_play_count.update", diesel::update(tracked_track::table)
      .filter(tracked_track::user_id.eq(user_id))
      .filter(tracked_track::track_id.eq(track_id))
      .set(tracked_track::play_count.eq(tracked_track::play_count + 1))
      .returning(TrackedTrack::as_returning())
      .get_result(self.connection())
      .optional()?))
  }
}

// Querying tracked tracks

impl DatabaseConnection {
  pub fn get_tracked_track(&mut self, user_id: i32, track_id: i32) -> Result<Option<TrackedTrack>, DatabaseQueryError> {
    Ok(tracked_track::table
      .filter(tracked_track::user_id.eq(user_id))
      .filter(tracked_track::track_id.eq(track_id))
      .select(TrackedTrack::as_select())
      .first(self.connection())
      .optional()?)
  }

  pub fn list_tracked_tracks(&mut self, user_id: i32) -> Result<Vec<TrackedTrack>, DatabaseQueryError> {
    Ok(tracked_track::table
      .filter(tracked_track::user_id.eq(user_id))
      .order((tracked_track::tracked_at, tracked_track::id))
      .select(TrackedTrack::as_select())
      .load(self.connection())?)
  }

  /// Tracked tracks of a user, most recently tracked first, limited to `limit` entries if given.
  pub fn list_recent_tracked_tracks(&mut self, user_id: i32, limit: Option<i64>) -> Result<Vec<TrackedTrack>, DatabaseQueryError> {
    let mut select_query = tracked_track::table
      .filter(tracked_track::user_id.eq(user_id))
      .order((tracked_track::tracked_at.desc(), tracked_track::id.desc()))
      .select(TrackedTrack::as_select())
      .into_boxed();
    if let Some(limit) = limit {
      select_query = select_query.limit(limit.max(0));
    }
    Ok(time!("list_recent_tracked_tracks.select", select_query.load(self.connection())?))
  }
}
