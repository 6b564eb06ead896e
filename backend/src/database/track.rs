use diesel::prelude::*;
use thiserror::Error;

use tracktracker_core::model::{NewTrack, Track};
use tracktracker_core::schema::track;

use crate::import::DedupPolicy;

use super::{contains_pattern, DatabaseConnection, DatabaseQueryError, non_blank, now, unicode_lower};

diesel::define_sql_function!(fn random() -> Integer);

// Creating tracks

#[derive(Debug, Error)]
pub enum TrackCreateError {
  #[error("Track title must not be empty")]
  EmptyTitleFail,
  #[error("Track artist must not be empty")]
  EmptyArtistFail,
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl TrackCreateError {
  pub fn is_validation_failure(&self) -> bool {
    !matches!(self, TrackCreateError::DatabaseQueryFail(_))
  }
}

/// Trims all fields, maps blank optional fields to `None`, and rejects blank titles or artists.
fn validate_new_track(new_track: &NewTrack) -> Result<NewTrack, TrackCreateError> {
  use TrackCreateError::*;
  let title = non_blank(Some(&new_track.title)).ok_or(EmptyTitleFail)?;
  let artist = non_blank(Some(&new_track.artist)).ok_or(EmptyArtistFail)?;
  Ok(NewTrack {
    title,
    artist,
    album: non_blank(new_track.album.as_deref()),
    release_year: new_track.release_year,
    image_url: non_blank(new_track.image_url.as_deref()),
  })
}

impl DatabaseConnection {
  pub fn create_track(&mut self, new_track: &NewTrack) -> Result<Track, TrackCreateError> {
    let new_track = validate_new_track(new_track)?;
    let insert_query = diesel::insert_into(track::table)
      .values((&new_track, track::created_at.eq(now())))
      .returning(Track::as_returning());
    Ok(time!("create_track.insert", insert_query.get_result(self.connection())?))
  }

  /// Inserts all tracks in one transaction; when any track is invalid, nothing is inserted.
  pub fn insert_tracks(&mut self, new_tracks: &[NewTrack]) -> Result<Vec<Track>, TrackCreateError> {
    let new_tracks = new_tracks.iter().map(validate_new_track).collect::<Result<Vec<_>, _>>()?;
    let created_at = now();
    self.connection().immediate_transaction(|connection| {
      let mut tracks = Vec::with_capacity(new_tracks.len());
      for new_track in &new_tracks {
        let track = time!("insert_tracks.insert", diesel::insert_into(track::table)
          .values((new_track, track::created_at.eq(created_at)))
          .returning(Track::as_returning())
          .get_result(connection)?);
        tracks.push(track);
      }
      Ok(tracks)
    })
  }
}

// Querying tracks

impl DatabaseConnection {
  pub fn get_track_by_id(&mut self, id: i32) -> Result<Option<Track>, DatabaseQueryError> {
    Ok(track::table.find(id).select(Track::as_select()).first(self.connection()).optional()?)
  }

  pub fn count_tracks(&mut self) -> Result<i64, DatabaseQueryError> {
    Ok(time!("count_tracks.select", track::table.count().get_result(self.connection())?))
  }

  /// Tracks where the title, artist, or album contains `query`, ignoring ASCII case.
  pub fn search_tracks(&mut self, query: &str) -> Result<Vec<Track>, DatabaseQueryError> {
    let pattern = contains_pattern(query);
    let select_query = track::table
      .filter(track::title.like(&pattern).escape('\\')
        .or(track::artist.like(&pattern).escape('\\'))
        .or(track::album.assume_not_null().like(&pattern).escape('\\')))
      .order(track::id)
      .select(Track::as_select());
    Ok(time!("search_tracks.select", select_query.load(self.connection())?))
  }

  pub fn find_tracks_by_title(&mut self, query: &str) -> Result<Vec<Track>, DatabaseQueryError> {
    let select_query = track::table
      .filter(track::title.like(contains_pattern(query)).escape('\\'))
      .order(track::id)
      .select(Track::as_select());
    Ok(select_query.load(self.connection())?)
  }

  pub fn find_tracks_by_artist(&mut self, query: &str) -> Result<Vec<Track>, DatabaseQueryError> {
    let select_query = track::table
      .filter(track::artist.like(contains_pattern(query)).escape('\\'))
      .order(track::id)
      .select(Track::as_select());
    Ok(select_query.load(self.connection())?)
  }

  pub fn find_tracks_by_album(&mut self, query: &str) -> Result<Vec<Track>, DatabaseQueryError> {
    let select_query = track::table
      .filter(track::album.assume_not_null().like(contains_pattern(query)).escape('\\'))
      .order(track::id)
      .select(Track::as_select());
    Ok(select_query.load(self.connection())?)
  }

  /// Up to `limit` tracks in random order.
  pub fn random_tracks(&mut self, limit: i64) -> Result<Vec<Track>, DatabaseQueryError> {
    let select_query = track::table
      .order(random())
      .limit(limit.max(0))
      .select(Track::as_select());
    Ok(time!("random_tracks.select", select_query.load(self.connection())?))
  }

  /// Finds a stored track that `policy` considers a duplicate of a track with `title` and `artist`.
  pub fn find_duplicate_track(&mut self, title: &str, artist: &str, policy: DedupPolicy) -> Result<Option<Track>, DatabaseQueryError> {
    if policy == DedupPolicy::Disabled {
      return Ok(None);
    }
    // Every policy requires equal artists and the stored title to contain the given title; narrow down in SQL first.
    let candidates = time!("find_duplicate_track.select", track::table
      .filter(unicode_lower(track::title).like(contains_pattern(&title.to_lowercase())).escape('\\'))
      .filter(unicode_lower(track::artist).eq(artist.to_lowercase()))
      .select(Track::as_select())
      .load(self.connection())?);
    Ok(candidates.into_iter().find(|t| policy.is_duplicate(&t.title, &t.artist, title, artist)))
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_trims_and_drops_blank_optionals() {
    let new_track = NewTrack {
      title: "  Song ".to_owned(),
      artist: "Band".to_owned(),
      album: Some("   ".to_owned()),
      release_year: Some(2001),
      image_url: Some(" http://img ".to_owned()),
    };
    let validated = validate_new_track(&new_track).unwrap();
    assert_eq!(validated.title, "Song");
    assert_eq!(validated.album, None);
    assert_eq!(validated.image_url.as_deref(), Some("http://img"));
  }

  #[test]
  fn validation_rejects_blank_title_and_artist() {
    assert!(matches!(validate_new_track(&NewTrack::new(" ", "Band")), Err(TrackCreateError::EmptyTitleFail)));
    assert!(matches!(validate_new_track(&NewTrack::new("Song", "")), Err(TrackCreateError::EmptyArtistFail)));
  }
}
