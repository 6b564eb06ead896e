use std::fmt::{Display, Error, Formatter};

use chrono::NaiveDateTime;

#[cfg(feature = "diesel")]
use crate::schema::*;
#[cfg(feature = "diesel")]
use diesel::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//
// Catalog
//

// Track

#[derive(Clone, PartialOrd, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "diesel", derive(Identifiable, Queryable, Selectable), diesel(table_name = track))]
pub struct Track {
  pub id: i32,
  pub title: String,
  pub artist: String,
  pub album: Option<String>,
  pub release_year: Option<i32>,
  pub image_url: Option<String>,
  pub created_at: NaiveDateTime,
}

#[derive(Default, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "diesel", derive(Insertable), diesel(table_name = track))]
pub struct NewTrack {
  pub title: String,
  pub artist: String,
  #[cfg_attr(feature = "serde", serde(default))]
  pub album: Option<String>,
  #[cfg_attr(feature = "serde", serde(default))]
  pub release_year: Option<i32>,
  #[cfg_attr(feature = "serde", serde(default))]
  pub image_url: Option<String>,
}

impl NewTrack {
  pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
    Self { title: title.into(), artist: artist.into(), ..Self::default() }
  }

  pub fn with_album(mut self, album: impl Into<String>) -> Self {
    self.album = Some(album.into());
    self
  }

  pub fn with_release_year(mut self, release_year: i32) -> Self {
    self.release_year = Some(release_year);
    self
  }
}


//
// Identity
//

// User (without password hash and salt)

#[derive(Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "diesel", derive(Identifiable, Queryable, Selectable), diesel(table_name = user))]
pub struct User {
  pub id: i32,
  pub username: String,
  pub email: String,
  pub provider_id: Option<String>,
  pub display_name: Option<String>,
  pub created_at: NaiveDateTime,
}

#[derive(Default, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserLogin {
  pub name: String,
  pub password: String,
}

#[derive(Default, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewUser {
  pub username: String,
  pub email: String,
  pub password: String,
}

/// Profile of a user as reported by an external OAuth provider after sign-in.
#[derive(Default, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalProfile {
  pub id: Option<String>,
  pub email: Option<String>,
  pub display_name: Option<String>,
  pub name: Option<String>,
}

impl ExternalProfile {
  /// Display name, falling back to the plain name when the provider has no display name.
  pub fn preferred_name(&self) -> Option<&str> {
    self.display_name.as_deref().or(self.name.as_deref())
  }
}


//
// User engagement
//

// Rating

#[derive(Clone, PartialOrd, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "diesel", derive(Identifiable, Queryable, Selectable), diesel(table_name = rating))]
pub struct Rating {
  pub id: i32,
  pub user_id: i32,
  pub track_id: i32,
  #[cfg_attr(feature = "diesel", diesel(column_name = score))]
  pub rating: i32,
  pub comment: Option<String>,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

#[derive(Default, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewRating {
  pub user_id: i32,
  pub track_id: i32,
  pub rating: i32,
  #[cfg_attr(feature = "serde", serde(default))]
  pub comment: Option<String>,
}

// Tracked track

#[derive(Clone, PartialOrd, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "diesel", derive(Identifiable, Queryable, Selectable), diesel(table_name = tracked_track))]
pub struct TrackedTrack {
  pub id: i32,
  pub user_id: i32,
  pub track_id: i32,
  pub tracked_at: NaiveDateTime,
  pub notes: Option<String>,
  pub play_count: i32,
}

#[derive(Default, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewTrackedTrack {
  pub user_id: i32,
  pub track_id: i32,
  #[cfg_attr(feature = "serde", serde(default))]
  pub notes: Option<String>,
}


//
// Display implementations
//

impl Display for Track {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
    write!(f, "{:>6}: {} - {}", self.id, self.artist, self.title)?;
    match (&self.album, self.release_year) {
      (Some(album), Some(year)) => write!(f, " ({}, {})", album, year)?,
      (Some(album), None) => write!(f, " ({})", album)?,
      (None, Some(year)) => write!(f, " ({})", year)?,
      _ => {}
    }
    Ok(())
  }
}

impl Display for User {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
    write!(f, "{:>6}: {} <{}>", self.id, self.username, self.email)
  }
}


#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
  }

  #[test]
  fn track_display_includes_optional_album_and_year() {
    let mut track = Track {
      id: 7,
      title: "Yesterday".to_owned(),
      artist: "The Beatles".to_owned(),
      album: Some("Help!".to_owned()),
      release_year: Some(1965),
      image_url: None,
      created_at: timestamp(),
    };
    assert_eq!(track.to_string(), "     7: The Beatles - Yesterday (Help!, 1965)");
    track.album = None;
    assert_eq!(track.to_string(), "     7: The Beatles - Yesterday (1965)");
    track.release_year = None;
    assert_eq!(track.to_string(), "     7: The Beatles - Yesterday");
  }

  #[test]
  fn preferred_name_falls_back_to_name() {
    let mut profile = ExternalProfile {
      id: Some("p1".to_owned()),
      name: Some("Alfred".to_owned()),
      ..ExternalProfile::default()
    };
    assert_eq!(profile.preferred_name(), Some("Alfred"));
    profile.display_name = Some("Al".to_owned());
    assert_eq!(profile.preferred_name(), Some("Al"));
  }

  #[cfg(feature = "serde")]
  #[test]
  fn new_track_optional_fields_default_to_none() {
    let new_track: NewTrack = serde_json::from_str(r#"{"title":"Song","artist":"Band"}"#).unwrap();
    assert_eq!(new_track, NewTrack::new("Song", "Band"));
  }
}
