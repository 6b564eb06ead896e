use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tracing::{event, instrument, Level};

use tracktracker_core::format_error::FormatError;
use tracktracker_core::model::{NewTrack, Track};
use tracktracker_spotify_client::{HttpRequestError, SpotifyClient};

use crate::database::{Database, DatabaseConnectError, DatabaseQueryError};
use crate::database::track::TrackCreateError;

/// Search results beyond this many items cannot be paged to.
pub const SEARCH_RESULT_WINDOW: usize = 1000;
/// Maximum number of items per search request.
pub const SEARCH_PAGE_LIMIT: usize = SpotifyClient::SEARCH_PAGE_LIMIT as usize;

// Deduplication policy

/// Decides whether an imported track duplicates a stored one. All comparisons ignore case.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub enum DedupPolicy {
  /// Stored title contains the imported title, and artists are equal.
  #[default]
  TitleContainsArtistEquals,
  /// Titles are equal, and artists are equal.
  TitleAndArtistEqual,
  /// Nothing is a duplicate.
  Disabled,
}

impl DedupPolicy {
  pub fn is_duplicate(&self, existing_title: &str, existing_artist: &str, title: &str, artist: &str) -> bool {
    let same_artist = || existing_artist.to_lowercase() == artist.to_lowercase();
    match self {
      DedupPolicy::TitleContainsArtistEquals => existing_title.to_lowercase().contains(&title.to_lowercase()) && same_artist(),
      DedupPolicy::TitleAndArtistEqual => existing_title.to_lowercase() == title.to_lowercase() && same_artist(),
      DedupPolicy::Disabled => false,
    }
  }
}

#[derive(Debug, Error)]
#[error("Unknown deduplication policy '{0}', expected one of 'title-contains-artist-equals', 'title-and-artist-equal', or 'disabled'")]
pub struct DedupPolicyParseError(String);

impl FromStr for DedupPolicy {
  type Err = DedupPolicyParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "title-contains-artist-equals" => Ok(DedupPolicy::TitleContainsArtistEquals),
      "title-and-artist-equal" => Ok(DedupPolicy::TitleAndArtistEqual),
      "disabled" => Ok(DedupPolicy::Disabled),
      _ => Err(DedupPolicyParseError(s.to_owned())),
    }
  }
}

impl Display for DedupPolicy {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      DedupPolicy::TitleContainsArtistEquals => "title-contains-artist-equals",
      DedupPolicy::TitleAndArtistEqual => "title-and-artist-equal",
      DedupPolicy::Disabled => "disabled",
    };
    f.write_str(name)
  }
}

// Track source

/// Source of raw track objects in the Spotify track object format.
#[async_trait]
pub trait TrackSource: Send + Sync {
  async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Value>, HttpRequestError>;

  async fn get_playlist_tracks(&self, playlist_id: &str, limit: usize) -> Result<Vec<Value>, HttpRequestError>;
}

#[async_trait]
impl TrackSource for SpotifyClient {
  async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Value>, HttpRequestError> {
    SpotifyClient::search_tracks(self, query, limit, offset).await
  }

  async fn get_playlist_tracks(&self, playlist_id: &str, limit: usize) -> Result<Vec<Value>, HttpRequestError> {
    SpotifyClient::get_playlist_tracks(self, playlist_id, limit).await
  }
}

// Importer

#[derive(Clone)]
pub struct Importer {
  database: Database,
  source: Option<Arc<dyn TrackSource>>,
  dedup_policy: DedupPolicy,
}

impl Importer {
  /// Creates an importer; it is disabled when `source` is `None`.
  pub fn new(database: Database, source: Option<Arc<dyn TrackSource>>, dedup_policy: DedupPolicy) -> Self {
    Self { database, source, dedup_policy }
  }

  pub fn from_spotify_client(database: Database, spotify_client: Option<SpotifyClient>, dedup_policy: DedupPolicy) -> Self {
    let source = spotify_client.map(|c| Arc::new(c) as Arc<dyn TrackSource>);
    Self::new(database, source, dedup_policy)
  }

  pub fn is_enabled(&self) -> bool { self.source.is_some() }
}

impl Importer {
  /// Imports up to `limit` tracks of a playlist, returning the newly stored tracks.
  #[instrument(level = "debug", skip(self))]
  pub async fn import_from_playlist(&self, playlist_id: &str, limit: usize) -> Vec<Track> {
    let source = match &self.source {
      Some(source) => source,
      None => return Vec::new(),
    };
    match source.get_playlist_tracks(playlist_id, limit).await {
      Ok(items) => self.store(items).await,
      Err(e) => {
        event!(Level::WARN, playlist_id, "Failed to get playlist tracks: {:?}", FormatError::new(&e));
        Vec::new()
      }
    }
  }

  /// Imports up to `size` tracks found by searching for a random letter at a random offset, returning the newly
  /// stored tracks.
  #[instrument(level = "debug", skip(self))]
  pub async fn import_random_tracks(&self, size: usize) -> Vec<Track> {
    let source = match &self.source {
      Some(source) => source,
      None => return Vec::new(),
    };
    let size = size.min(SEARCH_RESULT_WINDOW);
    if size == 0 {
      return Vec::new();
    }
    let (query, start_offset) = {
      let mut rng = rand::thread_rng();
      (random_letter(&mut rng).to_string(), random_offset(size, &mut rng))
    };
    event!(Level::DEBUG, %query, start_offset, "Searching random tracks");
    let mut items = Vec::with_capacity(size);
    let mut offset = start_offset;
    while items.len() < size {
      let page_limit = (size - items.len()).min(SEARCH_PAGE_LIMIT);
      match source.search_tracks(&query, page_limit as u32, offset as u32).await {
        Ok(page) => {
          let len = page.len();
          items.extend(page);
          offset += page_limit;
          if len < page_limit { break; }
        }
        Err(e) => {
          event!(Level::WARN, %query, offset, "Failed to search tracks: {:?}", FormatError::new(&e));
          if items.is_empty() { return Vec::new(); }
          break;
        }
      }
    }
    items.truncate(size);
    self.store(items).await
  }

  /// Searches for tracks without storing them. `limit` is clamped to `1..=50` and `offset` to non-negative values.
  #[instrument(level = "debug", skip(self))]
  pub async fn search_spotify_tracks(&self, query: &str, limit: i64, offset: i64) -> Vec<Value> {
    let source = match &self.source {
      Some(source) => source,
      None => return Vec::new(),
    };
    let limit = limit.clamp(1, SEARCH_PAGE_LIMIT as i64) as u32;
    let offset = offset.clamp(0, u32::MAX as i64) as u32;
    match source.search_tracks(query, limit, offset).await {
      Ok(items) => items,
      Err(e) => {
        event!(Level::WARN, query, "Failed to search tracks: {:?}", FormatError::new(&e));
        Vec::new()
      }
    }
  }
}

// Storing

#[derive(Debug, Error)]
enum StoreError {
  #[error(transparent)]
  DatabaseConnectFail(#[from] DatabaseConnectError),
  #[error(transparent)]
  DatabaseQueryFail(#[from] DatabaseQueryError),
  #[error(transparent)]
  TrackCreateFail(#[from] TrackCreateError),
  #[error("Database task panicked or was cancelled")]
  TaskJoinFail(#[from] tokio::task::JoinError),
}

impl Importer {
  async fn store(&self, items: Vec<Value>) -> Vec<Track> {
    let received = items.len();
    let candidates = dedup_batch(items.into_iter().filter_map(parse_track).collect(), self.dedup_policy);
    if candidates.is_empty() {
      event!(Level::DEBUG, received, "No importable tracks");
      return Vec::new();
    }
    let database = self.database.clone();
    let dedup_policy = self.dedup_policy;
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<Track>, StoreError> {
      let mut connection = database.connect()?;
      let mut new_tracks = Vec::with_capacity(candidates.len());
      for candidate in candidates {
        if connection.find_duplicate_track(&candidate.title, &candidate.artist, dedup_policy)?.is_none() {
          new_tracks.push(candidate);
        }
      }
      Ok(connection.insert_tracks(&new_tracks)?)
    }).await;
    match result.map_err(StoreError::from).and_then(|r| r) {
      Ok(tracks) => {
        event!(Level::INFO, received, imported = tracks.len(), "Imported tracks");
        tracks
      }
      Err(e) => {
        event!(Level::WARN, "Failed to store imported tracks: {:?}", FormatError::new(&e));
        Vec::new()
      }
    }
  }
}

/// Drops candidates that duplicate an earlier candidate of the same batch.
fn dedup_batch(candidates: Vec<NewTrack>, policy: DedupPolicy) -> Vec<NewTrack> {
  let mut kept: Vec<NewTrack> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    if !kept.iter().any(|k| policy.is_duplicate(&k.title, &k.artist, &candidate.title, &candidate.artist)) {
      kept.push(candidate);
    }
  }
  kept
}

// Parsing

/// Parses a track object. Returns `None` when the object is malformed or has no name.
pub fn parse_track(value: Value) -> Option<NewTrack> {
  let track: tracktracker_spotify_client::Track = match serde_json::from_value(value) {
    Ok(track) => track,
    Err(e) => {
      event!(Level::DEBUG, "Skipping malformed track object: {}", e);
      return None;
    }
  };
  let title = track.name.filter(|n| !n.trim().is_empty())?;
  let artist = track.artists
    .and_then(|artists| artists.into_iter().next())
    .and_then(|artist| artist.name)
    .filter(|n| !n.trim().is_empty())
    .unwrap_or_else(|| "Unknown".to_owned());
  let (album, release_year, image_url) = match track.album {
    Some(album) => (
      album.name,
      album.release_date.as_deref().and_then(parse_release_year),
      album.images.and_then(|images| images.into_iter().next()).map(|image| image.url),
    ),
    None => (None, None, None),
  };
  Some(NewTrack { title, artist, album, release_year, image_url })
}

/// Year of a release date such as `1999-05-01` or `1999`: the first four characters as integer.
pub fn parse_release_year(release_date: &str) -> Option<i32> {
  release_date.get(..4)?.parse().ok()
}

/// Random search offset such that `offset + size` stays within the search result window.
pub fn random_offset<R: Rng>(size: usize, rng: &mut R) -> usize {
  if size >= SEARCH_RESULT_WINDOW {
    0
  } else {
    rng.gen_range(0..=SEARCH_RESULT_WINDOW - size)
  }
}

pub fn random_letter<R: Rng>(rng: &mut R) -> char {
  (b'a' + rng.gen_range(0..26u8)) as char
}


// Debug implementations

impl Debug for Importer {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Importer")
      .field("enabled", &self.is_enabled())
      .field("dedup_policy", &self.dedup_policy)
      .finish()
  }
}
