use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use tracktracker_backend::import::{SEARCH_RESULT_WINDOW, TrackSource};
use tracktracker_spotify_client::{HttpRequestError, HttpStatusCode, SpotifyError};

/// Search request as received by a fake source: query, limit, offset.
pub type SearchRequest = (String, u32, u32);

/// Serves generated search results, where result `i` is `Song i` by `Artist i`, and a fixed playlist.
#[derive(Default)]
pub struct FakeSource {
  pub playlist: Vec<Value>,
  pub search_requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSource {
  pub fn with_playlist(playlist: Vec<Value>) -> Self {
    Self { playlist, ..Self::default() }
  }

  pub fn search_requests(&self) -> Vec<SearchRequest> {
    self.search_requests.lock().unwrap().clone()
  }
}

pub fn track_json(title: &str, artist: &str) -> Value {
  json!({ "name": title, "artists": [{ "name": artist }], "album": { "name": "Album", "release_date": "2001-02-03" } })
}

#[async_trait]
impl TrackSource for FakeSource {
  async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Value>, HttpRequestError> {
    self.search_requests.lock().unwrap().push((query.to_owned(), limit, offset));
    let end = (offset + limit).min(SEARCH_RESULT_WINDOW as u32);
    Ok((offset..end).map(|i| track_json(&format!("Song {}", i), &format!("Artist {}", i))).collect())
  }

  async fn get_playlist_tracks(&self, _playlist_id: &str, limit: usize) -> Result<Vec<Value>, HttpRequestError> {
    Ok(self.playlist.iter().take(limit).cloned().collect())
  }
}

/// Fails every request as if the service were unavailable.
pub struct FailingSource;

fn unavailable() -> HttpRequestError {
  HttpRequestError::UnexpectedStatusCodeFail(SpotifyError::ErrorWithoutMessage(HttpStatusCode::SERVICE_UNAVAILABLE))
}

#[async_trait]
impl TrackSource for FailingSource {
  async fn search_tracks(&self, _query: &str, _limit: u32, _offset: u32) -> Result<Vec<Value>, HttpRequestError> {
    Err(unavailable())
  }

  async fn get_playlist_tracks(&self, _playlist_id: &str, _limit: usize) -> Result<Vec<Value>, HttpRequestError> {
    Err(unavailable())
  }
}
