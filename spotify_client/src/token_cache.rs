use std::future::Future;

use chrono::{Duration, NaiveDateTime, Utc};
use tokio::sync::Mutex;

/// Access token for the Spotify Web API, valid until `expiry_date` (UTC).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccessToken {
  pub access_token: String,
  pub expiry_date: NaiveDateTime,
}

impl AccessToken {
  /// Tokens are refreshed this many seconds before they actually expire.
  pub const EXPIRY_MARGIN_SECONDS: i64 = 60;

  pub fn new(access_token: impl Into<String>, expires_in_seconds: i64) -> Self {
    Self {
      access_token: access_token.into(),
      expiry_date: (Utc::now() + Duration::seconds(expires_in_seconds)).naive_utc(),
    }
  }

  pub fn is_fresh_at(&self, now: NaiveDateTime) -> bool {
    now < self.expiry_date - Duration::seconds(Self::EXPIRY_MARGIN_SECONDS)
  }
}

/// Single-slot cache for the application access token.
///
/// The slot is only accessed through [`TokenCache::get_or_refresh`] and [`TokenCache::invalidate`], which take the
/// lock for the duration of the access. A refresh happens while holding the lock, so concurrent callers wait for the
/// refreshed token instead of each requesting their own.
#[derive(Default, Debug)]
pub struct TokenCache {
  slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
  pub fn new() -> Self { Self::default() }

  /// Returns the cached access token if it is fresh, otherwise stores and returns the token produced by `refresh`.
  /// When `refresh` fails, the slot is left as it was.
  pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<String, E> where
    F: FnOnce() -> Fut,
    Fut: Future<Output=Result<AccessToken, E>>,
  {
    let mut slot = self.slot.lock().await;
    if let Some(token) = slot.as_ref() {
      if token.is_fresh_at(Utc::now().naive_utc()) {
        return Ok(token.access_token.clone());
      }
    }
    let token = refresh().await?;
    let access_token = token.access_token.clone();
    *slot = Some(token);
    Ok(access_token)
  }

  /// Clears the slot if it still holds `access_token`. A token that was already replaced by a newer one is kept.
  pub async fn invalidate(&self, access_token: &str) {
    let mut slot = self.slot.lock().await;
    if slot.as_ref().map_or(false, |t| t.access_token == access_token) {
      *slot = None;
    }
  }

  pub async fn current(&self) -> Option<AccessToken> {
    self.slot.lock().await.clone()
  }
}


#[cfg(test)]
mod tests {
  use std::convert::Infallible;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  async fn refresh_counting(counter: &AtomicUsize, expires_in_seconds: i64) -> Result<AccessToken, Infallible> {
    let n = counter.fetch_add(1, Ordering::SeqCst);
    Ok(AccessToken::new(format!("token-{}", n), expires_in_seconds))
  }

  #[test]
  fn token_within_margin_is_not_fresh() {
    let now = Utc::now().naive_utc();
    let token = AccessToken { access_token: "t".to_owned(), expiry_date: now + Duration::seconds(59) };
    assert!(!token.is_fresh_at(now));
    let token = AccessToken { access_token: "t".to_owned(), expiry_date: now + Duration::seconds(61) };
    assert!(token.is_fresh_at(now));
  }

  #[tokio::test]
  async fn fresh_token_is_reused() {
    let cache = TokenCache::new();
    let counter = AtomicUsize::new(0);
    let first = cache.get_or_refresh(|| refresh_counting(&counter, 3600)).await.unwrap();
    let second = cache.get_or_refresh(|| refresh_counting(&counter, 3600)).await.unwrap();
    assert_eq!(first, "token-0");
    assert_eq!(second, "token-0");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn nearly_expired_token_is_refreshed() {
    let cache = TokenCache::new();
    let counter = AtomicUsize::new(0);
    cache.get_or_refresh(|| refresh_counting(&counter, 30)).await.unwrap();
    let second = cache.get_or_refresh(|| refresh_counting(&counter, 3600)).await.unwrap();
    assert_eq!(second, "token-1");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn invalidate_only_clears_matching_token() {
    let cache = TokenCache::new();
    let counter = AtomicUsize::new(0);
    cache.get_or_refresh(|| refresh_counting(&counter, 3600)).await.unwrap();
    cache.invalidate("some-other-token").await;
    assert!(cache.current().await.is_some());
    cache.invalidate("token-0").await;
    assert!(cache.current().await.is_none());
    let refreshed = cache.get_or_refresh(|| refresh_counting(&counter, 3600)).await.unwrap();
    assert_eq!(refreshed, "token-1");
  }

  #[tokio::test]
  async fn failed_refresh_keeps_slot_empty() {
    let cache = TokenCache::new();
    let result: Result<String, &str> = cache.get_or_refresh(|| async { Err("no network") }).await;
    assert_eq!(result, Err("no network"));
    assert!(cache.current().await.is_none());
  }
}
