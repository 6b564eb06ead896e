use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use reqwest::{Client, IntoUrl, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{event, instrument, Level};

pub use reqwest::StatusCode as HttpStatusCode;
pub use token_cache::{AccessToken, TokenCache};

mod token_cache;

#[derive(Clone)]
pub struct SpotifyClient {
  http_client: Client,
  accounts_api_base_url: Url,
  api_base_url: Url,
  client_id: String,
  client_secret: String,
  token_cache: Arc<TokenCache>,
}

// Creation

#[derive(Debug, Error)]
pub enum CreateError {
  #[error(transparent)]
  UrlCreateFail(#[from] url::ParseError),
  #[error(transparent)]
  HttpClientCreateFail(#[from] reqwest::Error),
}

impl SpotifyClient {
  pub fn new<U1: IntoUrl, U2: IntoUrl>(
    http_client: Client,
    accounts_api_base_url: U1,
    api_base_url: U2,
    client_id: String,
    client_secret: String,
  ) -> Result<Self, CreateError> {
    let accounts_api_base_url = accounts_api_base_url.into_url()?;
    let api_base_url = api_base_url.into_url()?;
    Ok(Self {
      http_client,
      accounts_api_base_url,
      api_base_url,
      client_id,
      client_secret,
      token_cache: Arc::new(TokenCache::new()),
    })
  }

  pub fn new_from_client_id_secret(
    client_id: String,
    client_secret: String,
  ) -> Result<Self, CreateError> {
    let http_client = Client::builder().gzip(true).build()?;
    let accounts_api_base_url = "https://accounts.spotify.com/";
    let api_base_url = "https://api.spotify.com/v1/";
    Self::new(http_client, accounts_api_base_url, api_base_url, client_id, client_secret)
  }

  /// Creates a client when both the client ID and secret are non-blank, or returns `None` otherwise.
  pub fn new_if_configured(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
  ) -> Result<Option<Self>, CreateError> {
    let client_id = client_id.into();
    let client_secret = client_secret.into();
    if client_id.trim().is_empty() || client_secret.trim().is_empty() {
      return Ok(None);
    }
    Ok(Some(Self::new_from_client_id_secret(client_id, client_secret)?))
  }
}

// Create authorization URL

#[derive(Debug, Error)]
pub enum CreateAuthorizationUrlError {
  #[error(transparent)]
  UrlJoinFail(#[from] url::ParseError),
  #[error(transparent)]
  HttpRequestBuildFail(#[from] reqwest::Error),
}

impl SpotifyClient {
  pub const SIGN_IN_SCOPES: &'static str = "user-read-email user-read-private";

  pub fn create_authorization_url(
    &self,
    redirect_uri: impl Into<String>,
    state: Option<impl Into<String>>,
  ) -> Result<String, CreateAuthorizationUrlError> {
    let url = self.accounts_api_base_url.join("authorize")?;
    let query_map = {
      let mut map = HashMap::new();
      map.insert("client_id", self.client_id.clone());
      map.insert("response_type", "code".to_owned());
      map.insert("redirect_uri", redirect_uri.into());
      if let Some(state) = state {
        map.insert("state", state.into());
      }
      map.insert("scope", Self::SIGN_IN_SCOPES.to_owned());
      map
    };
    let request = self.http_client
      .get(url)
      .query(&query_map)
      ;
    Ok(request.build()?.url().to_string())
  }
}

// Authorization requests

#[derive(Debug, Error)]
pub enum SpotifyAuthError {
  #[error("status code '{0}', error message '{1}', and error description '{2}'")]
  Error(StatusCode, String, String),
  #[error("status code '{0}'")]
  ErrorWithoutMessage(StatusCode),
}

#[derive(Debug, Error)]
pub enum AuthorizationHttpRequestError {
  #[error(transparent)]
  UrlJoinFail(#[from] url::ParseError),
  #[error("HTTP request failed")]
  HttpRequestFail(#[from] reqwest::Error),
  #[error("Server responded with {0}")]
  UnexpectedStatusCodeFail(SpotifyAuthError),
}

impl SpotifyClient {
  async fn send_authorization_request(&self, request_builder: RequestBuilder) -> Result<Response, AuthorizationHttpRequestError> {
    use AuthorizationHttpRequestError::*;
    let response = request_builder.send().await?;
    match response.status() {
      StatusCode::OK => Ok(response),
      _ => {
        Err(UnexpectedStatusCodeFail(Self::response_to_spotify_auth_error(response).await))
      }
    }
  }

  async fn response_to_spotify_auth_error(response: Response) -> SpotifyAuthError {
    #[derive(Deserialize)]
    struct Error {
      error: String,
      #[serde(default)]
      error_description: String,
    }
    let status_code = response.status();
    let error: Option<Error> = response.json().await.ok();
    if let Some(error) = error {
      SpotifyAuthError::Error(status_code, error.error, error.error_description)
    } else {
      SpotifyAuthError::ErrorWithoutMessage(status_code)
    }
  }
}

// Client-credentials access token, used for requests that are not made on behalf of a user.

impl SpotifyClient {
  #[instrument(level = "trace", skip(self))]
  async fn request_client_credentials_token(&self) -> Result<AccessToken, AuthorizationHttpRequestError> {
    let url = self.accounts_api_base_url.join("api/token")?;
    let request = self.http_client
      .post(url)
      .form(&[("grant_type", "client_credentials")])
      .basic_auth(&self.client_id, Some(&self.client_secret))
      ;
    let response = self.send_authorization_request(request).await?;
    #[derive(Deserialize)]
    struct TokenInfo {
      access_token: String,
      expires_in: i64,
    }
    let token_info: TokenInfo = response.json().await?;
    event!(Level::DEBUG, expires_in = token_info.expires_in, "Obtained new Spotify client-credentials access token");
    Ok(AccessToken::new(token_info.access_token, token_info.expires_in))
  }

  async fn client_credentials_access_token(&self) -> Result<String, AuthorizationHttpRequestError> {
    self.token_cache.get_or_refresh(|| self.request_client_credentials_token()).await
  }
}

// Authorization callback (sign-in on behalf of a user)

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Authorization {
  pub access_token: String,
  pub expiry_date: NaiveDateTime,
  pub refresh_token: Option<String>,
}

impl SpotifyClient {
  pub async fn authorization_callback(
    &self,
    code: impl Into<String>,
    redirect_uri: impl Into<String>,
  ) -> Result<Authorization, AuthorizationHttpRequestError> {
    let url = self.accounts_api_base_url.join("api/token")?;
    let request = self.http_client
      .post(url)
      .form(&{
        let mut map = HashMap::new();
        map.insert("grant_type", "authorization_code".to_owned());
        map.insert("code", code.into());
        map.insert("redirect_uri", redirect_uri.into());
        map
      })
      .basic_auth(&self.client_id, Some(&self.client_secret))
      ;
    let response = self.send_authorization_request(request).await?;
    #[derive(Deserialize)]
    struct AuthorizationInfo {
      pub access_token: String,
      pub expires_in: i64,
      pub refresh_token: Option<String>,
    }
    let authorization_info: AuthorizationInfo = response.json().await?;
    Ok(Authorization {
      access_token: authorization_info.access_token,
      expiry_date: (Utc::now() + Duration::seconds(authorization_info.expires_in)).naive_utc(),
      refresh_token: authorization_info.refresh_token,
    })
  }
}

// Sending a request and checking its status code.

#[derive(Debug, Error)]
pub enum SpotifyError {
  #[error("status code '{0}' and error message '{1}'")]
  Error(StatusCode, String),
  #[error("status code '{0}'")]
  ErrorWithoutMessage(StatusCode),
}

#[derive(Debug, Error)]
pub enum HttpRequestError {
  #[error("Failed to join URLs")]
  UrlJoinFail(#[from] url::ParseError),
  #[error("HTTP request failed")]
  HttpRequestFail(#[from] reqwest::Error),
  #[error("Authorization HTTP request failed")]
  AuthorizationHttpRequestFail(#[from] AuthorizationHttpRequestError),
  #[error("Server responded with {0}")]
  UnexpectedStatusCodeFail(SpotifyError),
}

impl SpotifyClient {
  /// Sends a request authorized with the application's client-credentials token.
  #[instrument(level = "trace", skip(self, request_builder, expected_status_codes))]
  async fn send_request(
    &self,
    request_builder: RequestBuilder,
    expected_status_codes: impl AsRef<[StatusCode]>,
  ) -> Result<Response, HttpRequestError> {
    let access_token = self.client_credentials_access_token().await?;
    let response = request_builder.bearer_auth(&access_token).send().await?;
    if response.status() == StatusCode::UNAUTHORIZED {
      // The cached token was rejected; drop it so that the next request obtains a new one.
      event!(Level::DEBUG, "Spotify rejected the cached access token; invalidating it");
      self.token_cache.invalidate(&access_token).await;
    }
    Self::check_status_code(response, expected_status_codes).await
  }

  /// Sends a request authorized with a user's access token.
  async fn send_request_with_authorization(
    &self,
    request_builder: RequestBuilder,
    expected_status_codes: impl AsRef<[StatusCode]>,
    authorization: &Authorization,
  ) -> Result<Response, HttpRequestError> {
    let response = request_builder.bearer_auth(&authorization.access_token).send().await?;
    Self::check_status_code(response, expected_status_codes).await
  }

  async fn check_status_code(response: Response, expected_status_codes: impl AsRef<[StatusCode]>) -> Result<Response, HttpRequestError> {
    if expected_status_codes.as_ref().contains(&response.status()) {
      Ok(response)
    } else {
      Err(HttpRequestError::UnexpectedStatusCodeFail(Self::response_to_spotify_error(response).await))
    }
  }

  async fn response_to_spotify_error(response: Response) -> SpotifyError {
    #[derive(Deserialize)]
    struct RegularError {
      error: Error
    }
    #[derive(Deserialize)]
    struct Error {
      message: String
    }
    let status_code = response.status();
    let regular_error: Option<RegularError> = response.json().await.ok();
    if let Some(regular_error) = regular_error {
      SpotifyError::Error(status_code, regular_error.error.message)
    } else {
      SpotifyError::ErrorWithoutMessage(status_code)
    }
  }
}

// Me info

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct MeInfo {
  pub id: Option<String>,
  pub email: Option<String>,
  pub display_name: Option<String>,
}

impl SpotifyClient {
  #[instrument(level = "trace", skip(self, authorization))]
  pub async fn me(&self, authorization: &Authorization) -> Result<MeInfo, HttpRequestError> {
    let url = self.api_base_url.join("me")?;
    let request = self.http_client.get(url);
    let response = self.send_request_with_authorization(request, [StatusCode::OK], authorization).await?;
    Ok(response.json().await?)
  }
}

// Paging

#[derive(Deserialize, Debug)]
pub struct Paging<T> {
  pub items: Vec<T>,
  #[serde(default)]
  pub offset: usize,
  #[serde(default)]
  pub total: usize,
  #[serde(default)]
  pub next: Option<String>,
}

// Track objects, as returned by the search and playlist endpoints. Fields are optional because items are parsed
// best-effort; callers decide what is mandatory.

#[derive(Deserialize, Default, Clone, Debug)]
pub struct Track {
  pub id: Option<String>,
  pub name: Option<String>,
  pub artists: Option<Vec<ArtistSimple>>,
  pub album: Option<AlbumSimple>,
}

#[derive(Deserialize, Default, Clone, Debug)]
pub struct ArtistSimple {
  pub id: Option<String>,
  pub name: Option<String>,
}

#[derive(Deserialize, Default, Clone, Debug)]
pub struct AlbumSimple {
  pub id: Option<String>,
  pub name: Option<String>,
  pub release_date: Option<String>,
  pub images: Option<Vec<Image>>,
}

#[derive(Deserialize, Default, Clone, Debug)]
pub struct Image {
  pub url: String,
  pub width: Option<u32>,
  pub height: Option<u32>,
}

// Search

impl SpotifyClient {
  /// Maximum number of items per page of the search endpoint.
  pub const SEARCH_PAGE_LIMIT: u32 = 50;

  /// Searches for tracks, returning the raw track objects of one result page.
  #[instrument(level = "trace", skip(self))]
  pub async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Value>, HttpRequestError> {
    let url = self.api_base_url.join("search")?;
    let request = self.http_client
      .get(url)
      .query(&[
        ("q", query.to_owned()),
        ("type", "track".to_owned()),
        ("limit", limit.to_string()),
        ("offset", offset.to_string()),
        ("market", "US".to_owned()),
      ])
      ;
    let response = self.send_request(request, [StatusCode::OK]).await?;
    #[derive(Deserialize, Debug)]
    struct SearchResult {
      tracks: Paging<Value>,
    }
    let result: SearchResult = response.json().await?;
    Ok(result.tracks.items)
  }
}

// Playlist

impl SpotifyClient {
  /// Maximum number of items per page of the playlist tracks endpoint.
  pub const PLAYLIST_PAGE_LIMIT: usize = 100;

  /// Gets up to `limit` raw track objects from a playlist. Items without a track (e.g. removed tracks) are skipped.
  #[instrument(level = "trace", skip(self))]
  pub async fn get_playlist_tracks(&self, playlist_id: &str, limit: usize) -> Result<Vec<Value>, HttpRequestError> {
    let url = self.api_base_url.join(&format!("playlists/{}/tracks", playlist_id))?;
    let mut all_tracks = Vec::new();
    let mut offset = 0;
    while all_tracks.len() < limit {
      let page_limit = (limit - all_tracks.len()).min(Self::PLAYLIST_PAGE_LIMIT);
      let request = self.http_client
        .get(url.clone())
        .query(&[("market", "US".to_owned()), ("limit", page_limit.to_string()), ("offset", offset.to_string())])
        ;
      let response = self.send_request(request, [StatusCode::OK]).await?;
      #[derive(Deserialize, Debug)]
      struct PlaylistItem {
        track: Option<Value>,
      }
      let page: Paging<PlaylistItem> = response.json().await?;
      let len = page.items.len();
      all_tracks.extend(page.items.into_iter().filter_map(|i| i.track).filter(|t| !t.is_null()));
      offset += len;
      if len == 0 || page.next.is_none() { break; }
    }
    all_tracks.truncate(limit);
    Ok(all_tracks)
  }
}
