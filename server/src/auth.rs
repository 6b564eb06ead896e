use std::future::Future;
use std::pin::Pin;

use actix_identity::Identity;
use actix_session::Session;
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, web};
use actix_web::dev::Payload;
use actix_web::error::{BlockingError, UrlGenerationError};
use actix_web::http::{header, StatusCode};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{event, Level};

use tracktracker_backend::database::{Database, DatabaseConnectError};
use tracktracker_backend::database::user::{UserReconcileError, UserVerifyError};
use tracktracker_core::api::{BadRequestError, InternalServerError};
use tracktracker_core::format_error::FormatError;
use tracktracker_core::model::{ExternalProfile, User, UserLogin};
use tracktracker_spotify_client::{AuthorizationHttpRequestError, CreateAuthorizationUrlError, HttpRequestError, SpotifyClient};

// Logged-in user

#[derive(Debug, Serialize, Deserialize)]
pub struct LoggedInUser {
  pub user: User,
}

fn remember(request: &HttpRequest, user: User) -> Result<(), IdentityError> {
  let identity = serde_json::to_string(&LoggedInUser { user })?;
  Identity::login(&request.extensions(), identity).map_err(|e| IdentityError::LoginFail(e.to_string()))?;
  Ok(())
}

#[derive(Debug, Error)]
pub enum IdentityError {
  #[error("Failed to serialize identity")]
  SerializeIdentityFail(#[from] serde_json::Error),
  #[error("Failed to attach identity to the session: {0}")]
  LoginFail(String),
}

// Login

#[derive(Debug, Error)]
pub enum InternalLoginError {
  #[error("Failed to connect to the database")]
  BackendConnectFail(#[from] DatabaseConnectError),
  #[error("Failed to verify user")]
  UserVerifyFail(#[from] UserVerifyError),
  #[error("Blocking thread pool is gone")]
  BlockingThreadPoolGoneFail(#[from] BlockingError),
  #[error(transparent)]
  IdentityFail(#[from] IdentityError),
}

impl ResponseError for InternalLoginError {
  fn status_code(&self) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
  }

  fn error_response(&self) -> HttpResponse {
    internal_server_error_response(self)
  }
}

pub async fn login(
  request: HttpRequest,
  user_login: web::Json<UserLogin>,
  database: web::Data<Database>,
) -> Result<HttpResponse, InternalLoginError> {
  let user = web::block(move || -> Result<Option<User>, InternalLoginError> {
    Ok(database.connect()?.verify_user(&user_login)?)
  }).await??;
  match user {
    Some(user) => {
      remember(&request, user.clone())?;
      event!(Level::DEBUG, id = user.id, "User logged in");
      Ok(HttpResponse::Ok().json(&user))
    }
    None => Ok(HttpResponse::Unauthorized().finish()),
  }
}

// Logout

pub async fn logout(identity: Option<Identity>) -> HttpResponse {
  if let Some(identity) = identity {
    identity.logout();
  }
  HttpResponse::Ok().finish()
}

// Signing in with Spotify

/// Spotify client used for signing in, or `None` when Spotify sign-in is not configured.
pub struct SpotifySignIn {
  spotify_client: Option<SpotifyClient>,
}

impl SpotifySignIn {
  pub fn new(spotify_client: Option<SpotifyClient>) -> Self { Self { spotify_client } }
}

const SPOTIFY_STATE_SESSION_KEY: &str = "spotify_sign_in_state";
const SPOTIFY_PROVIDER: &str = "spotify";

#[derive(Debug, Error)]
pub enum SpotifySignInError {
  #[error("Spotify sign-in is not configured")]
  NotConfiguredFail,
  #[error("Spotify sign-in failed: {0}")]
  AuthorizationDeniedFail(String),
  #[error("Spotify sign-in callback is missing the authorization code")]
  MissingCodeFail,
  #[error("Spotify sign-in state does not match")]
  StateMismatchFail,
  #[error("Spotify profile has no ID")]
  MissingProfileIdFail,
  #[error("Failed to generate callback URL: {0:?}")]
  UrlGenerationFail(UrlGenerationError),
  #[error("Failed to create Spotify authorization URL")]
  CreateAuthorizationUrlFail(#[from] CreateAuthorizationUrlError),
  #[error("Failed to exchange authorization code")]
  AuthorizationCallbackFail(#[from] AuthorizationHttpRequestError),
  #[error("Failed to get Spotify profile")]
  MeFail(#[from] HttpRequestError),
  #[error("Failed to access the session: {0}")]
  SessionFail(String),
  #[error("Failed to connect to the database")]
  BackendConnectFail(#[from] DatabaseConnectError),
  #[error(transparent)]
  UserReconcileFail(#[from] UserReconcileError),
  #[error("Blocking thread pool is gone")]
  BlockingThreadPoolGoneFail(#[from] BlockingError),
  #[error(transparent)]
  IdentityFail(#[from] IdentityError),
}

impl ResponseError for SpotifySignInError {
  fn status_code(&self) -> StatusCode {
    use SpotifySignInError::*;
    match self {
      NotConfiguredFail => StatusCode::NOT_FOUND,
      AuthorizationDeniedFail(_) | MissingCodeFail | StateMismatchFail | MissingProfileIdFail | UserReconcileFail(UserReconcileError::EmailTakenFail(_)) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self.status_code() {
      StatusCode::INTERNAL_SERVER_ERROR => internal_server_error_response(self),
      status_code => HttpResponse::build(status_code).json(BadRequestError { error: self.to_string() }),
    }
  }
}

pub async fn request_spotify_sign_in(
  request: HttpRequest,
  session: Session,
  spotify_sign_in: web::Data<SpotifySignIn>,
) -> Result<HttpResponse, SpotifySignInError> {
  use SpotifySignInError::*;
  let spotify_client = spotify_sign_in.spotify_client.as_ref().ok_or(NotConfiguredFail)?;
  let redirect_uri = request.url_for_static("spotify_sign_in_callback").map_err(UrlGenerationFail)?.to_string();
  let state: String = rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
  session.insert(SPOTIFY_STATE_SESSION_KEY, &state).map_err(|e| SessionFail(e.to_string()))?;
  let url = spotify_client.create_authorization_url(redirect_uri, Some(state))?;
  Ok(HttpResponse::TemporaryRedirect().insert_header((header::LOCATION, url)).finish())
}

#[derive(Deserialize)]
pub struct SpotifyCallbackData {
  code: Option<String>,
  error: Option<String>,
  state: Option<String>,
}

pub async fn spotify_sign_in_callback(
  request: HttpRequest,
  query: web::Query<SpotifyCallbackData>,
  session: Session,
  spotify_sign_in: web::Data<SpotifySignIn>,
  database: web::Data<Database>,
) -> Result<HttpResponse, SpotifySignInError> {
  use SpotifySignInError::*;
  let spotify_client = spotify_sign_in.spotify_client.as_ref().ok_or(NotConfiguredFail)?;
  let SpotifyCallbackData { code, error, state } = query.into_inner();
  if let Some(error) = error {
    event!(Level::WARN, %error, "Spotify sign-in was denied");
    return Err(AuthorizationDeniedFail(error));
  }
  let expected_state: Option<String> = session.remove_as(SPOTIFY_STATE_SESSION_KEY).and_then(|r| r.ok());
  if expected_state.is_none() || expected_state != state {
    return Err(StateMismatchFail);
  }
  let code = code.ok_or(MissingCodeFail)?;
  let redirect_uri = request.url_for_static("spotify_sign_in_callback").map_err(UrlGenerationFail)?.to_string();
  let authorization = spotify_client.authorization_callback(code, redirect_uri).await?;
  let me = spotify_client.me(&authorization).await?;
  let profile = ExternalProfile { id: me.id, email: me.email, display_name: me.display_name, name: None };
  let user = web::block(move || -> Result<Option<User>, SpotifySignInError> {
    Ok(database.connect()?.reconcile_external_user(SPOTIFY_PROVIDER, &profile)?)
  }).await??.ok_or(MissingProfileIdFail)?;
  remember(&request, user.clone())?;
  event!(Level::INFO, id = user.id, "User signed in with Spotify");
  Ok(HttpResponse::Ok().json(&user))
}

// Logged-in user extractor

#[derive(Debug, Error)]
pub enum LoggedInUserExtractInternalError {
  #[error("Failed to get the identity: {0}")]
  IdentityGetFail(String),
  #[error("Failed to deserialize the identity")]
  DeserializeIdentityFail(#[from] serde_json::Error),
  #[error("Not logged in")]
  NotLoggedInFail,
}

impl ResponseError for LoggedInUserExtractInternalError {
  fn status_code(&self) -> StatusCode {
    match self {
      Self::NotLoggedInFail => StatusCode::UNAUTHORIZED,
      _ => StatusCode::INTERNAL_SERVER_ERROR
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self {
      Self::NotLoggedInFail => HttpResponse::build(self.status_code()).finish(),
      _ => internal_server_error_response(self),
    }
  }
}

impl FromRequest for LoggedInUser {
  type Error = LoggedInUserExtractInternalError;
  type Future = Pin<Box<dyn Future<Output=Result<LoggedInUser, LoggedInUserExtractInternalError>>>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    use LoggedInUserExtractInternalError::*;
    let identity = Identity::from_request(req, payload);
    Box::pin(async move {
      let identity = identity.await.map_err(|_| NotLoggedInFail)?;
      let serialized_identity = identity.id().map_err(|e| IdentityGetFail(e.to_string()))?;
      Ok(serde_json::from_str(&serialized_identity)?)
    })
  }
}

// Internal server errors

pub(crate) fn internal_server_error_response<E: std::error::Error>(error: &E) -> HttpResponse {
  let format_error = FormatError::new(error);
  event!(Level::ERROR, "{:?}", format_error);
  HttpResponse::InternalServerError().json(InternalServerError {
    message: error.to_string()
  })
}
