use actix_web::{HttpResponse, ResponseError, web};
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use tracktracker_backend::database::{Database, DatabaseConnectError, DatabaseQueryError};
use tracktracker_backend::database::rating::RatingSetError;
use tracktracker_backend::database::track::TrackCreateError;
use tracktracker_backend::database::tracked_track::TrackedTrackError;
use tracktracker_backend::database::user::UserRegisterError;
use tracktracker_backend::import::Importer;
use tracktracker_core::api::{AverageRating, BadRequestError};
use tracktracker_core::model::{NewRating, NewTrack, NewTrackedTrack, NewUser, User};

use crate::auth::{internal_server_error_response, LoggedInUser};

// Users

pub async fn register_user(
  new_user: web::Json<NewUser>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  let user = web::block(move || -> Result<User, ApiError> {
    Ok(database.connect()?.register_user(&new_user)?)
  }).await??;
  Ok(HttpResponse::Ok().json(user))
}

pub async fn show_user_by_id(
  id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  use ApiError::*;
  let user = database.connect()?.get_user_by_id(*id)?.ok_or(NotFoundFail)?;
  Ok(HttpResponse::Ok().json(user))
}

pub async fn show_my_user(
  logged_in_user: LoggedInUser,
) -> HttpResponse {
  HttpResponse::Ok().json(logged_in_user.user)
}

// Tracks

pub async fn create_track(
  new_track: web::Json<NewTrack>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.create_track(&new_track)?))
}

pub async fn show_track_by_id(
  id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  use ApiError::*;
  let track = database.connect()?.get_track_by_id(*id)?.ok_or(NotFoundFail)?;
  Ok(HttpResponse::Ok().json(track))
}

#[derive(Deserialize)]
pub struct SearchQuery {
  query: String,
}

pub async fn search_tracks(
  query: web::Query<SearchQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.search_tracks(&query.query)?))
}

pub async fn search_tracks_by_title(
  query: web::Query<SearchQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.find_tracks_by_title(&query.query)?))
}

pub async fn search_tracks_by_artist(
  query: web::Query<SearchQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.find_tracks_by_artist(&query.query)?))
}

pub async fn search_tracks_by_album(
  query: web::Query<SearchQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.find_tracks_by_album(&query.query)?))
}

#[derive(Deserialize)]
pub struct SizeQuery {
  size: Option<usize>,
}

pub async fn random_tracks(
  query: web::Query<SizeQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  let size = query.size.unwrap_or(10) as i64;
  Ok(HttpResponse::Ok().json(database.connect()?.random_tracks(size)?))
}

// Importing tracks

#[derive(Deserialize)]
pub struct PlaylistImportQuery {
  playlist_id: String,
  size: Option<usize>,
}

pub async fn import_playlist_tracks(
  query: web::Query<PlaylistImportQuery>,
  importer: web::Data<Importer>,
) -> HttpResponse {
  let size = query.size.unwrap_or(100);
  HttpResponse::Ok().json(importer.import_from_playlist(&query.playlist_id, size).await)
}

pub async fn import_random_tracks(
  query: web::Query<SizeQuery>,
  importer: web::Data<Importer>,
) -> HttpResponse {
  let size = query.size.unwrap_or(20);
  HttpResponse::Ok().json(importer.import_random_tracks(size).await)
}

#[derive(Deserialize)]
pub struct SpotifySearchQuery {
  query: String,
  limit: Option<i64>,
  offset: Option<i64>,
}

pub async fn search_spotify_tracks(
  query: web::Query<SpotifySearchQuery>,
  importer: web::Data<Importer>,
) -> HttpResponse {
  let items = importer.search_spotify_tracks(&query.query, query.limit.unwrap_or(20), query.offset.unwrap_or(0)).await;
  HttpResponse::Ok().json(items)
}

// Ratings

pub async fn set_rating(
  new_rating: web::Json<NewRating>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.set_rating(&new_rating)?))
}

pub async fn show_rating(
  path: web::Path<(i32, i32)>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  use ApiError::*;
  let (user_id, track_id) = path.into_inner();
  let rating = database.connect()?.get_rating(user_id, track_id)?.ok_or(NotFoundFail)?;
  Ok(HttpResponse::Ok().json(rating))
}

pub async fn list_ratings_by_track(
  track_id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.list_ratings_by_track(*track_id)?))
}

pub async fn list_ratings_by_user(
  user_id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.list_ratings_by_user(*user_id)?))
}

pub async fn show_average_rating(
  track_id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  let average = database.connect()?.average_rating(*track_id)?;
  Ok(HttpResponse::Ok().json(AverageRating { average }))
}

// Tracked tracks

pub async fn track_track(
  new_tracked_track: web::Json<NewTrackedTrack>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.track_track(&new_tracked_track)?))
}

pub async fn untrack_track(
  path: web::Path<(i32, i32)>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  use ApiError::*;
  let (user_id, track_id) = path.into_inner();
  if database.connect()?.untrack_track(user_id, track_id)? {
    Ok(HttpResponse::Ok().finish())
  } else {
    Err(NotFoundFail)
  }
}

/// Responds with the updated entry, or with `null` when the track is not tracked by the user.
pub async fn increment_play_count(
  path: web::Path<(i32, i32)>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  let (user_id, track_id) = path.into_inner();
  Ok(HttpResponse::Ok().json(database.connect()?.increment_play_count(user_id, track_id)?))
}

pub async fn show_tracked_track(
  path: web::Path<(i32, i32)>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  use ApiError::*;
  let (user_id, track_id) = path.into_inner();
  let tracked_track = database.connect()?.get_tracked_track(user_id, track_id)?.ok_or(NotFoundFail)?;
  Ok(HttpResponse::Ok().json(tracked_track))
}

pub async fn list_tracked_tracks(
  user_id: web::Path<i32>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.list_tracked_tracks(*user_id)?))
}

#[derive(Deserialize)]
pub struct LimitQuery {
  limit: Option<i64>,
}

pub async fn list_recent_tracked_tracks(
  user_id: web::Path<i32>,
  query: web::Query<LimitQuery>,
  database: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
  Ok(HttpResponse::Ok().json(database.connect()?.list_recent_tracked_tracks(*user_id, query.limit)?))
}

// Error type

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  BackendConnectFail(#[from] DatabaseConnectError),
  #[error(transparent)]
  DatabaseQueryFail(#[from] DatabaseQueryError),
  #[error(transparent)]
  UserRegisterFail(#[from] UserRegisterError),
  #[error(transparent)]
  TrackCreateFail(#[from] TrackCreateError),
  #[error(transparent)]
  RatingSetFail(#[from] RatingSetError),
  #[error(transparent)]
  TrackedTrackFail(#[from] TrackedTrackError),
  #[error("Resource was not found")]
  NotFoundFail,
  #[error("Thread pool is gone")]
  ThreadPoolGoneFail(#[from] BlockingError),
}

impl ApiError {
  fn is_bad_request(&self) -> bool {
    use ApiError::*;
    match self {
      UserRegisterFail(e) => e.is_validation_failure(),
      TrackCreateFail(e) => e.is_validation_failure(),
      RatingSetFail(e) => e.is_validation_failure(),
      TrackedTrackFail(e) => e.is_validation_failure(),
      _ => false,
    }
  }
}

impl ResponseError for ApiError {
  fn status_code(&self) -> StatusCode {
    use ApiError::*;
    match self {
      NotFoundFail => StatusCode::NOT_FOUND,
      e if e.is_bad_request() => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self.status_code() {
      StatusCode::NOT_FOUND => HttpResponse::NotFound().finish(),
      StatusCode::BAD_REQUEST => HttpResponse::BadRequest().json(BadRequestError { error: self.to_string() }),
      _ => internal_server_error_response(self),
    }
  }
}
