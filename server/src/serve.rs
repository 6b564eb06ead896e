use std::net;

use actix_identity::IdentityMiddleware;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use actix_web::cookie::Key;

use tracktracker_backend::database::Database;
use tracktracker_backend::import::Importer;
use tracktracker_spotify_client::SpotifyClient;

use crate::api::*;
use crate::auth::*;

/// Minimum length of the secret key that session cookies are signed and encrypted with.
pub const COOKIE_SECRET_KEY_MIN_LENGTH: usize = 32;

pub async fn serve<A: net::ToSocketAddrs>(
  database: Database,
  importer: Importer,
  spotify_client: Option<SpotifyClient>,
  bind_address: A,
  cookie_key: Key,
) -> std::io::Result<()> {
  let database_data = web::Data::new(database);
  let importer_data = web::Data::new(importer);
  let spotify_sign_in_data = web::Data::new(SpotifySignIn::new(spotify_client));
  HttpServer::new(move || {
    App::new()
      .wrap(middleware::Logger::default())
      .wrap(IdentityMiddleware::default())
      .wrap(session_middleware(cookie_key.clone()))
      .app_data(database_data.clone())
      .app_data(importer_data.clone())
      .app_data(spotify_sign_in_data.clone())
      .configure(configure_routes)
  })
    .bind(bind_address)?
    .run()
    .await
}

/// Cookie session storage; login identities are kept in the session.
pub fn session_middleware(cookie_key: Key) -> SessionMiddleware<CookieSessionStore> {
  SessionMiddleware::builder(CookieSessionStore::default(), cookie_key)
    .cookie_name("auth".to_owned())
    .cookie_secure(false)
    .build()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/", web::get().to(index))
    // Auth
    .route("/login", web::post().to(login))
    .route("/logout", web::delete().to(logout))
    .route("/login/spotify", web::get().to(request_spotify_sign_in))
    .service(web::resource("/login/spotify/callback")
      .name("spotify_sign_in_callback")
      .route(web::get().to(spotify_sign_in_callback))
    )
    // User
    .route("/users/register", web::post().to(register_user))
    .route("/users/me", web::get().to(show_my_user))
    .route("/users/{id}", web::get().to(show_user_by_id))
    // Track
    .route("/tracks", web::post().to(create_track))
    .route("/tracks/search", web::get().to(search_tracks))
    .route("/tracks/search/name", web::get().to(search_tracks_by_title))
    .route("/tracks/search/artist", web::get().to(search_tracks_by_artist))
    .route("/tracks/search/album", web::get().to(search_tracks_by_album))
    .route("/tracks/random", web::get().to(random_tracks))
    .route("/tracks/import/spotify", web::post().to(import_playlist_tracks))
    .route("/tracks/import/random", web::post().to(import_random_tracks))
    .route("/tracks/{id}", web::get().to(show_track_by_id))
    // Rating
    .route("/ratings", web::post().to(set_rating))
    .route("/ratings/user/{user_id}/track/{track_id}", web::get().to(show_rating))
    .route("/ratings/track/{track_id}", web::get().to(list_ratings_by_track))
    .route("/ratings/track/{track_id}/average", web::get().to(show_average_rating))
    .route("/ratings/user/{user_id}", web::get().to(list_ratings_by_user))
    // Tracked track
    .route("/tracked", web::post().to(track_track))
    .route("/tracked/{user_id}/track/{track_id}", web::delete().to(untrack_track))
    .route("/tracked/{user_id}/track/{track_id}/play", web::post().to(increment_play_count))
    .route("/tracked/user/{user_id}/track/{track_id}", web::get().to(show_tracked_track))
    .route("/tracked/user/{user_id}", web::get().to(list_tracked_tracks))
    .route("/tracked/user/{user_id}/recent", web::get().to(list_recent_tracked_tracks))
    // Spotify
    .route("/spotify/search", web::get().to(search_spotify_tracks))
  ;
}

async fn index() -> HttpResponse {
  HttpResponse::Ok().finish()
}
