use std::path::PathBuf;

use actix_web::cookie::Key;
use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use tracing::{event, Level};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use tracktracker_backend::database::Database;
use tracktracker_backend::import::{DedupPolicy, Importer};
use tracktracker_backend::password::PasswordHasher;
use tracktracker_backend::seed::SeedRunner;
use tracktracker_server::serve::{COOKIE_SECRET_KEY_MIN_LENGTH, serve};
use tracktracker_spotify_client::SpotifyClient;

#[derive(Debug, StructOpt)]
#[structopt(name = "server", about = "TrackTracker server")]
struct Opt {
  /// Database file to use. Relative paths are resolved relative to the current directory
  #[structopt(long, env = "TRACKTRACKER_DATABASE_URL", parse(from_os_str))]
  database_file: PathBuf,

  /// Address (IP:port) to bind the HTTP server to
  #[structopt(long, env = "TRACKTRACKER_BIND_ADDRESS", default_value = "127.0.0.1:8088")]
  bind_address: String,
  /// Password hasher secret key to use
  #[structopt(long, env = "TRACKTRACKER_PASSWORD_HASHER_SECRET_KEY")]
  password_hasher_secret_key: String,
  /// Secret key to sign and encrypt session cookies with. Must be at least 32 bytes long
  #[structopt(long, env = "TRACKTRACKER_COOKIE_SECRET_KEY")]
  cookie_secret_key: String,

  /// Spotify client ID. Importing tracks and signing in with Spotify are disabled when empty
  #[structopt(long, env = "TRACKTRACKER_SPOTIFY_CLIENT_ID", default_value = "")]
  spotify_client_id: String,
  /// Spotify client secret. Importing tracks and signing in with Spotify are disabled when empty
  #[structopt(long, env = "TRACKTRACKER_SPOTIFY_CLIENT_SECRET", default_value = "", hide_env_values = true)]
  spotify_client_secret: String,

  /// Number of tracks to seed an empty catalog with at startup
  #[structopt(long, env = "TRACKTRACKER_SEED_SIZE", default_value = "50")]
  seed_size: usize,
  /// How imported tracks are matched against stored tracks: 'title-contains-artist-equals', 'title-and-artist-equal',
  /// or 'disabled'
  #[structopt(long, env = "TRACKTRACKER_DEDUP_POLICY", default_value = "title-contains-artist-equals")]
  dedup_policy: DedupPolicy,

  /// Minimum level at which tracing events will be printed to stderr
  #[structopt(long, env = "TRACKTRACKER_TRACING_LEVEL", default_value = "INFO")]
  tracing_level: tracing::Level,
}

fn main() -> Result<()> {
  // Load environment variables from .env file, before parsing command-line arguments, as some options can use
  // environment variables as defaults.
  dotenv::dotenv().ok();
  // Parse command-line arguments.
  let opt: Opt = Opt::from_args();
  // Setup tracing
  let subscriber = FmtSubscriber::builder()
    .with_writer(std::io::stderr)
    .with_max_level(opt.tracing_level)
    .finish();
  tracing::subscriber::set_global_default(subscriber)
    .with_context(|| "Failed to initialize global tracing subscriber")?;
  // Setup log to forward to tracing.
  LogTracer::init()
    .with_context(|| "Failed to initialize log to tracing forwarder")?;
  // Check cookie secret key
  if opt.cookie_secret_key.len() < COOKIE_SECRET_KEY_MIN_LENGTH {
    bail!("Cookie secret key must be at least {} bytes long", COOKIE_SECRET_KEY_MIN_LENGTH);
  }
  let cookie_key = Key::derive_from(opt.cookie_secret_key.as_bytes());
  // Create database
  let database = Database::new(
    opt.database_file.to_string_lossy(),
    PasswordHasher::new(opt.password_hasher_secret_key.as_bytes()))
    .with_context(|| "Failed to create database")?;
  // Create Spotify client and importer
  let spotify_client = SpotifyClient::new_if_configured(opt.spotify_client_id, opt.spotify_client_secret)
    .with_context(|| "Failed to create Spotify client")?;
  if spotify_client.is_none() {
    event!(Level::WARN, "Spotify client ID or secret not configured; importing tracks and signing in with Spotify are disabled");
  }
  let importer = Importer::from_spotify_client(database.clone(), spotify_client.clone(), opt.dedup_policy);
  let seed_runner = SeedRunner::new(opt.seed_size);
  // Seed and run HTTP server
  let bind_address = opt.bind_address.clone();
  actix_rt::System::new()
    .block_on(async move {
      let outcome = seed_runner.run(&database, &importer).await
        .with_context(|| "Failed to seed the track catalog")?;
      event!(Level::INFO, ?outcome, "Seeding finished");
      serve(database, importer, spotify_client, bind_address, cookie_key).await
        .with_context(|| "HTTP server failed")
    })?;
  Ok(())
}
