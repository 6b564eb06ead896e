use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use thiserror::Error;
use tracing::{event, instrument, Level};

use tracktracker_core::model::NewTrack;

use crate::database::{Database, DatabaseConnectError, DatabaseQueryError};
use crate::database::track::TrackCreateError;
use crate::import::Importer;

pub const DEFAULT_SEED_SIZE: usize = 50;

const GENRES: [&str; 5] = ["Rock", "Pop", "Hip Hop", "Jazz", "Indie"];

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SeedOutcome {
  /// The runner already ran; nothing was done.
  AlreadyRan,
  /// The catalog already had tracks.
  Skipped { existing: i64 },
  /// Tracks were imported from the external catalog.
  Imported(usize),
  /// Placeholder tracks were generated.
  Generated(usize),
}

#[derive(Debug, Error)]
pub enum SeedError {
  #[error("Failed to connect to the database")]
  DatabaseConnectFail(#[from] DatabaseConnectError),
  #[error("Failed to count tracks")]
  DatabaseQueryFail(#[from] DatabaseQueryError),
  #[error("Failed to insert placeholder tracks")]
  TrackCreateFail(#[from] TrackCreateError),
  #[error("Database task panicked or was cancelled")]
  TaskJoinFail(#[from] tokio::task::JoinError),
}

/// Fills an empty catalog once: with imported tracks when the importer is enabled and finds any, and with placeholder
/// tracks otherwise.
#[derive(Debug)]
pub struct SeedRunner {
  seed_size: usize,
  has_run: AtomicBool,
}

impl Default for SeedRunner {
  fn default() -> Self { Self::new(DEFAULT_SEED_SIZE) }
}

impl SeedRunner {
  pub fn new(seed_size: usize) -> Self {
    Self { seed_size, has_run: AtomicBool::new(false) }
  }

  pub fn seed_size(&self) -> usize { self.seed_size }

  #[instrument(level = "debug", skip_all, fields(seed_size = self.seed_size))]
  pub async fn run(&self, database: &Database, importer: &Importer) -> Result<SeedOutcome, SeedError> {
    if self.has_run.swap(true, Ordering::SeqCst) {
      return Ok(SeedOutcome::AlreadyRan);
    }

    let existing = {
      let database = database.clone();
      tokio::task::spawn_blocking(move || -> Result<i64, SeedError> { Ok(database.connect()?.count_tracks()?) }).await??
    };
    if existing > 0 {
      event!(Level::INFO, existing, "Catalog already contains tracks; skipping seeding");
      return Ok(SeedOutcome::Skipped { existing });
    }

    if importer.is_enabled() {
      event!(Level::INFO, seed_size = self.seed_size, "Catalog is empty; importing random tracks");
      let imported = importer.import_random_tracks(self.seed_size).await;
      if !imported.is_empty() {
        event!(Level::INFO, imported = imported.len(), "Seeded catalog with imported tracks");
        return Ok(SeedOutcome::Imported(imported.len()));
      }
    } else {
      event!(Level::WARN, "Importer is disabled; seeding with placeholder tracks");
    }

    let placeholders = generate_placeholder_tracks(self.seed_size, &mut rand::thread_rng());
    let database = database.clone();
    let generated = tokio::task::spawn_blocking(move || -> Result<usize, SeedError> {
      Ok(database.connect()?.insert_tracks(&placeholders)?.len())
    }).await??;
    event!(Level::INFO, generated, "Seeded catalog with placeholder tracks");
    Ok(SeedOutcome::Generated(generated))
  }
}

pub fn generate_placeholder_tracks<R: Rng>(count: usize, rng: &mut R) -> Vec<NewTrack> {
  (0..count).map(|_| {
    let artist_letter = (b'A' + rng.gen_range(0..26u8)) as char;
    let genre = GENRES[rng.gen_range(0..GENRES.len())];
    NewTrack::new(format!("Sample Song {}", rng.gen_range(0..1000)), format!("Artist {}", artist_letter))
      .with_album(format!("{} Hits", genre))
      .with_release_year(rng.gen_range(2000..=2024))
  }).collect()
}


#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;

  #[test]
  fn placeholder_tracks_follow_pattern() {
    let tracks = generate_placeholder_tracks(25, &mut StdRng::seed_from_u64(3));
    assert_eq!(tracks.len(), 25);
    for track in tracks {
      assert!(track.title.starts_with("Sample Song "));
      assert!(track.artist.starts_with("Artist "));
      assert_eq!(track.artist.len(), "Artist X".len());
      let album = track.album.unwrap();
      assert!(GENRES.iter().any(|g| album == format!("{} Hits", g)));
      assert!((2000..=2024).contains(&track.release_year.unwrap()));
    }
  }

  #[test]
  fn default_seed_size() {
    assert_eq!(SeedRunner::default().seed_size(), DEFAULT_SEED_SIZE);
  }

  #[test]
  fn no_placeholders_for_zero() {
    assert!(generate_placeholder_tracks(0, &mut StdRng::seed_from_u64(3)).is_empty());
  }
}
