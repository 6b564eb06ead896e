use std::sync::Arc;

use serde_json::json;

use tracktracker_backend::import::{DedupPolicy, Importer, SEARCH_PAGE_LIMIT, SEARCH_RESULT_WINDOW};

use common::{create_track, TestDatabase};
use common::source::{FailingSource, FakeSource, track_json};

mod common;

#[tokio::test]
async fn disabled_importer_returns_nothing() {
  let db = TestDatabase::new();
  let importer = Importer::new(db.database.clone(), None, DedupPolicy::default());
  assert!(!importer.is_enabled());
  assert!(importer.import_random_tracks(10).await.is_empty());
  assert!(importer.import_from_playlist("playlist", 10).await.is_empty());
  assert!(importer.search_spotify_tracks("song", 10, 0).await.is_empty());
  assert_eq!(db.connect().count_tracks().unwrap(), 0);
}

#[tokio::test]
async fn failing_source_yields_empty_results() {
  let db = TestDatabase::new();
  let importer = Importer::new(db.database.clone(), Some(Arc::new(FailingSource)), DedupPolicy::default());
  assert!(importer.is_enabled());
  assert!(importer.import_random_tracks(10).await.is_empty());
  assert!(importer.import_from_playlist("playlist", 10).await.is_empty());
  assert!(importer.search_spotify_tracks("song", 10, 0).await.is_empty());
  assert_eq!(db.connect().count_tracks().unwrap(), 0);
}

#[tokio::test]
async fn playlist_import_parses_and_skips_duplicates() {
  let db = TestDatabase::new();
  create_track(&mut db.connect(), "Yesterday", "The Beatles");
  let playlist = vec![
    track_json("yesterday", "the beatles"),
    track_json("Creep", "Radiohead"),
    track_json("CREEP", "radiohead"),
    json!({ "artists": [{ "name": "No Name" }] }),
    json!({ "name": "Lonely", "album": { "name": "Solo", "release_date": "abcd" } }),
  ];
  let importer = Importer::new(db.database.clone(), Some(Arc::new(FakeSource::with_playlist(playlist))), DedupPolicy::default());

  let imported = importer.import_from_playlist("playlist", 100).await;
  assert_eq!(imported.len(), 2);
  assert_eq!(imported[0].title, "Creep");
  assert_eq!(imported[0].album.as_deref(), Some("Album"));
  assert_eq!(imported[0].release_year, Some(2001));
  assert_eq!(imported[1].title, "Lonely");
  assert_eq!(imported[1].artist, "Unknown");
  assert_eq!(imported[1].release_year, None);
  assert_eq!(db.connect().count_tracks().unwrap(), 3);

  // Importing again finds only duplicates.
  assert!(importer.import_from_playlist("playlist", 100).await.is_empty());
  assert_eq!(db.connect().count_tracks().unwrap(), 3);
}

#[tokio::test]
async fn playlist_import_skips_duplicates_differing_in_non_ascii_case() {
  let db = TestDatabase::new();
  create_track(&mut db.connect(), "Été", "Zaz");
  let playlist = vec![track_json("été", "zaz"), track_json("Ça ira", "Zaz"), track_json("ÇA IRA", "ZAZ")];
  let importer = Importer::new(db.database.clone(), Some(Arc::new(FakeSource::with_playlist(playlist))), DedupPolicy::default());
  let imported = importer.import_from_playlist("playlist", 100).await;
  assert_eq!(imported.len(), 1);
  assert_eq!(imported[0].title, "Ça ira");
  assert_eq!(db.connect().count_tracks().unwrap(), 2);
}

#[tokio::test]
async fn playlist_import_without_dedup_stores_everything() {
  let db = TestDatabase::new();
  let playlist = vec![track_json("Creep", "Radiohead"), track_json("Creep", "Radiohead")];
  let importer = Importer::new(db.database.clone(), Some(Arc::new(FakeSource::with_playlist(playlist))), DedupPolicy::Disabled);
  assert_eq!(importer.import_from_playlist("playlist", 100).await.len(), 2);
}

#[tokio::test]
async fn random_import_pages_within_window() {
  let db = TestDatabase::new();
  let source = Arc::new(FakeSource::default());
  let importer = Importer::new(db.database.clone(), Some(source.clone()), DedupPolicy::default());

  let imported = importer.import_random_tracks(120).await;
  assert_eq!(imported.len(), 120);
  let requests = source.search_requests();
  assert_eq!(requests.len(), 3);
  let query = &requests[0].0;
  assert_eq!(query.len(), 1);
  assert!(query.chars().all(|c| c.is_ascii_lowercase()));
  let start = requests[0].2;
  for (i, (q, limit, offset)) in requests.iter().enumerate() {
    assert_eq!(q, query);
    assert!(*limit as usize <= SEARCH_PAGE_LIMIT);
    assert_eq!(*offset, start + (i * SEARCH_PAGE_LIMIT) as u32);
    assert!((*offset + *limit) as usize <= SEARCH_RESULT_WINDOW);
  }
  assert_eq!(requests.iter().map(|r| r.1).sum::<u32>(), 120);
}

#[tokio::test]
async fn random_import_of_whole_window_starts_at_zero() {
  let db = TestDatabase::new();
  let source = Arc::new(FakeSource::default());
  let importer = Importer::new(db.database.clone(), Some(source.clone()), DedupPolicy::Disabled);
  let imported = importer.import_random_tracks(SEARCH_RESULT_WINDOW).await;
  assert_eq!(imported.len(), SEARCH_RESULT_WINDOW);
  assert_eq!(source.search_requests()[0].2, 0);
}

#[tokio::test]
async fn search_clamps_limit_and_offset() {
  let db = TestDatabase::new();
  let source = Arc::new(FakeSource::default());
  let importer = Importer::new(db.database.clone(), Some(source.clone()), DedupPolicy::default());
  assert_eq!(importer.search_spotify_tracks("q", 500, -3).await.len(), SEARCH_PAGE_LIMIT);
  assert_eq!(importer.search_spotify_tracks("q", 0, 10).await.len(), 1);
  assert_eq!(source.search_requests(), vec![("q".to_owned(), 50, 0), ("q".to_owned(), 1, 10)]);
  assert_eq!(db.connect().count_tracks().unwrap(), 0);
}
