#![allow(dead_code)]

use tempfile::TempDir;

use tracktracker_backend::database::{Database, DatabaseConnection};
use tracktracker_backend::password::PasswordHasher;
use tracktracker_core::model::{NewTrack, NewUser, Track, User};

pub mod source;

/// A database in a temporary directory, deleted on drop.
pub struct TestDatabase {
  pub database: Database,
  _directory: TempDir,
}

impl TestDatabase {
  pub fn new() -> Self {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("test.db");
    let database = Database::new(path.to_str().unwrap(), PasswordHasher::new("test-secret-key")).unwrap();
    Self { database, _directory: directory }
  }

  pub fn connect(&self) -> DatabaseConnection {
    self.database.connect().unwrap()
  }
}

pub fn register_user(connection: &mut DatabaseConnection, username: &str) -> User {
  connection.register_user(&NewUser {
    username: username.to_owned(),
    email: format!("{}@example.com", username),
    password: "hunter2".to_owned(),
  }).unwrap()
}

pub fn create_track(connection: &mut DatabaseConnection, title: &str, artist: &str) -> Track {
  connection.create_track(&NewTrack::new(title, artist)).unwrap()
}
