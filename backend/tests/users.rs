use tracktracker_backend::database::user::{UserReconcileError, UserRegisterError};
use tracktracker_core::model::{ExternalProfile, NewUser, UserLogin};

use common::{register_user, TestDatabase};

mod common;

fn profile(id: &str, email: Option<&str>, display_name: Option<&str>) -> ExternalProfile {
  ExternalProfile {
    id: Some(id.to_owned()),
    email: email.map(str::to_owned),
    display_name: display_name.map(str::to_owned),
    name: None,
  }
}

#[test]
fn register_and_verify() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let user = register_user(&mut connection, "alice");
  assert_eq!(user.email, "alice@example.com");
  assert_eq!(connection.get_user_by_id(user.id).unwrap(), Some(user.clone()));
  assert_eq!(connection.get_user_by_username("alice").unwrap(), Some(user.clone()));
  assert_eq!(connection.get_user_by_email("alice@example.com").unwrap(), Some(user.clone()));

  let login = |name: &str, password: &str| UserLogin { name: name.to_owned(), password: password.to_owned() };
  assert_eq!(connection.verify_user(&login("alice", "hunter2")).unwrap(), Some(user.clone()));
  assert_eq!(connection.verify_user(&login("alice@example.com", "hunter2")).unwrap(), Some(user));
  assert_eq!(connection.verify_user(&login("alice", "wrong")).unwrap(), None);
  assert_eq!(connection.verify_user(&login("bob", "hunter2")).unwrap(), None);
}

#[test]
fn duplicate_registration_is_rejected_without_write() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  register_user(&mut connection, "alice");
  let same_username = NewUser { username: "alice".to_owned(), email: "other@example.com".to_owned(), password: "pw".to_owned() };
  assert!(matches!(connection.register_user(&same_username), Err(UserRegisterError::UsernameTakenFail)));
  let same_email = NewUser { username: "other".to_owned(), email: "alice@example.com".to_owned(), password: "pw".to_owned() };
  assert!(matches!(connection.register_user(&same_email), Err(UserRegisterError::EmailTakenFail)));
  let empty_password = NewUser { username: "other".to_owned(), email: "other@example.com".to_owned(), password: String::new() };
  assert!(matches!(connection.register_user(&empty_password), Err(UserRegisterError::EmptyPasswordFail)));
  assert_eq!(connection.list_users().unwrap().len(), 1);
}

#[test]
fn reconcile_creates_user_with_defaults() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let user = connection.reconcile_external_user("spotify", &ExternalProfile { id: Some("abc".to_owned()), ..ExternalProfile::default() }).unwrap().unwrap();
  assert_eq!(user.email, "abc@spotify.com");
  assert_eq!(user.username, "User_abc");
  assert_eq!(user.display_name.as_deref(), Some("User_abc"));
  assert_eq!(user.provider_id.as_deref(), Some("abc"));
  assert_eq!(connection.get_user_by_provider_id("abc").unwrap(), Some(user));
}

#[test]
fn reconcile_without_id_writes_nothing() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  assert_eq!(connection.reconcile_external_user("spotify", &ExternalProfile::default()).unwrap(), None);
  assert!(connection.list_users().unwrap().is_empty());
}

#[test]
fn reconcile_is_idempotent() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let profile = profile("abc", Some("abc@mail.com"), Some("Abc"));
  let first = connection.reconcile_external_user("spotify", &profile).unwrap().unwrap();
  let second = connection.reconcile_external_user("spotify", &profile).unwrap().unwrap();
  assert_eq!(first, second);
  assert_eq!(connection.list_users().unwrap().len(), 1);
}

#[test]
fn reconcile_refreshes_changed_fields_only() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let first = connection.reconcile_external_user("spotify", &profile("abc", Some("abc@mail.com"), Some("Abc"))).unwrap().unwrap();
  let updated = connection.reconcile_external_user("spotify", &profile("abc", None, Some("New Name"))).unwrap().unwrap();
  assert_eq!(updated.id, first.id);
  assert_eq!(updated.email, "abc@mail.com");
  assert_eq!(updated.username, "New Name");
  assert_eq!(updated.display_name.as_deref(), Some("New Name"));
}

#[test]
fn reconcile_suffixes_taken_username() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  register_user(&mut connection, "alice");
  let user = connection.reconcile_external_user("spotify", &profile("xyz", Some("xyz@mail.com"), Some("alice"))).unwrap().unwrap();
  assert_eq!(user.username, "alice_xyz");
  assert_eq!(user.display_name.as_deref(), Some("alice"));
}

#[test]
fn reconcile_rejects_email_of_other_user() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  register_user(&mut connection, "alice");
  let result = connection.reconcile_external_user("spotify", &profile("xyz", Some("alice@example.com"), None));
  assert!(matches!(result, Err(UserReconcileError::EmailTakenFail(_))));
  assert_eq!(connection.list_users().unwrap().len(), 1);
}

#[test]
fn external_users_cannot_log_in_with_password() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let user = connection.reconcile_external_user("spotify", &profile("abc", None, Some("abc"))).unwrap().unwrap();
  let login = UserLogin { name: user.username.clone(), password: String::new() };
  assert_eq!(connection.verify_user(&login).unwrap(), None);
}

#[test]
fn reconcile_counts_up_when_suffixed_username_is_taken() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  register_user(&mut connection, "alice");
  register_user(&mut connection, "alice_xyz");
  let user = connection.reconcile_external_user("spotify", &profile("xyz", Some("xyz@mail.com"), Some("alice"))).unwrap().unwrap();
  assert_eq!(user.username, "alice_xyz_2");
  let again = connection.reconcile_external_user("spotify", &profile("xyz", Some("xyz@mail.com"), Some("alice"))).unwrap().unwrap();
  assert_eq!(again, user);
  assert_eq!(connection.list_users().unwrap().len(), 3);
}

#[test]
fn login_prefers_username_over_email() {
  let db = TestDatabase::new();
  let mut connection = db.connect();
  let bob = register_user(&mut connection, "bob");
  let other = connection.register_user(&NewUser {
    username: "bob@example.com".to_owned(),
    email: "other@example.com".to_owned(),
    password: "other-password".to_owned(),
  }).unwrap();

  let login = |name: &str, password: &str| UserLogin { name: name.to_owned(), password: password.to_owned() };
  assert_eq!(connection.verify_user(&login("bob@example.com", "other-password")).unwrap(), Some(other));
  assert_eq!(connection.verify_user(&login("bob@example.com", "hunter2")).unwrap(), None);
  assert_eq!(connection.verify_user(&login("bob", "hunter2")).unwrap(), Some(bob));
}
