use diesel::prelude::*;
use thiserror::Error;
use tracing::{event, instrument, Level};

use tracktracker_core::model::{ExternalProfile, NewUser, User, UserLogin};
use tracktracker_core::schema::user;

use crate::model::{InternalNewUser, InternalUser};
use crate::password::HashError;

use super::{DatabaseConnection, DatabaseQueryError, non_blank, now};

// User queries

impl DatabaseConnection {
  pub fn list_users(&mut self) -> Result<Vec<User>, DatabaseQueryError> {
    Ok(user::table.order(user::id).select(User::as_select()).load(self.connection())?)
  }

  pub fn get_user_by_id(&mut self, id: i32) -> Result<Option<User>, DatabaseQueryError> {
    Ok(user::table.find(id).select(User::as_select()).first(self.connection()).optional()?)
  }

  pub fn get_user_by_username(&mut self, username: &str) -> Result<Option<User>, DatabaseQueryError> {
    Ok(user::table.filter(user::username.eq(username)).select(User::as_select()).first(self.connection()).optional()?)
  }

  pub fn get_user_by_email(&mut self, email: &str) -> Result<Option<User>, DatabaseQueryError> {
    Ok(user::table.filter(user::email.eq(email)).select(User::as_select()).first(self.connection()).optional()?)
  }

  pub fn get_user_by_provider_id(&mut self, provider_id: &str) -> Result<Option<User>, DatabaseQueryError> {
    Ok(user::table.filter(user::provider_id.eq(provider_id)).select(User::as_select()).first(self.connection()).optional()?)
  }
}

// Registration

#[derive(Debug, Error)]
pub enum UserRegisterError {
  #[error("Username must not be empty")]
  EmptyUsernameFail,
  #[error("Email must not be empty")]
  EmptyEmailFail,
  #[error("Password must not be empty")]
  EmptyPasswordFail,
  #[error("Username already exists")]
  UsernameTakenFail,
  #[error("Email already exists")]
  EmailTakenFail,
  #[error("Failed to hash password")]
  PasswordHashFail(#[from] HashError),
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl UserRegisterError {
  pub fn is_validation_failure(&self) -> bool {
    use UserRegisterError::*;
    matches!(self, EmptyUsernameFail | EmptyEmailFail | EmptyPasswordFail | UsernameTakenFail | EmailTakenFail)
  }
}

impl DatabaseConnection {
  #[instrument(level = "debug", skip(self, new_user), fields(username = %new_user.username))]
  pub fn register_user(&mut self, new_user: &NewUser) -> Result<User, UserRegisterError> {
    use UserRegisterError::*;
    let username = non_blank(Some(&new_user.username)).ok_or(EmptyUsernameFail)?;
    let email = non_blank(Some(&new_user.email)).ok_or(EmptyEmailFail)?;
    if new_user.password.is_empty() {
      return Err(EmptyPasswordFail);
    }
    let hashed = self.inner.password_hasher.hash_password(&new_user.password)?;
    let internal_new_user = InternalNewUser {
      username,
      email,
      provider_id: None,
      display_name: None,
      hash: hashed.hash,
      salt: hashed.salt,
      created_at: now(),
    };
    let user = self.connection().immediate_transaction(|connection| {
      if email_taken(connection, &internal_new_user.email, None)? {
        return Err(EmailTakenFail);
      }
      if username_taken(connection, &internal_new_user.username, None)? {
        return Err(UsernameTakenFail);
      }
      Ok(time!("register_user.insert", diesel::insert_into(user::table)
        .values(&internal_new_user)
        .returning(User::as_returning())
        .get_result(connection)?))
    })?;
    event!(Level::INFO, id = user.id, "Registered new user");
    Ok(user)
  }
}

fn username_taken(connection: &mut SqliteConnection, username: &str, except_id: Option<i32>) -> QueryResult<bool> {
  let count: i64 = user::table
    .filter(user::username.eq(username))
    .filter(user::id.ne(except_id.unwrap_or(-1)))
    .count()
    .get_result(connection)?;
  Ok(count > 0)
}

fn email_taken(connection: &mut SqliteConnection, email: &str, except_id: Option<i32>) -> QueryResult<bool> {
  let count: i64 = user::table
    .filter(user::email.eq(email))
    .filter(user::id.ne(except_id.unwrap_or(-1)))
    .count()
    .get_result(connection)?;
  Ok(count > 0)
}

// Password login

#[derive(Debug, Error)]
pub enum UserVerifyError {
  #[error("Failed to verify password")]
  PasswordVerifyFail(#[from] HashError),
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl DatabaseConnection {
  /// Verifies a login by username, falling back to email when no user has that username. Returns `None` when the user does not exist, has no password, or the
  /// password does not match.
  pub fn verify_user(&mut self, user_login: &UserLogin) -> Result<Option<User>, UserVerifyError> {
    let name = user_login.name.trim();
    let by_username: Option<InternalUser> = user::table
      .filter(user::username.eq(name))
      .select(InternalUser::as_select())
      .first(self.connection())
      .optional()?;
    let user = match by_username {
      Some(user) => Some(user),
      None => user::table
        .filter(user::email.eq(name))
        .select(InternalUser::as_select())
        .first(self.connection())
        .optional()?,
    };
    match user {
      Some(user) if user.has_password() => {
        if self.inner.password_hasher.verify_password(&user_login.password, &user.salt, &user.hash)? {
          Ok(Some(user.into()))
        } else {
          Ok(None)
        }
      }
      _ => Ok(None),
    }
  }
}

// Reconciling users of an external identity provider

#[derive(Debug, Error)]
pub enum UserReconcileError {
  #[error("Email '{0}' already belongs to another user")]
  EmailTakenFail(String),
  #[error("Failed to execute a database query")]
  DatabaseQueryFail(#[from] diesel::result::Error),
}

impl DatabaseConnection {
  /// Maps the profile of a user signed in through `provider` (e.g. `"spotify"`) to a local user, creating the user on
  /// first sign-in and refreshing its email, username, and display name on later sign-ins.
  ///
  /// Returns `None` without writing anything when the profile has no ID.
  #[instrument(level = "debug", skip(self, profile), fields(provider_id = ?profile.id))]
  pub fn reconcile_external_user(&mut self, provider: &str, profile: &ExternalProfile) -> Result<Option<User>, UserReconcileError> {
    let provider_id = match non_blank(profile.id.as_deref()) {
      Some(provider_id) => provider_id,
      None => {
        event!(Level::DEBUG, "External profile has no ID; not reconciling");
        return Ok(None);
      }
    };
    let email = non_blank(profile.email.as_deref());
    let name = non_blank(profile.preferred_name());
    let user = self.connection().immediate_transaction(|connection| {
      let existing: Option<InternalUser> = user::table
        .filter(user::provider_id.eq(&provider_id))
        .select(InternalUser::as_select())
        .first(connection)
        .optional()?;
      match existing {
        None => create_external_user(connection, provider, &provider_id, email, name),
        Some(existing) => update_external_user(connection, existing, &provider_id, email, name),
      }
    })?;
    Ok(Some(user))
  }
}

fn create_external_user(
  connection: &mut SqliteConnection,
  provider: &str,
  provider_id: &str,
  email: Option<String>,
  name: Option<String>,
) -> Result<User, UserReconcileError> {
  let email = email.unwrap_or_else(|| format!("{}@{}.com", provider_id, provider));
  if email_taken(connection, &email, None)? {
    return Err(UserReconcileError::EmailTakenFail(email));
  }
  let name = name.unwrap_or_else(|| format!("User_{}", provider_id));
  let username = available_username(connection, &name, provider_id, None)?;
  let internal_new_user = InternalNewUser {
    username,
    email,
    provider_id: Some(provider_id.to_owned()),
    display_name: Some(name),
    hash: Vec::new(),
    salt: Vec::new(),
    created_at: now(),
  };
  let user = time!("reconcile_external_user.insert", diesel::insert_into(user::table)
    .values(&internal_new_user)
    .returning(User::as_returning())
    .get_result(connection)?);
  event!(Level::INFO, id = user.id, "Created user for external identity");
  Ok(user)
}

fn update_external_user(
  connection: &mut SqliteConnection,
  mut user: InternalUser,
  provider_id: &str,
  email: Option<String>,
  name: Option<String>,
) -> Result<User, UserReconcileError> {
  let mut changed = false;
  if let Some(email) = email {
    if email != user.email && email_taken(connection, &email, Some(user.id))? {
      return Err(UserReconcileError::EmailTakenFail(email));
    }
    update!(user.email, email, changed);
  }
  if let Some(name) = name {
    let username = available_username(connection, &name, provider_id, Some(user.id))?;
    update!(user.username, username, changed);
    let display_name = Some(name);
    update!(user.display_name, display_name, changed);
  }
  if changed {
    time!("reconcile_external_user.update", diesel::update(user::table.find(user.id))
      .set((
        user::email.eq(&user.email),
        user::username.eq(&user.username),
        user::display_name.eq(&user.display_name),
      ))
      .execute(connection)?);
    event!(Level::DEBUG, id = user.id, "Updated user from external identity");
  }
  Ok(user.into())
}

/// Returns `name` if no other user has it as username. Otherwise returns `name` suffixed with the provider ID, followed
/// by a counter when that is taken as well.
fn available_username(connection: &mut SqliteConnection, name: &str, provider_id: &str, except_id: Option<i32>) -> QueryResult<String> {
  if !username_taken(connection, name, except_id)? {
    return Ok(name.to_owned());
  }
  let suffixed = format!("{}_{}", name, provider_id);
  let mut candidate = suffixed.clone();
  let mut counter = 1;
  while username_taken(connection, &candidate, except_id)? {
    counter += 1;
    candidate = format!("{}_{}", suffixed, counter);
  }
  Ok(candidate)
}
