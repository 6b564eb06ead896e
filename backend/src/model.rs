use chrono::NaiveDateTime;
use diesel::prelude::*;

use tracktracker_core::model::User;
use tracktracker_core::schema::user;

// Internal user (includes password hash and salt)

#[derive(Clone, PartialEq, Eq, Debug, Identifiable, Queryable, Selectable)]
#[diesel(table_name = user)]
pub(crate) struct InternalUser {
  pub id: i32,
  pub username: String,
  pub email: String,
  pub provider_id: Option<String>,
  pub display_name: Option<String>,
  pub hash: Vec<u8>,
  pub salt: Vec<u8>,
  pub created_at: NaiveDateTime,
}

impl InternalUser {
  /// Users created through an external provider have no password and cannot log in with one.
  pub fn has_password(&self) -> bool {
    !self.hash.is_empty()
  }
}

impl From<InternalUser> for User {
  fn from(user: InternalUser) -> Self {
    User {
      id: user.id,
      username: user.username,
      email: user.email,
      provider_id: user.provider_id,
      display_name: user.display_name,
      created_at: user.created_at,
    }
  }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user)]
pub(crate) struct InternalNewUser {
  pub username: String,
  pub email: String,
  pub provider_id: Option<String>,
  pub display_name: Option<String>,
  pub hash: Vec<u8>,
  pub salt: Vec<u8>,
  pub created_at: NaiveDateTime,
}
