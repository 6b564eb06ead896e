use std::fmt::{Debug, Formatter};

use argon2::Config;
use rand::RngCore;
use thiserror::Error;

/// Hashes user passwords with argon2, keyed with a server-side secret key.
#[derive(Clone)]
pub struct PasswordHasher {
  secret_key: Vec<u8>,
}

impl Debug for PasswordHasher {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PasswordHasher").finish_non_exhaustive()
  }
}

#[derive(Debug, Error)]
pub enum HashError {
  #[error(transparent)]
  HashFail(#[from] argon2::Error),
}

/// Password hash together with the salt it was created with.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HashedPassword {
  pub hash: Vec<u8>,
  pub salt: Vec<u8>,
}

impl PasswordHasher {
  pub const SALT_SIZE: usize = 32;

  pub fn new<S: Into<Vec<u8>>>(secret_key: S) -> Self {
    Self { secret_key: secret_key.into() }
  }

  /// Hashes `password` with a freshly generated salt.
  pub fn hash_password(&self, password: &str) -> Result<HashedPassword, HashError> {
    let mut salt = vec![0; Self::SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = argon2::hash_raw(password.as_bytes(), &salt, &self.config())?;
    Ok(HashedPassword { hash, salt })
  }

  /// Checks `password` against a stored hash and salt. An empty stored hash never matches.
  pub fn verify_password(&self, password: &str, salt: &[u8], hash: &[u8]) -> Result<bool, HashError> {
    if hash.is_empty() {
      return Ok(false);
    }
    Ok(argon2::verify_raw(password.as_bytes(), salt, hash, &self.config())?)
  }

  fn config(&self) -> Config<'_> {
    Config { secret: &self.secret_key, ..Config::default() }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashed_password_verifies_only_with_same_password_and_secret() {
    let hasher = PasswordHasher::new("secret");
    let hashed = hasher.hash_password("hunter2").unwrap();
    assert_eq!(hashed.salt.len(), PasswordHasher::SALT_SIZE);
    assert!(hasher.verify_password("hunter2", &hashed.salt, &hashed.hash).unwrap());
    assert!(!hasher.verify_password("hunter3", &hashed.salt, &hashed.hash).unwrap());
    let other_hasher = PasswordHasher::new("other secret");
    assert!(!other_hasher.verify_password("hunter2", &hashed.salt, &hashed.hash).unwrap());
  }

  #[test]
  fn salts_differ_between_hashes() {
    let hasher = PasswordHasher::new("secret");
    let first = hasher.hash_password("same").unwrap();
    let second = hasher.hash_password("same").unwrap();
    assert_ne!(first.salt, second.salt);
    assert_ne!(first.hash, second.hash);
  }

  #[test]
  fn empty_hash_never_verifies() {
    let hasher = PasswordHasher::new("secret");
    assert!(!hasher.verify_password("", &[], &[]).unwrap());
  }

  #[test]
  fn debug_hides_secret_key() {
    assert!(!format!("{:?}", PasswordHasher::new("top-secret")).contains("top-secret"));
  }
}
