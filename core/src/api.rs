use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Error)]
#[error("Internal server error")]
pub struct InternalServerError {
  pub message: String,
}

/// Body of a rejected request: a validation failure with a message meant for the caller.
#[derive(Serialize, Deserialize, Debug, Error)]
#[error("Bad request: {error}")]
pub struct BadRequestError {
  pub error: String,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct AverageRating {
  pub average: Option<f64>,
}
