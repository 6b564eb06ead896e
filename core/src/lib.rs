#[cfg(feature = "diesel")]
pub mod schema;
pub mod model;
#[cfg(feature = "serde")]
pub mod api;
pub mod format_error;
