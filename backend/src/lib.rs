pub mod database;
pub mod model;
pub mod password;
pub mod import;
pub mod seed;
