pub mod client;
pub mod memory;
mod record;
pub mod repository;

use thiserror::Error;
use trackboard_common::{model::ModelValidationError, snowflake::SnowflakeError};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeError),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("No {0} with id {1}")]
    NotFound(&'static str, u64),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
