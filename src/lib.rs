pub mod bridge;
pub mod config;
pub mod error;
pub mod infra;
pub mod routes;
pub mod telemetry;

mod cli;
mod server;

use crate::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
