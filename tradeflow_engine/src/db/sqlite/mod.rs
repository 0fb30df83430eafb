pub mod db;
mod errors;

pub mod audit;
pub mod catalog;
pub mod documents;
pub mod orders;
pub mod payments;
pub mod quotes;
pub mod verification;

use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::db::traits::StoreError;

const SQLITE_DB_URL: &str = "sqlite://data/tradeflow.db";

pub fn db_url() -> String {
    let result = env::var("TFL_DATABASE_URL").unwrap_or_else(|_| {
        info!("TFL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub use db::SqliteDatabase;
