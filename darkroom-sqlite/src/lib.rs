#![doc = include_str!("../README.md")]

pub mod store;
pub(crate) mod types;

pub use store::SqliteJobStore;
use sqlx::migrate::Migrator;
pub static MIGRATOR: Migrator = sqlx::migrate!();
