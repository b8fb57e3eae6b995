/// Socialgram server library.
///
/// Follow graph, chat membership and content ledgers over SQLite, exposed
/// through an actix-web REST surface.
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod server;
pub mod services;

pub use error::{CoreError, Result};
