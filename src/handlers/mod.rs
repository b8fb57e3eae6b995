/// HTTP handlers module
/// Provides the REST endpoints, the bearer-token identity extractor and the
/// extractor configs that render malformed input as `INVALID_INPUT`.

pub mod chat;
pub mod identity;
pub mod rest;

pub use identity::AuthenticatedUser;
pub use rest::health;

use actix_web::web;

use crate::error::CoreError;

/// JSON body extractor config; undecodable bodies get the standard error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected JSON body: {}", err);
        CoreError::InvalidInput(err.to_string()).into()
    })
}

/// Path extractor config; undecodable segments get the standard error shape
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected path: {}", err);
        CoreError::InvalidInput(err.to_string()).into()
    })
}
