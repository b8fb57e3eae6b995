/// Bearer-token identity extractor.
/// Resolves `Authorization: Bearer <token>` to the signed-in user id.
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::config::ServiceSettings;
use crate::db::{with_transaction, DbPool};
use crate::error::CoreError;
use crate::services::Accounts;

/// The verified caller of a request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = CoreError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let pool = req.app_data::<web::Data<DbPool>>().cloned();
        let settings = req.app_data::<web::Data<ServiceSettings>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let token = token.ok_or(CoreError::Unauthenticated)?;
            let (pool, settings) = match (pool, settings) {
                (Some(pool), Some(settings)) => (pool, settings),
                _ => {
                    log::error!("Identity extractor used without pool or settings app data");
                    return Err(CoreError::Unauthenticated);
                }
            };

            let user_id = with_transaction(&pool, |conn| {
                Accounts::new(conn, &settings.accounts).authenticate(&token)
            })
            .await?;

            Ok(AuthenticatedUser { user_id, token })
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
