/// HTTP server factory and configuration.
/// Provides the route table and a reusable function to create the HTTP
/// server for use in both the main binary and tests.

use actix_web::{middleware, web, App, HttpServer};

use crate::config::ServiceSettings;
use crate::db::DbPool;
use crate::handlers::{chat, health, json_config, path_config, rest};

/// Register every REST route under `/api` plus `/health`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                // Accounts
                .route("/auth/signup", web::post().to(rest::sign_up))
                .route("/auth/signin", web::post().to(rest::sign_in))
                .route("/auth/signout", web::post().to(rest::sign_out))
                .route("/users/me", web::get().to(rest::get_me))
                .route("/users/me", web::patch().to(rest::update_profile))
                .route("/users/me", web::delete().to(rest::delete_account))
                .route("/users/{user_id}", web::get().to(rest::get_user))
                // Follow graph
                .route("/users/{user_id}/follow", web::post().to(rest::follow))
                .route("/users/{user_id}/follow", web::delete().to(rest::unfollow))
                .route("/users/{user_id}/followers", web::get().to(rest::list_followers))
                .route("/users/{user_id}/following", web::get().to(rest::list_following))
                .route("/users/{user_id}/photos", web::get().to(rest::user_photos))
                // Photos
                .route("/photos", web::post().to(rest::publish_photo))
                .route("/photos/saved", web::get().to(rest::saved_photos))
                .route("/photos/{photo_id}", web::get().to(rest::get_photo))
                .route("/photos/{photo_id}", web::delete().to(rest::delete_photo))
                .route("/photos/{photo_id}/description", web::patch().to(rest::edit_description))
                .route("/photos/{photo_id}/archive", web::post().to(rest::archive_photo))
                .route("/photos/{photo_id}/archive", web::delete().to(rest::unarchive_photo))
                .route("/photos/{photo_id}/share", web::post().to(rest::share_photo))
                .route("/photos/{photo_id}/like", web::post().to(rest::like_photo))
                .route("/photos/{photo_id}/like", web::delete().to(rest::unlike_photo))
                .route("/photos/{photo_id}/save", web::post().to(rest::save_photo))
                .route("/photos/{photo_id}/save", web::delete().to(rest::unsave_photo))
                .route("/photos/{photo_id}/marked", web::get().to(rest::marked_users))
                .route("/photos/{photo_id}/marked", web::post().to(rest::mark_user))
                .route("/photos/{photo_id}/marked/refresh", web::post().to(rest::refresh_marked_flag))
                .route("/photos/{photo_id}/marked/{user_id}", web::delete().to(rest::unmark_user))
                // Chats
                .route("/chats", web::get().to(chat::get_all_chats))
                .route("/chats/one-to-one", web::post().to(chat::create_one_to_one_chat))
                .route("/chats/group", web::post().to(chat::create_group_chat))
                .route("/chats/{chat_id}", web::get().to(chat::get_chat))
                .route("/chats/{chat_id}", web::delete().to(chat::delete_group_chat))
                .route("/chats/{chat_id}/name", web::patch().to(chat::edit_group_chat_name))
                .route("/chats/{chat_id}/cover", web::put().to(chat::change_chat_cover))
                .route("/chats/{chat_id}/cover", web::delete().to(chat::delete_chat_cover))
                .route("/chats/{chat_id}/participants", web::get().to(chat::get_participants))
                .route("/chats/{chat_id}/participants", web::post().to(chat::add_participant))
                .route(
                    "/chats/{chat_id}/participants/{participant_id}",
                    web::delete().to(chat::delete_participant),
                )
                .route("/chats/{chat_id}/leave", web::post().to(chat::leave_group_chat))
                .route("/chats/{chat_id}/messages", web::get().to(chat::get_messages))
                .route("/chats/{chat_id}/messages", web::post().to(chat::send_message))
                .route("/chats/{chat_id}/read", web::post().to(chat::mark_messages_read))
                // Messages
                .route("/messages/{message_id}", web::delete().to(chat::delete_message))
                .route("/messages/{message_id}/like", web::post().to(chat::like_message))
                .route("/messages/{message_id}/like", web::delete().to(chat::unlike_message)),
        );
}

/// Create a configured HTTP server
///
/// Takes the database pool, service settings, and bind address, then
/// returns a fully configured server ready to be awaited.
///
/// # Example
/// ```ignore
/// let pool = web::Data::new(db::create_pool("socialgram.db")?);
/// let settings = web::Data::new(config.service_settings());
/// let server = server::create_http_server(pool, settings, "127.0.0.1:4000")?;
/// server.await?;
/// ```
pub fn create_http_server(
    pool: web::Data<DbPool>,
    settings: web::Data<ServiceSettings>,
    bind_addr: &str,
) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(settings.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

/// Create a test HTTP server with an in-memory database bound to a random
/// port. Returns the server and its bind address.
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_http_server() -> std::io::Result<(actix_web::dev::Server, String)> {
    let pool = web::Data::new(crate::db::create_test_pool());
    let settings = web::Data::new(ServiceSettings::default());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(settings.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind("127.0.0.1:0")?;

    let addr_str = server
        .addrs()
        .first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "No bind address found"))?
        .to_string();

    Ok((server.run(), addr_str))
}
