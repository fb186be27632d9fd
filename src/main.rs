mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();
    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    if let Some((name, password)) = &config.bootstrap_admin {
        match services::users::ensure_admin(&pool, name, password).await {
            Ok(admin) => tracing::info!(user_id = admin.id, "bootstrap admin ready"),
            Err(e) => tracing::warn!(error = %e, "bootstrap admin setup failed"),
        }
    }

    let port = config.port;
    let state = state::AppState::new(pool, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "songboard listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
