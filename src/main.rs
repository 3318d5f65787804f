use axum::Router;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

use comanda::handlers::{
    auth_router, dish_router, order_router, table_router, user_router, AppState,
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let conn = &mut comanda::establish_connection()?;
    conn.run_pending_migrations(MIGRATIONS)
        .expect("failed to run database migrations");

    let state = AppState::from_env();

    let app = Router::new()
        .merge(auth_router())
        .merge(user_router())
        .merge(dish_router())
        .merge(table_router())
        .merge(order_router())
        .with_state(state)
        .layer(CorsLayer::permissive());

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("comanda listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
