use std::env;

use diesel::{Connection, ConnectionResult, PgConnection};
use dotenvy::dotenv;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presenter;
pub mod schema;
pub mod service;
pub mod store;

pub fn establish_connection() -> ConnectionResult<PgConnection> {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
}
