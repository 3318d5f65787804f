pub mod auth;
pub mod dishes;
pub mod orders;
pub mod tables;
pub mod users;

// Re-export routers for easier importing
pub use auth::router as auth_router;
pub use dishes::router as dish_router;
pub use orders::router as order_router;
pub use tables::router as table_router;
pub use users::router as user_router;

use std::sync::Arc;

use crate::auth::AuthKeys;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthKeys>,
}

impl AppState {
    pub fn from_env() -> Self {
        Self {
            auth: Arc::new(AuthKeys::from_env()),
        }
    }
}
