mod handlers;
mod routes;

pub use handlers::{ApiError, AppState, DashboardQuery, ErrorResponse};
pub use routes::create_api_router;
