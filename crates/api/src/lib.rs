//! HTTP surface for the click statistics pipeline: on-demand job triggers,
//! run log lookup, health and metrics.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
