//! REST API: router, handlers, request/response types, extractors.

mod extractors;
mod handlers;
mod router;
mod types;

pub use router::create_router;
pub use types::AppState;
