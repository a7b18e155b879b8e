//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, graceful shutdown)
//!     → mirror layer (snapshots the exchange, see crate::mirror)
//!     → routes.rs (method guard, handlers)
//!     → response.rs (pretty JSON + CORS headers)
//!     → Send to client
//! ```

pub mod response;
pub mod routes;
pub mod server;

pub use routes::AppState;
pub use server::{HttpServer, X_REQUEST_ID};
