//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, composed middleware chain)
//!         → request id + TraceLayer (request logging)
//!         → crash.rs (recovery boundary)
//!         → admission gate (see crate::admission)
//!         → liveness.rs (fixed 200 on the liveness path)
//!         → health gate (see crate::health)
//!         → upstream.rs (forward to the wrapped service)
//!     → Send to client
//! ```

pub mod crash;
pub mod liveness;
pub mod server;
pub mod upstream;

pub use crash::FatalHook;
pub use server::{compose, HttpServer, Middleware, ServerError};
