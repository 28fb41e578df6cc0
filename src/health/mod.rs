//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream probe (active.rs):
//!     Periodic timer
//!     → GET health_check.path on the upstream
//!     → StatusUpdater::update
//!
//! Request path (checks.rs):
//!     health_gate middleware
//!     → HealthRegistry::failures()
//!     → 503 + JSON of failing checks, or forward
//! ```
//!
//! # Design Decisions
//! - Checks are opaque `Checker` trait objects; the middleware only invokes them
//! - Failure requires consecutive failed probes to prevent flapping
//! - Sits inside the liveness bypass, so probes of the gate itself never see 503

pub mod active;
pub mod checks;

pub use active::UpstreamProbe;
pub use checks::{health_gate, Checker, HealthRegistry, StatusUpdater};
