//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → gate.rs (classify: control / exempt / gated)
//!         control → control.rs (render page, or parse form and set quota)
//!         exempt  → next layer, quota untouched
//!         gated   → quota.rs accept_request()
//!                       true  → next layer
//!                       false → 429 + Retry-After
//! ```
//!
//! # Design Decisions
//! - One quota per server, owned by the composition root
//! - The quota lock is never held across an await point
//! - Bad form input is a rendered problem, never an error response

pub mod control;
pub mod gate;
pub mod quota;

pub use control::QuotaInputError;
pub use gate::{admission_gate, AdmissionGate};
pub use quota::{Quota, UNLIMITED};
