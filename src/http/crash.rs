//! Crash containment.
//!
//! A panic inside any downstream handler is caught at this boundary, logged
//! with its original message, and escalated through a [`FatalHook`]. The
//! production hook ends the process; nothing the faulted handler produced
//! reaches the client.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use crate::observability::metrics;

/// Exit status used when a request handler panics (EX_SOFTWARE).
pub const FATAL_EXIT_CODE: i32 = 70;

/// Callback invoked with the panic message after it has been logged.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hook that terminates the process.
pub fn terminate() -> FatalHook {
    Arc::new(|_message: &str| {
        std::process::exit(FATAL_EXIT_CODE);
    })
}

/// Panic handler plugged into [`CatchPanicLayer`].
#[derive(Clone)]
pub struct EscalateOnPanic {
    on_fatal: FatalHook,
}

impl EscalateOnPanic {
    pub fn new(on_fatal: FatalHook) -> Self {
        Self { on_fatal }
    }
}

impl ResponseForPanic for EscalateOnPanic {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let message = panic_message(err.as_ref());

        tracing::error!(panic = %message, "Unrecovered fault in request handler, escalating");
        metrics::record_fatal();
        (self.on_fatal)(&message);

        // Only reached when the hook lets the process live.
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }
}

/// Recovery boundary layer.
pub fn layer(on_fatal: FatalHook) -> CatchPanicLayer<EscalateOnPanic> {
    CatchPanicLayer::custom(EscalateOnPanic::new(on_fatal))
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic payload of unknown type".to_string()
    }
}
