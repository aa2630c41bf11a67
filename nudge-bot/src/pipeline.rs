//! Assembles the standard middleware stack around a handler.

use crate::{
    handler::{compose, BoxedHandler, Middleware},
    middlewares::{acknowledge_callback, error_boundary, require_params, track_activity, RequiredParam},
};

/// Which cross-cutting behaviors wrap a handler.
///
/// Defaults to activity tracking and an error boundary, no validation,
/// not a callback query.
#[derive(Clone)]
pub struct HandlerOptions {
    pub track_activity: bool,
    pub required_params: Vec<RequiredParam>,
    pub is_callback_query: bool,
    /// Applied innermost, in the given order
    pub custom_middleware: Vec<Middleware>,
    pub handle_errors: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            track_activity: true,
            required_params: Vec::new(),
            is_callback_query: false,
            custom_middleware: Vec::new(),
            handle_errors: true,
        }
    }
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_activity(mut self, enabled: bool) -> Self {
        self.track_activity = enabled;
        self
    }

    pub fn require(mut self, param: RequiredParam) -> Self {
        self.required_params.push(param);
        self
    }

    pub fn callback_query(mut self) -> Self {
        self.is_callback_query = true;
        self
    }

    pub fn with_custom(mut self, middleware: Middleware) -> Self {
        self.custom_middleware.push(middleware);
        self
    }

    pub fn handle_errors(mut self, enabled: bool) -> Self {
        self.handle_errors = enabled;
        self
    }

    /// Wrapper list from innermost to outermost
    fn layers(&self) -> Vec<Middleware> {
        let mut layers = self.custom_middleware.clone();
        if self.track_activity {
            layers.push(track_activity());
        }
        if !self.required_params.is_empty() {
            layers.push(require_params(self.required_params.clone()));
        }
        if self.is_callback_query {
            layers.push(acknowledge_callback(!self.handle_errors));
        }
        if self.handle_errors {
            layers.push(error_boundary());
        }
        layers
    }
}

/// Wrap `handler` with the stack described by `options`.
///
/// Layers are stacked custom, activity, validation, callback acknowledgment,
/// error boundary, each one wrapping the previous. The error boundary is
/// therefore outermost and sees failures from every other layer.
pub fn with_middleware(handler: BoxedHandler, options: &HandlerOptions) -> BoxedHandler {
    let mut layers = options.layers();
    layers.reverse();
    compose(handler, &layers)
}
