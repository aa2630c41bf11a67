mod activity;
mod callback;
mod error_boundary;
mod validation;

pub use activity::track_activity;
pub use callback::acknowledge_callback;
pub use error_boundary::error_boundary;
pub use validation::{require_params, RequiredParam};
