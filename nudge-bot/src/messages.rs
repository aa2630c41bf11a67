//! User-facing text for failed interactions.

use nudge_core::{ErrorKind, NudgeError};

/// Alert shown when a button press fails
pub const CALLBACK_FAILED: &str = "Something went wrong. Please try again.";

/// Translate an error into the one message the user sees.
///
/// Five kinds have fixed templates; anything else shows its own message.
pub fn user_message(err: &anyhow::Error) -> String {
    let (kind, detail) = match NudgeError::from_anyhow(err) {
        Some(nudge) => (nudge.kind, nudge.message.clone()),
        None => (ErrorKind::Generic, err.to_string()),
    };

    match kind {
        ErrorKind::Validation => format!("Invalid input: {}", detail),
        ErrorKind::Authentication => "Please start the bot with /start to sign in first.".to_string(),
        ErrorKind::Authorization => "You do not have permission to do that.".to_string(),
        ErrorKind::NotFound => format!("Not found: {}", detail),
        ErrorKind::ServiceUnavailable => {
            "The service is temporarily unavailable. Please try again in a few minutes.".to_string()
        }
        ErrorKind::UnknownJobType | ErrorKind::Generic => detail,
    }
}

/// Longer text sent to the conversation when a callback handler fails
pub fn callback_failure_detail(err: &anyhow::Error) -> String {
    format!("Could not complete that action: {}", user_message(err))
}
