//! Unified error handling with Sentry integration.
//!
//! [`CartError`] is what every cart mutation and session transition can fail
//! with. It never carries partial state: by the time a caller sees it the
//! cart has already been rolled back.

use thiserror::Error;

use crate::local::PersistenceError;
use crate::remote::RemoteError;

/// Error surfaced by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Writing the guest cart to device storage failed.
    #[error("Local storage error: {0}")]
    Local(#[from] PersistenceError),

    /// The remote cart store rejected or never answered the request.
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}

impl CartError {
    /// Whether the device ran out of storage space.
    #[must_use]
    pub const fn is_insufficient_space(&self) -> bool {
        matches!(self, Self::Local(PersistenceError::InsufficientSpace(_)))
    }

    /// Text safe to show to the customer.
    ///
    /// Internal details (status codes, paths, keys) are never included.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Local(PersistenceError::InsufficientSpace(_)) => {
                "저장 공간 부족: 기기의 저장 공간을 확보한 뒤 다시 시도해주세요."
            }
            Self::Local(_) => "장바구니를 기기에 저장하지 못했습니다. 다시 시도해주세요.",
            Self::Remote(RemoteError::RateLimited(_)) => {
                "요청이 너무 많습니다. 잠시 후 다시 시도해주세요."
            }
            Self::Remote(_) => "장바구니를 저장하지 못했습니다. 잠시 후 다시 시도해주세요.",
        }
    }
}

/// Result type alias for [`CartError`].
pub type Result<T> = std::result::Result<T, CartError>;

/// Shown when the guest cart could not be uploaded at login.
pub const MERGE_FAILED_MESSAGE: &str =
    "비회원 장바구니를 계정 장바구니와 합치지 못했습니다. 기존 계정 장바구니를 표시합니다.";

/// Shown when the server cart could not be fetched at login.
pub const FETCH_FAILED_MESSAGE: &str =
    "서버 장바구니를 불러오지 못해 마지막으로 저장된 장바구니를 표시합니다.";

/// Set the Sentry user context from a user ID.
///
/// Call this after a login transition to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a breadcrumb that shows up in later Sentry reports.
pub fn breadcrumb(category: &str, message: &str, data: &[(&str, serde_json::Value)]) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        data: data
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect(),
        ..Default::default()
    });
}

/// Report an error to Sentry and log it with the event id.
pub fn capture(err: &(dyn std::error::Error + 'static), context: &str) {
    let event_id = sentry::capture_error(err);
    tracing::error!(
        error = %err,
        sentry_event_id = %event_id,
        "{context}"
    );
}
