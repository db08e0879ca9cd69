//! User-facing error notifications.

use tracing::warn;

/// Receives error text meant for the customer (a toast, a banner, ...).
pub trait Notifier: Send + Sync {
    /// Show `message` to the user.
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message);
    }
}

/// Notifier that only logs. Used when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        warn!(message, "User notification");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_closures_are_notifiers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |message: &str| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(message.to_string());
                }
            }
        };

        let notifier: &dyn Notifier = &sink;
        notifier.notify("hello");
        assert_eq!(seen.lock().map(|s| s.clone()).unwrap_or_default(), vec!["hello"]);
    }
}
