//! User-facing warnings raised by the time tracker.

use parking_lot::RwLock;
use tracing::warn;

/// Shown once when every peer disagrees with the local clock.
pub const CLOCK_WARNING: &str = "Please check that your computer's date and time are correct! If your clock is wrong, peerclock will not work properly.";

/// Delivery channel for user-visible warnings.
///
/// Delivery is fire-and-forget: implementations must not block and have no
/// way to report failure back to the caller.
pub trait Notifier: Send + Sync {
    fn warn_once(&self, message: &str);
}

/// Keeps the most recent miscellaneous warning so status endpoints can
/// report it, and echoes it to the log.
#[derive(Debug, Default)]
pub struct WarningRegistry {
    misc: RwLock<Option<String>>,
}

impl WarningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last warning delivered, if any.
    pub fn misc_warning(&self) -> Option<String> {
        self.misc.read().clone()
    }
}

impl Notifier for WarningRegistry {
    fn warn_once(&self, message: &str) {
        warn!(target: "warning", "{message}");
        *self.misc.write() = Some(message.to_string());
    }
}
