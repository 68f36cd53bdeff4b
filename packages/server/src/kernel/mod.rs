//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ServerDeps, Stores, TwilioAdapter};
pub use scheduled_tasks::{start_scheduler, DEFAULT_OTP_PURGE_CRON};
pub use test_dependencies::{FlakyLedgerStore, ManualClock, MockNotifier, TestDependencies};
pub use traits::*;
