//! Process-wide logging setup shared by every retailpos binary and test harness.

/// Tracing subscriber configuration (filters, formatting).
pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, init, init_with_default};
