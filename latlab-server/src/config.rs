use std::time::Duration;

/// Maximum time to wait when acquiring the log's read or write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Rows returned by GET /performance-logs when no `limit` is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;
