//! Default values for kbtrain configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Service Defaults
// ============================================================================

/// Default knowledge-base service URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default request timeout in seconds. Training calls wait for the job to
/// finish, so this is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "KBTRAIN_API_KEY";

// ============================================================================
// Sync Defaults
// ============================================================================

/// Quiet window before a mutation triggers a re-fetch (milliseconds).
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

// ============================================================================
// Training Defaults
// ============================================================================

/// Interval between progress ticks while a job is pending (milliseconds).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Progress added per tick.
pub const DEFAULT_PROGRESS_STEP: u8 = 10;

/// Ticks never push progress past this value; only completion reaches 100.
pub const DEFAULT_PROGRESS_CEILING: u8 = 90;

/// Events buffered per subscriber before the slowest one starts losing them.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".kbtrain";

/// Default agents subdirectory.
pub const DEFAULT_AGENTS_DIR: &str = "agents";

/// Default registry snapshot file name.
pub const DEFAULT_SNAPSHOT_FILE: &str = "registry.json";

/// Default current agent pointer file name.
pub const DEFAULT_CURRENT_FILE: &str = "current";

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";
