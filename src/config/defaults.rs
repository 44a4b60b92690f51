/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Parser defaults
pub const DEFAULT_DELIMITER: &str = ",";
pub const DEFAULT_EXPECTED_COLUMNS: usize = 151;
pub const DEFAULT_HAS_HEADER: bool = true;

// Pipeline defaults
pub const DEFAULT_VALIDATOR_POOL_SIZE: usize = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_WORKER_COUNT: usize = 100;
pub const DEFAULT_RECORD_POOL_MAX_IDLE: usize = 4096;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

// Rule defaults
pub const DEFAULT_ENABLED_RULES: &[&str] = &["low_dti_and_home_ownership"];

pub fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

pub fn default_expected_columns() -> usize {
    DEFAULT_EXPECTED_COLUMNS
}

pub fn default_has_header() -> bool {
    DEFAULT_HAS_HEADER
}

pub fn default_validator_pool_size() -> usize {
    DEFAULT_VALIDATOR_POOL_SIZE
}

pub fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

pub fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

pub fn default_record_pool_max_idle() -> usize {
    DEFAULT_RECORD_POOL_MAX_IDLE
}

pub fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

pub fn default_enabled_rules() -> Vec<String> {
    DEFAULT_ENABLED_RULES.iter().map(|s| s.to_string()).collect()
}
