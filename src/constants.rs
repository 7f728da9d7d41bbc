// -
// Configuration sources

/// Environment variable naming an optional configuration file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Prefix for environment overrides, e.g. `WATCHER__FETCH_RETRY__MAX_RETRIES`
pub(crate) const ENV_PREFIX: &str = "WATCHER";
pub(crate) const ENV_SEPARATOR: &str = "__";

// -
// Payload decoding

/// Key used when a payload is not valid JSON and is kept as raw text
pub const STRING_VALUE_KEY: &str = "string_value";

/// Namespace path separator
pub(crate) const PATH_SEPARATOR: char = '/';
