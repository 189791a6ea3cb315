//! Process-wide logging setup shared by linkage binaries.

/// Tracing subscriber installation.
pub mod tracing;

pub use self::tracing::LogFormat;

/// Environment variable selecting the log format (`json` or `pretty`).
pub const LOG_FORMAT_VAR: &str = "LINKAGE_LOG_FORMAT";

/// Initialize process-wide tracing, JSON by default.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let format = std::env::var(LOG_FORMAT_VAR)
        .map(|name| LogFormat::from_name(&name))
        .unwrap_or_default();
    tracing::init(format);
}
