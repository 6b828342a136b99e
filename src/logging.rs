//! Log subscriber setup for hosts that do not install their own.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"info"` or
/// `"kpi_audit_core=debug"`) is used. Returns `false` if a global subscriber
/// was already installed, which makes repeated calls harmless.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init("warn");
        assert!(!init("debug"));
    }
}
