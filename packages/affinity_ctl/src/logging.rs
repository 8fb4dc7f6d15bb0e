use std::env;
use std::io;

use tracing_subscriber::EnvFilter;

/// Used when neither `RUST_LOG` nor the configuration file name a filter.
const DEFAULT_FILTER: &str = "warn";

/// Sends log output to standard error, which keeps standard output free for command results.
///
/// The filter comes from `RUST_LOG` if set, otherwise from the configuration file, otherwise
/// only warnings and errors are logged.
#[doc(hidden)]
#[cfg_attr(test, mutants::skip)] // Installs a process-wide subscriber.
pub fn init_logging(configured: Option<&str>) {
    let directives = filter_directives(env::var(EnvFilter::DEFAULT_ENV).ok(), configured);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn filter_directives(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|directives| !directives.trim().is_empty())
        .or_else(|| configured.map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn environment_wins_over_configuration() {
        assert_eq!(
            filter_directives(Some("trace".to_owned()), Some("info")),
            "trace"
        );
    }

    #[test]
    fn configuration_wins_over_default() {
        assert_eq!(filter_directives(None, Some("info")), "info");
        assert_eq!(filter_directives(Some("  ".to_owned()), Some("info")), "info");
    }

    #[test]
    fn default_is_warn() {
        assert_eq!(filter_directives(None, None), "warn");
    }
}
