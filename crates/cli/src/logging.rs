//! Log output for the `log` records emitted by the library crates.

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `ORDERCHECK_LOG=ordercheck_provider=debug`.
pub const LOG_ENV: &str = "ORDERCHECK_LOG";

/// Level implied by `-v` / `-q` when no filter is set in the environment.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the stderr subscriber. Explicit `-v` flags beat `ORDERCHECK_LOG`.
pub fn init(verbose: u8, quiet: bool) {
    let directive = default_directive(verbose, quiet);
    let filter = if verbose > 0 || quiet {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directive))
    };

    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(0, false), "warn");
        assert_eq!(default_directive(1, false), "info");
        assert_eq!(default_directive(5, false), "debug");
        assert_eq!(default_directive(2, true), "error");
    }
}
