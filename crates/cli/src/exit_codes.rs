//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `ordercheck` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Description                                                  |
//! |------|--------------------------------------------------------------|
//! | 0    | Success                                                      |
//! | 1    | Discrepancies found (only with `--fail-on-discrepancy`)      |
//! | 2    | CLI usage error (bad args, unsupported ledger format)        |
//! | 3    | I/O error (unreadable ledger, unwritable output)             |
//! | 60   | Ledger schema error (missing column, no anchor row)          |
//! | 61   | Missing provider credentials                                 |
//! | 62   | Provider rejected the credentials                            |
//! | 63   | Run cancelled                                                |
//! | 64   | Invalid configuration                                        |

use ordercheck_provider::ProviderError;
use ordercheck_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Orders outside tolerance and `--fail-on-discrepancy` was given.
pub const EXIT_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Reading the ledger or writing an output failed.
pub const EXIT_IO: u8 = 3;

/// Ledger headers or first row unusable. Raised before any network activity.
pub const EXIT_SCHEMA: u8 = 60;

/// No API key from `--api-key` or the environment.
pub const EXIT_MISSING_CREDENTIALS: u8 = 61;

/// Credential exchange rejected, or the token stayed invalid after re-auth.
pub const EXIT_AUTH: u8 = 62;

/// Interrupted before the report was assembled.
pub const EXIT_CANCELLED: u8 = 63;

/// Config file unreadable, unparsable, or invalid.
pub const EXIT_CONFIG: u8 = 64;

/// Map a provider error that escaped the client to its exit code.
pub fn provider_exit_code(err: &ProviderError) -> u8 {
    match err {
        ProviderError::Auth(_) => EXIT_AUTH,
        ProviderError::Cancelled => EXIT_CANCELLED,
        ProviderError::Config(_) => EXIT_CONFIG,
        _ => EXIT_IO,
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        e if e.is_schema_error() => EXIT_SCHEMA,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        _ => EXIT_IO,
    }
}
