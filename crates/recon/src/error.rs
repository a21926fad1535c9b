use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, empty keyword, etc.).
    ConfigValidation(String),
    /// No ledger header matches any accepted synonym for a required field.
    MissingColumn { field: &'static str, accepted: Vec<String> },
    /// First ledger row has a blank order label, so there is nothing to forward-fill from.
    MissingAnchor { column: String },
    /// IO error (file read, CSV framing, etc.).
    Io(String),
}

impl ReconError {
    /// Ledger shape problems. Surfaced before any network activity.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::MissingColumn { .. } | Self::MissingAnchor { .. })
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { field, accepted } => {
                write!(
                    f,
                    "ledger has no {field} column (accepted headers: {})",
                    accepted.join(", ")
                )
            }
            Self::MissingAnchor { column } => {
                write!(f, "first ledger row has an empty '{column}' value")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
