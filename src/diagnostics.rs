//! Non-fatal problems collected during a run.
//!
//! Warnings never stop the pipeline. They travel alongside the graph and are
//! rendered inline by every report format.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A non-fatal problem found while parsing, building or enriching.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A manifest could not be parsed; other manifests were still used.
    Parse { path: PathBuf, message: String },

    /// Declared, locked or published data disagree or cannot be compared.
    Integrity {
        package: Option<String>,
        message: String,
    },

    /// A registry or advisory lookup failed for one package.
    Registry { package: String, message: String },

    /// The enrichment deadline passed before every package was checked.
    Timeout { pending: usize, timeout_secs: u64 },

    /// Enrichment was cancelled before every package was checked.
    Cancelled { pending: usize },
}

impl Warning {
    /// Short category label used by text reports.
    pub fn label(&self) -> &'static str {
        match self {
            Warning::Parse { .. } => "parse",
            Warning::Integrity { .. } => "integrity",
            Warning::Registry { .. } => "registry",
            Warning::Timeout { .. } => "timeout",
            Warning::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Parse { path, message } => write!(f, "{}: {}", path.display(), message),
            Warning::Integrity {
                package: Some(package),
                message,
            } => write!(f, "{}: {}", package, message),
            Warning::Integrity { package: None, message } => f.write_str(message),
            Warning::Registry { package, message } => write!(f, "{}: {}", package, message),
            Warning::Timeout { pending, timeout_secs } => write!(
                f,
                "{} package(s) not checked within {}s",
                pending, timeout_secs
            ),
            Warning::Cancelled { pending } => write!(f, "cancelled with {} package(s) unchecked", pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let w = Warning::Parse {
            path: PathBuf::from("a/package.json"),
            message: "bad json".to_string(),
        };
        assert_eq!(w.to_string(), "a/package.json: bad json");

        let w = Warning::Timeout {
            pending: 3,
            timeout_secs: 60,
        };
        assert_eq!(w.to_string(), "3 package(s) not checked within 60s");
        assert_eq!(w.label(), "timeout");
    }

    #[test]
    fn test_serialize_tagged() {
        let w = Warning::Integrity {
            package: Some("npm:a".to_string()),
            message: "outside range".to_string(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "integrity");
        assert_eq!(json["package"], "npm:a");
    }
}
