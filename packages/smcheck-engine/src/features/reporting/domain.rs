//! Diagnostics produced for the host

use crate::shared::models::Location;
use serde::Serialize;
use std::fmt;

/// One step of a witness path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub location: Location,
    pub message: String,
}

impl Note {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

/// A reachable error with its witness trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// State machine that flagged the error
    pub machine: String,
    /// Function containing the error
    pub function: Option<String>,
    pub location: Option<Location>,
    pub message: String,
    /// Weakness classifier, e.g. "CWE-415"
    pub cwe: Option<String>,
    pub notes: Vec<Note>,
}

impl Report {
    /// The `error:` line alone
    pub fn headline(&self) -> String {
        let cwe = self
            .cwe
            .as_ref()
            .map(|cwe| format!(" [{}]", cwe))
            .unwrap_or_default();
        match &self.location {
            Some(location) => format!("{}: error: {}{}", location, self.message, cwe),
            None => format!("error: {}{}", self.message, cwe),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline())?;
        for note in &self.notes {
            writeln!(f, "{}: note: {}", note.location, note.message)?;
        }
        Ok(())
    }
}

/// GCC-style rendering, with an "In function" header whenever the
/// enclosing function changes
pub fn render_reports(reports: &[Report]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for report in reports {
        let function = report.function.as_deref();
        if function != current {
            if let (Some(name), Some(location)) = (function, &report.location) {
                out.push_str(&format!("{}: In function '{}':\n", location.file, name));
            }
            current = function;
        }
        out.push_str(&report.to_string());
    }
    out
}
