//! Parsing helpers for command-line evidence.

use anyhow::{bail, Result};
use sedbn_core::Evidence;

/// Parses a `VAR=STATE` argument.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((var, state)) if !var.trim().is_empty() && !state.trim().is_empty() => {
            Ok((var.trim().to_string(), state.trim().to_string()))
        }
        _ => Err(format!("expected VAR=STATE, got '{}'", s)),
    }
}

/// Collects `-e` assignments into evidence. A variable may be observed once.
pub fn evidence_from_assignments(assignments: Vec<(String, String)>) -> Result<Evidence> {
    let mut evidence = Evidence::new();
    for (variable, state) in assignments {
        if let Some(previous) = evidence.get(&variable) {
            bail!(
                "variable '{}' is observed more than once ('{}' and '{}')",
                variable,
                previous,
                state
            );
        }
        evidence.insert(variable, state);
    }
    Ok(evidence)
}
