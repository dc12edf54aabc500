use serde::Serialize;
use std::fs;
use std::io::{self, Write};

fn render<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

/// Write `value` as JSON to `path`, or to stdout when no path is given.
///
/// Failures are reported on stderr; returns false when nothing was written.
pub fn emit<T: Serialize>(value: &T, path: Option<&str>, compact: bool) -> bool {
    let json = match render(value, compact) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: JSON serialization failed: {}", e);
            return false;
        }
    };

    let written = match path {
        Some(path) => fs::write(path, &json)
            .map(|_| log::info!("Wrote {} bytes to {}", json.len(), path))
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => writeln!(io::stdout().lock(), "{}", json)
            .map_err(|e| format!("Failed to write to stdout: {}", e)),
    };

    match written {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}
