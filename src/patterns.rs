use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::domain::is_valid_pattern;
use crate::error::{Error, Result};

/// Parses a blocklist/ignore-list body: one pattern per line, `#` starts a
/// trailing comment, blank lines are skipped.
pub fn parse_patterns(content: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let pattern = line.to_ascii_lowercase();
        if !is_valid_pattern(&pattern) {
            warn!(
                action = "parse",
                component = "pattern_list",
                line_number = line_num + 1,
                pattern = %pattern,
                "Suspicious domain pattern kept as-is"
            );
        }
        patterns.push(pattern);
    }
    patterns
}

/// Loads a pattern list fresh from disk. A missing file is an empty list.
pub fn load_patterns(path: &Path) -> Result<Vec<String>> {
    let start_time = Instant::now();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(
                action = "load",
                component = "pattern_list",
                file_path = ?path,
                "Pattern file not found, using empty list"
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    let patterns = parse_patterns(&content);
    info!(
        action = "loaded",
        component = "pattern_list",
        file_path = ?path,
        pattern_count = patterns.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded domain patterns"
    );
    Ok(patterns)
}

/// Appends `pattern` as a new line. Returns `false` when it was already listed.
pub fn append_pattern(path: &Path, pattern: &str) -> Result<bool> {
    let pattern = pattern.trim().to_ascii_lowercase();
    if !is_valid_pattern(&pattern) {
        return Err(Error::InvalidPattern(pattern));
    }

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::io(path, e)),
    };
    if parse_patterns(&existing).contains(&pattern) {
        info!(
            action = "append",
            component = "pattern_list",
            file_path = ?path,
            pattern = %pattern,
            "Pattern already listed"
        );
        return Ok(false);
    }

    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        line.push('\n');
    }
    line.push_str(&pattern);
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| Error::io(path, e))?;

    info!(
        action = "append",
        component = "pattern_list",
        file_path = ?path,
        pattern = %pattern,
        "Pattern added"
    );
    Ok(true)
}
