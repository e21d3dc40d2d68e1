// Report file naming
//
// `<repositories>-<timestamp>-stats.xlsx`, where repositories are joined
// with '_' and the timestamp has second resolution, e.g.
// `libs-release_npm-remote-2024Oct16T165842-stats.xlsx`.

use std::path::{Path, PathBuf};

use anyhow::bail;
use chrono::NaiveDateTime;

const TIMESTAMP_FORMAT: &str = "%Y%b%dT%H%M%S";

/// Longest repository label in bytes; keeps the full name well under NAME_MAX.
const MAX_LABEL_LEN: usize = 100;

/// Builds the report file name for `repositories` at local time `at`.
///
/// Blank and repeated names are skipped, as in the query. Characters that
/// are not safe in a file name are replaced with '-'. Names past the label
/// limit are counted in an `_and-<n>-more` suffix instead.
pub fn report_file_name<S: AsRef<str>>(repositories: &[S], at: NaiveDateTime) -> String {
    let mut parts: Vec<String> = Vec::new();
    for name in repositories {
        let name = sanitize(name.as_ref().trim());
        if !name.is_empty() && !parts.contains(&name) {
            parts.push(name);
        }
    }

    format!("{}-{}-stats.xlsx", label(&parts), at.format(TIMESTAMP_FORMAT))
}

/// Resolves the report path in `dir` and checks it can be created.
///
/// Runs before any fetching so a bad output location fails fast.
pub fn report_path<S: AsRef<str>>(
    dir: &Path,
    repositories: &[S],
    at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    if !dir.is_dir() {
        bail!("Output directory '{}' does not exist", dir.display());
    }

    let path = dir.join(report_file_name(repositories, at));
    if path.exists() {
        bail!("Report file '{}' already exists", path.display());
    }
    Ok(path)
}

fn label(parts: &[String]) -> String {
    let Some(first) = parts.first() else {
        return "artifacts".to_string();
    };

    let mut label = truncate(first, MAX_LABEL_LEN).to_string();
    let mut used = 1;
    for part in &parts[1..] {
        if label.len() + 1 + part.len() > MAX_LABEL_LEN {
            break;
        }
        label.push('_');
        label.push_str(part);
        used += 1;
    }

    if used < parts.len() {
        label.push_str(&format!("_and-{}-more", parts.len() - used));
    }
    label
}

/// Longest prefix of `s` within `max` bytes, cut on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= max)
        .last()
        .unwrap_or(0);
    &s[..end]
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}
