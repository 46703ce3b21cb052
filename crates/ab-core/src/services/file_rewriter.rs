use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{OrchestratorError, Result};
use crate::models::Assignments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Lines whose bytes actually changed.
    pub changed_lines: usize,
}

/// Replace the value of the first assignment line for every key in `path`.
///
/// The file is only written once every key has been located, and the write
/// goes through a sibling temp file that is renamed over the original.
pub async fn rewrite(path: &Path, assignments: &Assignments) -> Result<RewriteSummary> {
    let content = tokio::fs::read_to_string(path).await?;
    let (updated, summary) = apply_assignments(&content, assignments)
        .map_err(|e| with_path(e, path))?;

    if summary.changed_lines > 0 {
        write_atomically(path, &updated).await?;
    }
    tracing::debug!(
        path = %path.display(),
        changed_lines = summary.changed_lines,
        "rewrote assignments"
    );
    Ok(summary)
}

/// Pure core of [`rewrite`]: returns the new content without touching disk.
pub fn apply_assignments(
    content: &str,
    assignments: &Assignments,
) -> Result<(String, RewriteSummary)> {
    let mut lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut replaced: Vec<Option<String>> = vec![None; lines.len()];

    for (key, value) in assignments.iter() {
        if value.contains(['\n', '\r']) {
            return Err(invalid_value(key, "spans multiple lines"));
        }
        let pattern = assignment_pattern(key)?;
        let hit = lines.iter().copied().enumerate().find_map(|(index, line)| {
            let (body, ending) = split_line_ending(line);
            pattern.captures(body).map(|caps| (index, caps, ending))
        });
        match hit {
            Some((index, caps, ending)) => {
                replaced[index] = Some(replace_value(&caps, key, value, ending)?)
            }
            None => {
                return Err(OrchestratorError::KeyNotFound {
                    key: key.to_string(),
                    path: PathBuf::new(),
                })
            }
        }
    }

    let mut changed_lines = 0;
    for (line, new_line) in lines.iter_mut().zip(replaced.iter()) {
        if let Some(new_line) = new_line {
            if new_line.as_str() != *line {
                changed_lines += 1;
            }
            *line = new_line.as_str();
        }
    }
    Ok((lines.concat(), RewriteSummary { changed_lines }))
}

fn assignment_pattern(key: &str) -> Result<Regex> {
    let source = format!(
        r"^(?P<lead>[ \t]*(?:export[ \t]+)?){}(?P<sep>[ \t]*[=:][ \t]*)(?P<rest>.*)$",
        regex::escape(key)
    );
    Regex::new(&source).map_err(|e| OrchestratorError::Config(format!("bad key '{key}': {e}")))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let without_lf = line.strip_suffix('\n').unwrap_or(line);
    let body = without_lf.strip_suffix('\r').unwrap_or(without_lf);
    (body, &line[body.len()..])
}

/// Rebuild an assignment line around a new value, keeping quotes and a
/// trailing `# comment` from the old one.
fn replace_value(
    caps: &regex::Captures<'_>,
    key: &str,
    value: &str,
    ending: &str,
) -> Result<String> {
    let lead = &caps["lead"];
    let sep = &caps["sep"];
    let rest = &caps["rest"];

    let new_rest = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => match rest[1..].find(quote) {
            Some(_) if value.contains(quote) => {
                return Err(invalid_value(key, &format!("contains its enclosing {quote} quote")))
            }
            Some(close) => format!("{quote}{value}{quote}{}", &rest[close + 2..]),
            None => value.to_string(),
        },
        _ => match trailing_comment(rest) {
            Some(at) => format!("{value}{}", &rest[at..]),
            None => value.to_string(),
        },
    };
    // YAML needs a space after a bare colon.
    let pad = if sep == ":" && rest.is_empty() && !value.is_empty() {
        " "
    } else {
        ""
    };
    Ok(format!("{lead}{key}{sep}{pad}{new_rest}{ending}"))
}

fn invalid_value(key: &str, problem: &str) -> OrchestratorError {
    OrchestratorError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("value for '{key}' {problem}"),
    ))
}

/// Byte offset of the whitespace that introduces an inline comment.
fn trailing_comment(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    (1..bytes.len())
        .find(|&i| bytes[i] == b'#' && matches!(bytes[i - 1], b' ' | b'\t'))
        .map(|i| {
            rest[..i]
                .trim_end_matches([' ', '\t'])
                .len()
        })
}

async fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.artifact-bump.tmp"));

    let permissions = tokio::fs::metadata(path).await?.permissions();
    let written = async {
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::set_permissions(&temp_path, permissions).await?;
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

fn with_path(err: OrchestratorError, path: &Path) -> OrchestratorError {
    match err {
        OrchestratorError::KeyNotFound { key, .. } => OrchestratorError::KeyNotFound {
            key,
            path: path.to_path_buf(),
        },
        other => other,
    }
}
