/// Map an id onto a portable file stem.
///
/// ASCII alphanumerics, `-`, `_` and `.` are kept; every other character
/// becomes `_`. A blank id maps to `unknown`.
pub fn safe_filename(id: &str) -> String {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name of an object: `<safe id>.json`.
pub fn object_file_name(id: &str) -> String {
    format!("{}.json", safe_filename(id))
}
