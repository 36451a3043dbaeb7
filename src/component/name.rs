//! Human-readable type and source-location names for diagnostics.

use std::panic::Location;

/// Shorten a fully-qualified type name to its last two path segments,
/// e.g. `alloc::string::String` becomes `string::String`. Generic arguments
/// are kept as-is.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    shorten(std::any::type_name::<T>())
}

pub(crate) fn shorten(full: &'static str) -> &'static str {
    let head_end = full.find('<').unwrap_or(full.len());
    let head = &full[..head_end];
    let separators: Vec<usize> = head.match_indices("::").map(|(i, _)| i).collect();
    if separators.len() < 2 {
        return full;
    }
    let cut = separators[separators.len() - 2] + 2;
    &full[cut..]
}

/// Format a source location as `lastdir/file.rs:line`.
pub fn short_location(location: &Location<'_>) -> String {
    format!("{}:{}", short_file(location.file()), location.line())
}

/// Trim a file path to its last directory and file name.
pub fn short_file(file: &str) -> String {
    let mut parts = file.rsplit(['/', '\\']);
    let file_name = parts.next().unwrap_or(file);
    match parts.next() {
        Some(dir) => format!("{}/{}", dir, file_name),
        None => file_name.to_string(),
    }
}
