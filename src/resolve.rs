//! Matching user input against a folder's file listing.

use std::collections::HashMap;

use crate::models::FileEntry;
use crate::tree::numbered;

/// Outcome of resolving a selection against a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub matched: Vec<FileEntry>,
    pub not_found: Vec<String>,
}

/// Entries whose name contains `needle`, ignoring case, in listing order.
/// A blank needle keeps everything.
pub fn filter_by_substring<'a>(files: &'a [FileEntry], needle: &str) -> Vec<&'a FileEntry> {
    let needle = needle.trim().to_lowercase();
    files
        .iter()
        .filter(|f| needle.is_empty() || f.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn parse_name_tokens(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Name without its last extension. A leading dot does not start an
/// extension, so `.env` stays `.env`.
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Resolve comma-separated names: exact name first, then base name, both
/// case-insensitive. Every token maps to at most one file, the first in
/// listing order.
pub fn resolve_names(csv: &str, files: &[FileEntry]) -> Resolution {
    let mut resolution = Resolution::default();
    for token in parse_name_tokens(csv) {
        let key = token.to_lowercase();
        let found = files
            .iter()
            .find(|f| f.name.to_lowercase() == key)
            .or_else(|| {
                files
                    .iter()
                    .find(|f| base_name(&f.name).to_lowercase() == key)
            });
        match found {
            Some(file) => resolution.matched.push(file.clone()),
            None => resolution.not_found.push(token),
        }
    }
    resolution
}

/// Files picked in the browse list, in the order they were picked.
pub fn select_by_ids(ids: &[String], files: &[FileEntry]) -> Resolution {
    let mut resolution = Resolution::default();
    for id in ids {
        match files.iter().find(|f| &f.id == id) {
            Some(file) => resolution.matched.push(file.clone()),
            None => resolution.not_found.push(id.clone()),
        }
    }
    resolution
}

/// Unique labels for the browse list; the second `photo.jpg` shows as
/// `photo.jpg (2)`.
pub fn browse_labels(files: &[FileEntry]) -> Vec<(String, &FileEntry)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    files
        .iter()
        .map(|f| {
            let count = seen.entry(f.name.as_str()).or_insert(0);
            *count += 1;
            (numbered(&f.name, *count), f)
        })
        .collect()
}
