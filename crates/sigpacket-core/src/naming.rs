//! Packet file names

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

/// Used when a group label sanitizes to nothing
pub const DEFAULT_PACKET_NAME: &str = "Signature Packet";

pub const PACKET_EXTENSION: &str = ".pdf";

lazy_static! {
    /// Characters rejected by at least one common file system
    static ref ILLEGAL_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).unwrap();
}

/// Turn a group label into a safe `.pdf` file name
///
/// Illegal characters are removed rather than replaced, so `Acme/Corp`
/// becomes `AcmeCorp.pdf`.
pub fn sanitize_file_name(label: &str) -> String {
    let stripped = ILLEGAL_CHARS.replace_all(label, "");
    let trimmed = stripped.trim_matches(|c: char| c == '.' || c.is_whitespace());

    let stem = if trimmed.is_empty() {
        DEFAULT_PACKET_NAME
    } else {
        trimmed
    };

    if has_pdf_extension(stem) {
        stem.to_string()
    } else {
        format!("{}{}", stem, PACKET_EXTENSION)
    }
}

fn has_pdf_extension(name: &str) -> bool {
    name.len() > PACKET_EXTENSION.len()
        && name
            .get(name.len() - PACKET_EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKET_EXTENSION))
}

/// Sanitized names for each label, made unique in order
///
/// The first label to claim a name keeps it; later ones get ` (2)`, ` (3)`, …
/// before the extension. Comparison ignores case so the names stay distinct
/// on case-insensitive file systems.
pub fn unique_file_names<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::new();

    for label in labels {
        let base = sanitize_file_name(label);
        let stem = &base[..base.len() - PACKET_EXTENSION.len()];
        let extension = &base[base.len() - PACKET_EXTENSION.len()..];

        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate.to_lowercase()) {
            candidate = format!("{} ({}){}", stem, n, extension);
            n += 1;
        }

        taken.insert(candidate.to_lowercase());
        names.push(candidate);
    }
    names
}
