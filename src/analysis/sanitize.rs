/// Normalizes a filename before it is offered to the upload-URL service.
///
/// The backend's storage layer mangles Unicode punctuation, so dash and
/// quote variants are folded to ASCII first, then anything outside
/// `[A-Za-z0-9._-]` becomes `_`. Runs of the same separator collapse to
/// one and separators are stripped from the ends of the stem. The file
/// extension is preserved verbatim. Deterministic and idempotent;
/// collision handling is the backend's job, not ours.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, extension) = split_extension(name);

    let folded: String = stem.chars().map(fold_punctuation).collect();

    let replaced: String = folded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse runs of the same separator ("__" -> "_", "--" -> "-")
    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if matches!(c, '_' | '-') && collapsed.ends_with(c) {
            continue;
        }
        collapsed.push(c);
    }

    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '-');
    let stem_out = if trimmed.is_empty() { "untitled" } else { trimmed };

    match extension {
        Some(ext) => format!("{}.{}", stem_out, ext),
        None => stem_out.to_string(),
    }
}

/// Splits `name` at the last dot. A dot at position 0 (dotfile) or at the
/// very end is not an extension separator.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            (&name[..idx], Some(&name[idx + 1..]))
        }
        _ => (name, None),
    }
}

/// Folds typographic dashes and quotes to their ASCII equivalents.
fn fold_punctuation(c: char) -> char {
    match c {
        // Hyphen through horizontal bar, plus minus sign
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        // Single quotes and prime
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
        // Double quotes and double prime
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
        _ => c,
    }
}
