use std::collections::HashMap;

use paperwatch_core::PaperIdentifier;

use crate::links::extract::extract_links;

/// Replace every link in `content` whose identifier has a replacement.
///
/// Links are located afresh in `content`, so offsets from an earlier read do
/// not matter. Returns `None` when nothing was substituted so the caller can
/// skip the write entirely.
pub fn rewrite_content(
    content: &str,
    replacements: &HashMap<PaperIdentifier, String>,
) -> Option<String> {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    let mut changed = false;

    for occurrence in extract_links(content) {
        let Some(citation) = replacements.get(&occurrence.id) else {
            continue;
        };
        out.push_str(&content[cursor..occurrence.span.start]);
        out.push_str(citation);
        cursor = occurrence.span.end;
        changed = true;
    }

    if !changed {
        return None;
    }
    out.push_str(&content[cursor..]);
    Some(out)
}
