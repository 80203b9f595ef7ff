//! Rendering file edits as a git-style unified diff.

use similar::TextDiff;

use crate::core::trace::FileEdit;

const CONTEXT_LINES: usize = 3;

/// Render `edits` as one patch. Unchanged files are omitted; no edits yields "".
pub fn render_patch(edits: &[FileEdit]) -> String {
    let mut patch = String::new();
    for edit in edits.iter().filter(|edit| edit.original != edit.updated) {
        let old_header = format!("a/{}", edit.path);
        let new_header = format!("b/{}", edit.path);
        patch.push_str(&format!("diff --git {old_header} {new_header}\n"));

        let diff = TextDiff::from_lines(&edit.original, &edit.updated);
        let body = diff
            .unified_diff()
            .context_radius(CONTEXT_LINES)
            .header(&old_header, &new_header)
            .to_string();
        patch.push_str(&body);
        if !body.ends_with('\n') {
            patch.push('\n');
        }
    }
    patch
}
