use crate::proposal::Proposal;

pub const DEFAULT_PREVIEW_LINES: usize = 300;

/// Renders a unified-diff-like preview of the write/edit proposals.
///
/// The emitted-line counter is checked before each unit of output and the
/// preview stops once it has gone past `max_lines`, so a block may end a
/// line or two over the limit. The result carries a truncation marker in
/// that case and is trimmed of surrounding blank lines.
pub fn preview(proposals: &[Proposal], max_lines: usize) -> String {
    let mut out = Preview {
        lines: Vec::new(),
        emitted: 0,
        max_lines,
        truncated: false,
    };

    for proposal in proposals {
        if out.past_limit() {
            break;
        }
        let Some(content) = proposal.content() else {
            continue;
        };
        let target = proposal.target().unwrap_or("file");
        out.push_file(target, content.old, content.new);
    }

    let mut result = out.lines.join("\n");
    if out.truncated {
        result.push_str(&format!("\n[... diff truncated at {max_lines} lines ...]"));
    }
    result.trim().to_string()
}

struct Preview {
    lines: Vec<String>,
    emitted: usize,
    max_lines: usize,
    truncated: bool,
}

impl Preview {
    fn past_limit(&mut self) -> bool {
        if self.emitted > self.max_lines {
            self.truncated = true;
        }
        self.truncated
    }

    fn emit(&mut self, line: String) {
        self.lines.push(line);
        self.emitted += 1;
    }

    fn push_file(&mut self, target: &str, old: &str, new: &str) {
        self.emit(format!("--- a/{target}"));
        self.emit(format!("+++ b/{target}"));

        let old_lines = split_lines(old);
        let new_lines = split_lines(new);

        for (before, after) in old_lines.iter().zip(&new_lines) {
            if self.past_limit() {
                return self.close_block();
            }
            if before != after {
                self.emit(format!("- {before}"));
                self.emit(format!("+ {after}"));
            }
        }

        let common = old_lines.len().min(new_lines.len());
        for line in &new_lines[common..] {
            if self.past_limit() {
                return self.close_block();
            }
            self.emit(format!("+ {line}"));
        }
        for line in &old_lines[common..] {
            if self.past_limit() {
                return self.close_block();
            }
            self.emit(format!("- {line}"));
        }

        self.close_block();
    }

    /// Blank separator; not counted against the limit.
    fn close_block(&mut self) {
        self.lines.push(String::new());
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_proposal_list_renders_nothing() {
        assert_eq!(preview(&[], DEFAULT_PREVIEW_LINES), "");
    }

    #[test]
    fn non_content_actions_are_skipped() {
        let proposals = vec![
            Proposal::new("delete", "gone.rs").with_content("a", "b"),
            Proposal::new("create", "new.rs"),
            Proposal::new("write", "bare.rs"),
        ];
        assert_eq!(preview(&proposals, DEFAULT_PREVIEW_LINES), "");
    }

    #[test]
    fn changed_pairs_and_tail_additions() {
        let proposals = vec![Proposal::new("edit", "src/main.rs").with_content("a\nb", "a\nc\nd")];
        assert_eq!(
            preview(&proposals, DEFAULT_PREVIEW_LINES),
            "--- a/src/main.rs\n+++ b/src/main.rs\n- b\n+ c\n+ d"
        );
    }

    #[test]
    fn tail_removals_when_old_is_longer() {
        let proposals = vec![Proposal::new("write", "x.txt").with_content("1\n2\n3", "1")];
        assert_eq!(
            preview(&proposals, DEFAULT_PREVIEW_LINES),
            "--- a/x.txt\n+++ b/x.txt\n- 2\n- 3"
        );
    }

    #[test]
    fn identical_content_has_headers_but_no_body() {
        let proposals = vec![Proposal::new("edit", "same.rs").with_content("x\ny", "x\ny")];
        let rendered = preview(&proposals, DEFAULT_PREVIEW_LINES);
        assert!(rendered
            .lines()
            .skip(2)
            .all(|line| !line.starts_with("+ ") && !line.starts_with("- ")));
    }

    #[test]
    fn missing_target_uses_placeholder_and_blocks_are_separated() {
        let mut unnamed = Proposal::new("write", "").with_content("", "new");
        unnamed.target = None;
        let proposals = vec![unnamed, Proposal::new("write", "b.rs").with_content("", "x")];
        assert_eq!(
            preview(&proposals, DEFAULT_PREVIEW_LINES),
            "--- a/file\n+++ b/file\n+ new\n\n--- a/b.rs\n+++ b/b.rs\n+ x"
        );
    }

    #[test]
    fn truncation_stops_after_exceeding_limit() {
        let new: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        let proposals = vec![Proposal::new("write", "big.txt").with_content("", &new.join("\n"))];

        let rendered = preview(&proposals, 5);
        let lines: Vec<&str> = rendered.lines().collect();

        // Two header lines, then additions until the counter passes 5.
        assert_eq!(
            lines,
            vec![
                "--- a/big.txt",
                "+++ b/big.txt",
                "+ line 0",
                "+ line 1",
                "+ line 2",
                "+ line 3",
                "",
                "[... diff truncated at 5 lines ...]",
            ]
        );
    }

    #[test]
    fn later_files_are_dropped_once_past_limit() {
        let proposals = vec![
            Proposal::new("edit", "a.rs").with_content("1\n2", "3\n4"),
            Proposal::new("edit", "b.rs").with_content("1", "2"),
        ];
        let rendered = preview(&proposals, 5);
        assert!(!rendered.contains("b.rs"));
        assert!(rendered.ends_with("[... diff truncated at 5 lines ...]"));
    }
}
