use regex::Regex;

use crate::types::{DiffFile, DiffLine, Hunk, LineKind, RowKind, SplitRow};

/// Parse a per-file patch (as returned by the pull request files endpoint)
/// into structured hunks.
///
/// The patch body starts at the first `@@` header. A line that looks like a
/// hunk header but fails to parse is skipped and the running line counters
/// keep their previous values; content lines arriving before the first valid
/// header are dropped.
pub fn parse_patch(patch: &str) -> Vec<Hunk> {
    let header_re = hunk_header_re();
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut old_ln: u32 = 0;
    let mut new_ln: u32 = 0;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if let Some(hunk) = parse_hunk_header(&header_re, line) {
                old_ln = hunk.old_start;
                new_ln = hunk.new_start;
                hunks.push(hunk);
            }
            // Malformed header: counters stay as they were
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            continue;
        };

        if let Some(content) = line.strip_prefix('+') {
            let ln = new_ln;
            new_ln += 1;
            push_line(hunk, LineKind::Add, content, None, Some(ln));
        } else if let Some(content) = line.strip_prefix('-') {
            let ln = old_ln;
            old_ln += 1;
            push_line(hunk, LineKind::Del, content, Some(ln), None);
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else if line.starts_with(' ') || line.is_empty() {
            let content = line.strip_prefix(' ').unwrap_or(line);
            let (o, n) = (old_ln, new_ln);
            old_ln += 1;
            new_ln += 1;
            push_line(hunk, LineKind::Context, content, Some(o), Some(n));
        }
        // Anything else is unrecognized; degrade by skipping it
    }

    hunks
}

fn push_line(hunk: &mut Hunk, kind: LineKind, content: &str, old: Option<u32>, new: Option<u32>) {
    hunk.lines.push(DiffLine {
        kind,
        content: content.to_string(),
        old_ln: old,
        new_ln: new,
    });
}

fn hunk_header_re() -> Regex {
    // @@ -old_start,old_count +new_start,new_count @@ optional context
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
}

fn parse_hunk_header(re: &Regex, line: &str) -> Option<Hunk> {
    let caps = re.captures(line)?;

    let old_start: u32 = caps.get(1)?.as_str().parse().ok()?;
    let old_count: u32 = caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1));
    let new_start: u32 = caps.get(3)?.as_str().parse().ok()?;
    let new_count: u32 = caps.get(4).map_or(1, |m| m.as_str().parse().unwrap_or(1));

    Some(Hunk {
        header: line.to_string(),
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// Derive the two-column row stream for the split diff view.
///
/// Deletions fill only the left half, additions only the right, context both.
/// Hunk rows carry both start numbers. Blank source lines are dropped from
/// the stream; the counters in the parsed hunks already account for them, so
/// numbering stays monotonic across the gap.
pub fn split_rows(hunks: &[Hunk]) -> Vec<SplitRow> {
    let mut rows = Vec::new();

    for hunk in hunks {
        rows.push(SplitRow {
            kind: RowKind::Hunk,
            old_ln: Some(hunk.old_start),
            new_ln: Some(hunk.new_start),
            left: hunk.header.clone(),
            right: hunk.header.clone(),
        });

        for line in &hunk.lines {
            if line.content.is_empty() {
                continue;
            }

            let row = match line.kind {
                LineKind::Del => SplitRow {
                    kind: RowKind::Del,
                    old_ln: line.old_ln,
                    new_ln: None,
                    left: line.content.clone(),
                    right: String::new(),
                },
                LineKind::Add => SplitRow {
                    kind: RowKind::Add,
                    old_ln: None,
                    new_ln: line.new_ln,
                    left: String::new(),
                    right: line.content.clone(),
                },
                LineKind::Context => SplitRow {
                    kind: RowKind::Context,
                    old_ln: line.old_ln,
                    new_ln: line.new_ln,
                    left: line.content.clone(),
                    right: line.content.clone(),
                },
            };
            rows.push(row);
        }
    }

    rows
}

/// Rows for a file's split view.
///
/// `None` when the file carries no usable patch (binary or empty), so the
/// caller renders an explicit "unavailable" placeholder instead of an empty
/// table.
pub fn file_rows(file: &DiffFile) -> Option<Vec<SplitRow>> {
    if !file.has_patch() {
        return None;
    }
    Some(split_rows(&file.hunks))
}
