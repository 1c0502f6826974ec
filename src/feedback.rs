//! Normalization of bot feedback fetched from the review endpoints.
//!
//! Reviews, review comments, and issue comments come back with three
//! different shapes; `RawEntry` is the lenient union of all of them and
//! `normalize` maps it onto one uniform record. Missing fields become
//! sentinels, never errors.

use serde::Deserialize;

/// Where a feedback entry came from. Assigned once at normalization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Review,
    ReviewComment,
    IssueComment,
}

impl FeedbackKind {
    pub fn label(&self) -> &'static str {
        match self {
            FeedbackKind::Review => "Review",
            FeedbackKind::ReviewComment => "Diff comment",
            FeedbackKind::IssueComment => "Issue comment",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    pub login: Option<String>,
}

/// Lenient union of the review / review-comment / issue-comment wire shapes.
/// Every field the three endpoints disagree on is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: u64,
    pub user: Option<RawUser>,
    pub body: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub submitted_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub path: Option<String>,
    pub original_line: Option<u32>,
    pub line: Option<u32>,
    pub position: Option<u32>,
    pub diff_hunk: Option<String>,
    pub html_url: Option<String>,
    pub state: Option<String>,
}

/// One normalized feedback entry, uniform across all three sources
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    pub id: u64,
    pub kind: FeedbackKind,
    pub author: String,
    pub body: String,
    pub body_html: Option<String>,
    /// RFC3339; empty string when the source carried no usable timestamp
    pub timestamp: String,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub diff_hunk: Option<String>,
    pub html_url: Option<String>,
    pub state: Option<String>,
}

/// Map a raw API entry onto the uniform shape.
///
/// Fallbacks: author -> "unknown"; body -> body_text -> "";
/// timestamp submitted_at -> created_at -> updated_at;
/// line original_line -> line -> position.
pub fn normalize(entry: RawEntry, kind: FeedbackKind) -> FeedbackEntry {
    let author = entry
        .user
        .and_then(|u| u.login)
        .unwrap_or_else(|| "unknown".to_string());

    let body = entry.body.or(entry.body_text).unwrap_or_default();

    let timestamp = entry
        .submitted_at
        .or(entry.created_at)
        .or(entry.updated_at)
        .unwrap_or_default();

    let line = entry.original_line.or(entry.line).or(entry.position);

    FeedbackEntry {
        id: entry.id,
        kind,
        author,
        body,
        body_html: entry.body_html,
        timestamp,
        path: entry.path,
        line,
        diff_hunk: entry.diff_hunk,
        html_url: entry.html_url,
        state: entry.state,
    }
}

/// Best-effort check whether an entry belongs to the configured bot.
///
/// Case-insensitive substring match of the identity token against the author
/// handle or the body text. A heuristic, not authentication.
pub fn is_attributable(entry: &RawEntry, needle: &str) -> bool {
    let needle = needle.to_lowercase();

    let author = entry
        .user
        .as_ref()
        .and_then(|u| u.login.as_deref())
        .unwrap_or("")
        .to_lowercase();

    let body = entry
        .body
        .as_deref()
        .or(entry.body_text.as_deref())
        .unwrap_or("")
        .to_lowercase();

    author.contains(&needle) || body.contains(&needle)
}

/// Normalize a fetched batch, keeping only entries attributable to the bot
pub fn normalize_batch(entries: Vec<RawEntry>, kind: FeedbackKind, needle: &str) -> Vec<FeedbackEntry> {
    entries
        .into_iter()
        .filter(|e| is_attributable(e, needle))
        .map(|e| normalize(e, kind))
        .collect()
}

/// Merge the three normalized batches into one list, newest first.
/// RFC3339 UTC timestamps sort lexicographically; the id breaks ties so the
/// order is stable across refreshes.
pub fn merge_feedback(
    reviews: Vec<FeedbackEntry>,
    review_comments: Vec<FeedbackEntry>,
    issue_comments: Vec<FeedbackEntry>,
) -> Vec<FeedbackEntry> {
    let mut merged = reviews;
    merged.extend(review_comments);
    merged.extend(issue_comments);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    merged
}

/// High-water mark used to detect fresh feedback after a trigger comment
pub fn latest_timestamp(entries: &[FeedbackEntry]) -> Option<&str> {
    entries
        .iter()
        .map(|e| e.timestamp.as_str())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(author: Option<&str>, body: Option<&str>) -> RawEntry {
        RawEntry {
            user: author.map(|a| RawUser {
                login: Some(a.to_string()),
            }),
            body: body.map(|b| b.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_empty_entry_uses_sentinels() {
        let entry = normalize(RawEntry::default(), FeedbackKind::Review);
        assert_eq!(entry.author, "unknown");
        assert_eq!(entry.body, "");
        assert_eq!(entry.timestamp, "");
        assert_eq!(entry.line, None);
        assert_eq!(entry.path, None);
    }

    #[test]
    fn test_normalize_kind_assigned_once() {
        let entry = normalize(RawEntry::default(), FeedbackKind::IssueComment);
        assert_eq!(entry.kind, FeedbackKind::IssueComment);
    }

    #[test]
    fn test_normalize_body_text_fallback() {
        let raw = RawEntry {
            body_text: Some("plain".to_string()),
            ..Default::default()
        };
        let entry = normalize(raw, FeedbackKind::ReviewComment);
        assert_eq!(entry.body, "plain");
    }

    #[test]
    fn test_normalize_timestamp_fallback_order() {
        let raw = RawEntry {
            submitted_at: Some("2024-03-01T00:00:00Z".to_string()),
            created_at: Some("2024-02-01T00:00:00Z".to_string()),
            updated_at: Some("2024-04-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let entry = normalize(raw, FeedbackKind::Review);
        assert_eq!(entry.timestamp, "2024-03-01T00:00:00Z");

        let raw = RawEntry {
            created_at: Some("2024-02-01T00:00:00Z".to_string()),
            updated_at: Some("2024-04-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let entry = normalize(raw, FeedbackKind::Review);
        assert_eq!(entry.timestamp, "2024-02-01T00:00:00Z");

        let raw = RawEntry {
            updated_at: Some("2024-04-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let entry = normalize(raw, FeedbackKind::Review);
        assert_eq!(entry.timestamp, "2024-04-01T00:00:00Z");
    }

    #[test]
    fn test_normalize_line_fallback_order() {
        let raw = RawEntry {
            original_line: Some(10),
            line: Some(20),
            position: Some(30),
            ..Default::default()
        };
        assert_eq!(normalize(raw, FeedbackKind::ReviewComment).line, Some(10));

        let raw = RawEntry {
            line: Some(20),
            position: Some(30),
            ..Default::default()
        };
        assert_eq!(normalize(raw, FeedbackKind::ReviewComment).line, Some(20));

        let raw = RawEntry {
            position: Some(30),
            ..Default::default()
        };
        assert_eq!(normalize(raw, FeedbackKind::ReviewComment).line, Some(30));
    }

    #[test]
    fn test_attributable_by_author() {
        let entry = entry_with(Some("qodo-bot"), None);
        assert!(is_attributable(&entry, "qodo"));
    }

    #[test]
    fn test_attributable_by_body() {
        let entry = entry_with(Some("someone-else"), Some("see the Qodo review above"));
        assert!(is_attributable(&entry, "qodo"));
    }

    #[test]
    fn test_not_attributable() {
        let entry = entry_with(Some("human"), Some("looks good to me"));
        assert!(!is_attributable(&entry, "qodo"));
    }

    #[test]
    fn test_attributable_case_insensitive() {
        let entry = entry_with(Some("QoDo-Merge[bot]"), None);
        assert!(is_attributable(&entry, "qodo"));
    }

    #[test]
    fn test_normalize_batch_filters_and_maps() {
        let entries = vec![
            entry_with(Some("qodo-bot"), Some("first")),
            entry_with(Some("human"), Some("second")),
            entry_with(Some("reviewer"), Some("a qodo suggestion")),
        ];
        let batch = normalize_batch(entries, FeedbackKind::IssueComment, "qodo");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].author, "qodo-bot");
        assert_eq!(batch[1].author, "reviewer");
    }

    #[test]
    fn test_merge_feedback_newest_first() {
        let mk = |ts: &str| FeedbackEntry {
            id: 0,
            kind: FeedbackKind::Review,
            author: "qodo-bot".to_string(),
            body: String::new(),
            body_html: None,
            timestamp: ts.to_string(),
            path: None,
            line: None,
            diff_hunk: None,
            html_url: None,
            state: None,
        };

        let merged = merge_feedback(
            vec![mk("2024-01-02T00:00:00Z")],
            vec![mk("2024-01-03T00:00:00Z")],
            vec![mk("2024-01-01T00:00:00Z")],
        );

        let stamps: Vec<&str> = merged.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec![
                "2024-01-03T00:00:00Z",
                "2024-01-02T00:00:00Z",
                "2024-01-01T00:00:00Z"
            ]
        );
    }

    #[test]
    fn test_latest_timestamp() {
        let mk = |ts: &str| FeedbackEntry {
            id: 0,
            kind: FeedbackKind::Review,
            author: String::new(),
            body: String::new(),
            body_html: None,
            timestamp: ts.to_string(),
            path: None,
            line: None,
            diff_hunk: None,
            html_url: None,
            state: None,
        };

        assert_eq!(latest_timestamp(&[]), None);
        let entries = vec![mk("2024-01-01T00:00:00Z"), mk("2024-01-05T00:00:00Z")];
        assert_eq!(latest_timestamp(&entries), Some("2024-01-05T00:00:00Z"));
    }
}
