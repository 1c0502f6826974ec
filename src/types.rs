/// Represents the status of a changed file in a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Renamed,
}

impl FileStatus {
    /// Map the status string used by the GitHub files API
    pub fn from_api(status: &str) -> Self {
        match status {
            "added" => FileStatus::Added,
            "removed" => FileStatus::Removed,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Modified,
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            FileStatus::Added => "[A]",
            FileStatus::Removed => "[D]",
            FileStatus::Modified => "[M]",
            FileStatus::Renamed => "[R]",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Added => "Added",
            FileStatus::Removed => "Removed",
            FileStatus::Modified => "Modified",
            FileStatus::Renamed => "Renamed",
        }
    }

    pub fn color(&self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            FileStatus::Added => Color::Green,
            FileStatus::Removed => Color::Red,
            FileStatus::Modified => Color::Yellow,
            FileStatus::Renamed => Color::Cyan,
        }
    }
}

/// Type of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Del,
}

/// A single line in a parsed patch
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    pub old_ln: Option<u32>,
    pub new_ln: Option<u32>,
}

/// A hunk in a patch (a contiguous block of changes)
#[derive(Debug, Clone)]
pub struct Hunk {
    pub header: String,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

/// Kind of a rendered split-view row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Context,
    Add,
    Del,
    Hunk,
}

/// One rendered row of the two-column diff view.
///
/// `old_ln` is populated for context/del/hunk rows, `new_ln` for
/// context/add/hunk rows. Derived per render, never persisted.
#[derive(Debug, Clone)]
pub struct SplitRow {
    pub kind: RowKind,
    pub old_ln: Option<u32>,
    pub new_ln: Option<u32>,
    pub left: String,
    pub right: String,
}

/// A changed file in a pull request
#[derive(Debug, Clone)]
pub struct DiffFile {
    pub path: String,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
    /// Raw per-file patch text; absent for binary files
    pub patch: Option<String>,
    pub blob_url: Option<String>,
    /// Parsed once when the file list arrives
    pub hunks: Vec<Hunk>,
}

impl DiffFile {
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn has_patch(&self) -> bool {
        self.patch
            .as_ref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn line_count(&self) -> usize {
        self.hunks.iter().map(|h| h.lines.len()).sum()
    }
}

/// Lifecycle state of a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Merged PRs report state "closed" with a merge timestamp set
    pub fn from_api(state: &str, merged_at: Option<&str>) -> Self {
        if merged_at.is_some() {
            PrState::Merged
        } else if state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        }
    }

    pub fn color(&self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            PrState::Open => Color::Green,
            PrState::Closed => Color::Red,
            PrState::Merged => Color::Magenta,
        }
    }
}

/// A pull request snapshot from the list endpoint
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub author: String,
    pub state: PrState,
    pub created_at: String,
    pub updated_at: String,
    pub comments: u32,
    pub html_url: String,
}

impl PullRequest {
    /// Format the age of the PR (e.g., "2d", "3h", "5m")
    pub fn age(&self) -> String {
        use std::time::SystemTime;

        let updated = chrono::DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|dt| dt.timestamp())
            .unwrap_or(0);

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let diff_secs = now - updated;

        if diff_secs < 3600 {
            format!("{}m", diff_secs / 60)
        } else if diff_secs < 86400 {
            format!("{}h", diff_secs / 3600)
        } else {
            format!("{}d", diff_secs / 86400)
        }
    }

    /// True if the PR matches a search needle against title or "#number"
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle) || format!("#{}", self.number).contains(&needle)
    }
}

/// A GitHub repository reference
#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
}

impl RepoInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_from_api() {
        assert_eq!(FileStatus::from_api("added"), FileStatus::Added);
        assert_eq!(FileStatus::from_api("removed"), FileStatus::Removed);
        assert_eq!(FileStatus::from_api("renamed"), FileStatus::Renamed);
        assert_eq!(FileStatus::from_api("modified"), FileStatus::Modified);
        // Unknown statuses fall back to modified
        assert_eq!(FileStatus::from_api("changed"), FileStatus::Modified);
    }

    #[test]
    fn test_pr_state_from_api() {
        assert_eq!(PrState::from_api("open", None), PrState::Open);
        assert_eq!(PrState::from_api("closed", None), PrState::Closed);
        assert_eq!(
            PrState::from_api("closed", Some("2024-03-01T00:00:00Z")),
            PrState::Merged
        );
        // merged_at wins even if the state string looks open
        assert_eq!(
            PrState::from_api("open", Some("2024-03-01T00:00:00Z")),
            PrState::Merged
        );
    }

    #[test]
    fn test_diff_file_filename() {
        let file = DiffFile {
            path: "src/deep/nested/main.rs".to_string(),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 0,
            patch: None,
            blob_url: None,
            hunks: Vec::new(),
        };
        assert_eq!(file.filename(), "main.rs");
    }

    #[test]
    fn test_diff_file_has_patch() {
        let mut file = DiffFile {
            path: "a.txt".to_string(),
            status: FileStatus::Modified,
            additions: 0,
            deletions: 0,
            patch: None,
            blob_url: None,
            hunks: Vec::new(),
        };
        assert!(!file.has_patch());

        file.patch = Some("   \n".to_string());
        assert!(!file.has_patch());

        file.patch = Some("@@ -1 +1 @@\n-a\n+b".to_string());
        assert!(file.has_patch());
    }

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 42,
            title: "Fix threshold comparison".to_string(),
            author: "octocat".to_string(),
            state: PrState::Open,
            created_at: "2024-01-15T10:00:00Z".to_string(),
            updated_at: "2024-01-16T10:00:00Z".to_string(),
            comments: 3,
            html_url: "https://github.com/owner/repo/pull/42".to_string(),
        }
    }

    #[test]
    fn test_pr_matches_title() {
        let pr = sample_pr();
        assert!(pr.matches("threshold"));
        assert!(pr.matches("THRESHOLD"));
        assert!(!pr.matches("unrelated"));
    }

    #[test]
    fn test_pr_matches_number() {
        let pr = sample_pr();
        assert!(pr.matches("#42"));
        assert!(pr.matches("42"));
        assert!(!pr.matches("#43"));
    }

    #[test]
    fn test_pr_matches_empty_needle() {
        let pr = sample_pr();
        assert!(pr.matches(""));
    }

    #[test]
    fn test_repo_full_name() {
        let repo = RepoInfo {
            owner: "owner".to_string(),
            repo: "repo".to_string(),
        };
        assert_eq!(repo.full_name(), "owner/repo");
    }
}
