use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::feedback::RawEntry;
use crate::parser::parse_patch;
use crate::types::{DiffFile, FileStatus, PrState, PullRequest, RepoInfo};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "kanshi";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Media type that carries body_html alongside the plain text body
const FULL_MEDIA_TYPE: &str = "application/vnd.github.v3.full+json";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Maximum length of an API error body embedded in an error message
const MAX_ERROR_BODY_LEN: usize = 200;

/// Parse a GitHub repository URL into owner and repo
pub fn parse_repo_url(url_str: &str) -> Result<RepoInfo> {
    let url = Url::parse(url_str).context("Invalid URL")?;

    if url.host_str() != Some("github.com") {
        return Err(anyhow!("Only github.com URLs are supported"));
    }

    let segments: Vec<_> = url
        .path_segments()
        .ok_or_else(|| anyhow!("Invalid repository URL path"))?
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < 2 {
        return Err(anyhow!(
            "Invalid repository URL. Expected: https://github.com/owner/repo"
        ));
    }

    Ok(RepoInfo {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
    })
}

/// Parse a GitHub PR URL into a repository reference and PR number
pub fn parse_pr_url(url_str: &str) -> Result<(RepoInfo, u32)> {
    let url = Url::parse(url_str).context("Invalid URL")?;

    if url.host_str() != Some("github.com") {
        return Err(anyhow!("Only github.com URLs are supported"));
    }

    let segments: Vec<_> = url
        .path_segments()
        .ok_or_else(|| anyhow!("Invalid PR URL path"))?
        .collect();

    // Expected format: /owner/repo/pull/123
    if segments.len() < 4 || segments[2] != "pull" {
        return Err(anyhow!(
            "Invalid PR URL format. Expected: https://github.com/owner/repo/pull/123"
        ));
    }

    let number: u32 = segments[3]
        .parse()
        .context("PR number must be a valid integer")?;

    Ok((
        RepoInfo {
            owner: segments[0].to_string(),
            repo: segments[1].to_string(),
        },
        number,
    ))
}

/// Truncate an API error body before embedding it in an error message
fn truncate_error_body(body: &str) -> String {
    let body = body.trim();
    if body.len() > MAX_ERROR_BODY_LEN {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX_ERROR_BODY_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GhUser {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    number: u32,
    title: String,
    user: Option<GhUser>,
    state: String,
    merged_at: Option<String>,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    comments: u32,
    html_url: String,
}

impl GhPullRequest {
    fn into_pull_request(self) -> PullRequest {
        let state = PrState::from_api(&self.state, self.merged_at.as_deref());
        PullRequest {
            number: self.number,
            title: self.title,
            author: self
                .user
                .and_then(|u| u.login)
                .unwrap_or_else(|| "unknown".to_string()),
            state,
            created_at: self.created_at,
            updated_at: self.updated_at,
            comments: self.comments,
            html_url: self.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u32,
    #[serde(default)]
    deletions: u32,
    patch: Option<String>,
    blob_url: Option<String>,
}

impl GhFile {
    fn into_diff_file(self) -> DiffFile {
        let hunks = self
            .patch
            .as_deref()
            .map(parse_patch)
            .unwrap_or_default();
        DiffFile {
            path: self.filename,
            status: FileStatus::from_api(&self.status),
            additions: self.additions,
            deletions: self.deletions,
            patch: self.patch,
            blob_url: self.blob_url,
            hunks,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Thin client for the GitHub REST API, scoped to one repository.
///
/// All requests attach the optional bearer credential; failures surface as
/// `status: body` errors for the UI to render inline.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    repo: RepoInfo,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(repo: RepoInfo, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http, repo, token })
    }

    pub fn repo(&self) -> &RepoInfo {
        &self.repo
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            API_BASE, self.repo.owner, self.repo.repo, path
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        media_type: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self
            .http
            .get(self.url(path))
            .header("Accept", media_type)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(query);

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{}: {}", status.as_u16(), truncate_error_body(&body)));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    /// List pull requests, all lifecycle states, most recently updated first
    pub async fn list_pull_requests(&self, per_page: u32) -> Result<Vec<PullRequest>> {
        let query = [
            ("state", "all".to_string()),
            ("per_page", per_page.to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        let prs: Vec<GhPullRequest> = self.get_json("pulls", JSON_MEDIA_TYPE, &query).await?;
        Ok(prs.into_iter().map(GhPullRequest::into_pull_request).collect())
    }

    /// Fetch a single pull request (direct URL mode)
    pub async fn get_pull_request(&self, number: u32) -> Result<PullRequest> {
        let pr: GhPullRequest = self
            .get_json(&format!("pulls/{}", number), JSON_MEDIA_TYPE, &[])
            .await?;
        Ok(pr.into_pull_request())
    }

    /// Fetch the reviews submitted on a PR
    pub async fn fetch_reviews(&self, number: u32) -> Result<Vec<RawEntry>> {
        self.get_json(&format!("pulls/{}/reviews", number), FULL_MEDIA_TYPE, &[])
            .await
    }

    /// Fetch the inline review comments on a PR
    pub async fn fetch_review_comments(&self, number: u32) -> Result<Vec<RawEntry>> {
        let query = [("per_page", "100".to_string())];
        self.get_json(
            &format!("pulls/{}/comments", number),
            FULL_MEDIA_TYPE,
            &query,
        )
        .await
    }

    /// Fetch the general conversation comments on a PR
    pub async fn fetch_issue_comments(&self, number: u32) -> Result<Vec<RawEntry>> {
        let query = [("per_page", "100".to_string())];
        self.get_json(
            &format!("issues/{}/comments", number),
            FULL_MEDIA_TYPE,
            &query,
        )
        .await
    }

    /// Fetch the changed-file list for a PR, with hunks parsed
    pub async fn fetch_changed_files(&self, number: u32) -> Result<Vec<DiffFile>> {
        let query = [("per_page", "100".to_string())];
        let files: Vec<GhFile> = self
            .get_json(&format!("pulls/{}/files", number), JSON_MEDIA_TYPE, &query)
            .await?;
        Ok(files.into_iter().map(GhFile::into_diff_file).collect())
    }

    /// Post a trigger comment on the PR's conversation thread.
    /// Only HTTP success is checked; the upstream bot's reaction is observed
    /// by re-fetching feedback.
    pub async fn post_issue_comment(&self, number: u32, body: &str) -> Result<()> {
        let mut request = self
            .http
            .post(self.url(&format!("issues/{}/comments", number)))
            .header("Accept", JSON_MEDIA_TYPE)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&serde_json::json!({ "body": body }));

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .context("Failed to post trigger comment")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to post comment: {}: {}",
                status.as_u16(),
                truncate_error_body(&body)
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // parse_repo_url / parse_pr_url
    // ========================================================================

    #[test]
    fn test_parse_repo_url() {
        let repo = parse_repo_url("https://github.com/my-org/my-repo").unwrap();
        assert_eq!(repo.owner, "my-org");
        assert_eq!(repo.repo, "my-repo");
    }

    #[test]
    fn test_parse_repo_url_with_trailing_path() {
        let repo = parse_repo_url("https://github.com/owner/repo/pulls").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.repo, "repo");
    }

    #[test]
    fn test_parse_repo_url_invalid() {
        assert!(parse_repo_url("https://gitlab.com/owner/repo").is_err());
        assert!(parse_repo_url("https://github.com/only-owner").is_err());
        assert!(parse_repo_url("not a url").is_err());
        assert!(parse_repo_url("").is_err());
    }

    #[test]
    fn test_parse_pr_url() {
        let (repo, number) = parse_pr_url("https://github.com/owner/repo/pull/123").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.repo, "repo");
        assert_eq!(number, 123);
    }

    #[test]
    fn test_parse_pr_url_with_files_path() {
        let (_, number) = parse_pr_url("https://github.com/owner/repo/pull/789/files").unwrap();
        assert_eq!(number, 789);
    }

    #[test]
    fn test_parse_pr_url_invalid() {
        assert!(parse_pr_url("https://github.com/owner/repo").is_err());
        assert!(parse_pr_url("https://github.com/owner/repo/issues/123").is_err());
        assert!(parse_pr_url("https://github.com/owner/repo/pull/abc").is_err());
        assert!(parse_pr_url("https://gitlab.com/owner/repo/pull/1").is_err());
    }

    #[test]
    fn test_parse_pr_url_hyphenated_names() {
        let (repo, number) = parse_pr_url("https://github.com/my-org/my-cool-repo/pull/42").unwrap();
        assert_eq!(repo.owner, "my-org");
        assert_eq!(repo.repo, "my-cool-repo");
        assert_eq!(number, 42);
    }

    #[test]
    fn test_parse_pr_url_enterprise_rejected() {
        assert!(parse_pr_url("https://github.mycompany.com/owner/repo/pull/1").is_err());
    }

    // ========================================================================
    // error body truncation
    // ========================================================================

    #[test]
    fn test_truncate_error_body_short() {
        assert_eq!(truncate_error_body("not found"), "not found");
    }

    #[test]
    fn test_truncate_error_body_long() {
        let long = "x".repeat(500);
        let truncated = truncate_error_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn test_truncate_error_body_trims_whitespace() {
        assert_eq!(truncate_error_body("  oops \n"), "oops");
    }

    // ========================================================================
    // wire conversions
    // ========================================================================

    #[test]
    fn test_pull_request_conversion() {
        let json = r#"{
            "number": 7,
            "title": "Add debounce",
            "user": {"login": "octocat"},
            "state": "closed",
            "merged_at": "2024-02-01T12:00:00Z",
            "created_at": "2024-01-30T12:00:00Z",
            "updated_at": "2024-02-01T12:00:00Z",
            "html_url": "https://github.com/o/r/pull/7"
        }"#;
        let wire: GhPullRequest = serde_json::from_str(json).unwrap();
        let pr = wire.into_pull_request();

        assert_eq!(pr.number, 7);
        assert_eq!(pr.author, "octocat");
        assert_eq!(pr.state, PrState::Merged);
        // Missing comment count defaults to zero
        assert_eq!(pr.comments, 0);
    }

    #[test]
    fn test_pull_request_conversion_missing_user() {
        let json = r#"{
            "number": 8,
            "title": "Ghost PR",
            "user": null,
            "state": "open",
            "merged_at": null,
            "created_at": "2024-01-30T12:00:00Z",
            "updated_at": "2024-01-31T12:00:00Z",
            "comments": 2,
            "html_url": "https://github.com/o/r/pull/8"
        }"#;
        let wire: GhPullRequest = serde_json::from_str(json).unwrap();
        let pr = wire.into_pull_request();

        assert_eq!(pr.author, "unknown");
        assert_eq!(pr.state, PrState::Open);
        assert_eq!(pr.comments, 2);
    }

    #[test]
    fn test_diff_file_conversion_parses_hunks() {
        let json = r#"{
            "filename": "src/lib.rs",
            "status": "modified",
            "additions": 1,
            "deletions": 1,
            "patch": "@@ -1,2 +1,2 @@\n-old\n+new\n ctx",
            "blob_url": "https://github.com/o/r/blob/abc/src/lib.rs"
        }"#;
        let wire: GhFile = serde_json::from_str(json).unwrap();
        let file = wire.into_diff_file();

        assert_eq!(file.path, "src/lib.rs");
        assert_eq!(file.status, FileStatus::Modified);
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].lines.len(), 3);
        assert!(file.has_patch());
    }

    #[test]
    fn test_diff_file_conversion_binary() {
        let json = r#"{
            "filename": "logo.png",
            "status": "added",
            "additions": 0,
            "deletions": 0,
            "patch": null,
            "blob_url": null
        }"#;
        let wire: GhFile = serde_json::from_str(json).unwrap();
        let file = wire.into_diff_file();

        assert_eq!(file.status, FileStatus::Added);
        assert!(file.hunks.is_empty());
        assert!(!file.has_patch());
    }
}
