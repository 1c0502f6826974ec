use std::fs;
use std::path::PathBuf;

use crate::types::PullRequest;

/// Cached PR list for instant startup while a refresh runs in the background
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PrCache {
    /// Repository the list was fetched from (owner/repo)
    pub repo: String,
    pub prs: Vec<PullRequest>,
}

/// Get the cache file path (~/.config/kanshi/cache.json)
fn cache_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("kanshi").join("cache.json"))
}

/// Save the PR list to cache
pub fn save_cache(repo: &str, prs: &[PullRequest]) {
    let Some(file_path) = cache_file_path() else {
        return;
    };

    if let Some(parent) = file_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let cache = PrCache {
        repo: repo.to_string(),
        prs: prs.to_vec(),
    };

    if let Ok(json) = serde_json::to_string(&cache) {
        let _ = fs::write(&file_path, json);
    }
}

/// Load the cached PR list if it belongs to the given repository
pub fn load_cache(repo: &str) -> Option<Vec<PullRequest>> {
    let file_path = cache_file_path()?;

    if !file_path.exists() {
        return None;
    }

    let content = fs::read_to_string(&file_path).ok()?;
    let cache: PrCache = serde_json::from_str(&content).ok()?;

    if cache.repo != repo {
        log::info!("cache is for {}, ignoring", cache.repo);
        return None;
    }

    Some(cache.prs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrState;

    #[test]
    fn test_cache_serialization_round_trip() {
        let cache = PrCache {
            repo: "owner/repo".to_string(),
            prs: vec![PullRequest {
                number: 1,
                title: "t".to_string(),
                author: "a".to_string(),
                state: PrState::Open,
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-02T00:00:00Z".to_string(),
                comments: 0,
                html_url: "https://github.com/owner/repo/pull/1".to_string(),
            }],
        };

        let json = serde_json::to_string(&cache).unwrap();
        let parsed: PrCache = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.repo, "owner/repo");
        assert_eq!(parsed.prs.len(), 1);
        assert_eq!(parsed.prs[0].number, 1);
    }
}
