use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything that can appear in a cascade dropdown
pub trait Candidate {
    fn id(&self) -> u64;
    fn display_name(&self) -> &str;

    /// Case-insensitive match used by the dropdown filter
    fn matches(&self, query: &str) -> bool {
        self.display_name().to_lowercase().contains(&query.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRelease {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Envelope returned by the `/search/*` endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Option<Vec<T>>,
}

impl Candidate for GithubUser {
    fn id(&self) -> u64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.login
    }

    /// Logins are matched by prefix
    fn matches(&self, query: &str) -> bool {
        self.login.to_lowercase().starts_with(&query.to_lowercase())
    }
}

impl Candidate for GithubRepo {
    fn id(&self) -> u64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl Candidate for GithubRelease {
    fn id(&self) -> u64 {
        self.id
    }

    /// Release title, or the tag when the release has no title
    fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.tag_name,
        }
    }

    fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.display_name().to_lowercase().contains(&query)
            || self.tag_name.to_lowercase().contains(&query)
    }
}

impl ReleaseAsset {
    /// Human-readable size (e.g. "4.2 MB")
    pub fn size_label(&self) -> String {
        const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
        let mut size = self.size as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} {}", self.size, UNITS[0])
        } else {
            format!("{size:.1} {}", UNITS[unit])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: Option<&str>, tag: &str) -> GithubRelease {
        GithubRelease {
            id: 1,
            name: name.map(str::to_string),
            tag_name: tag.to_string(),
            published_at: None,
            html_url: String::new(),
            body: None,
            prerelease: false,
            draft: false,
            assets: vec![],
        }
    }

    #[test]
    fn test_release_display_name_falls_back_to_tag() {
        assert_eq!(release(Some("First stable"), "v1.0.0").display_name(), "First stable");
        assert_eq!(release(Some("  "), "v1.0.0").display_name(), "v1.0.0");
        assert_eq!(release(None, "v1.0.0").display_name(), "v1.0.0");
    }

    #[test]
    fn test_release_matches_name_or_tag() {
        let r = release(Some("Spring Update"), "v2.3.0");
        assert!(r.matches("spring"));
        assert!(r.matches("2.3"));
        assert!(!r.matches("winter"));
    }

    #[test]
    fn test_user_matches_by_prefix_only() {
        let user = GithubUser {
            id: 583231,
            login: "octocat".to_string(),
            avatar_url: String::new(),
            html_url: String::new(),
        };
        assert!(user.matches("OCTO"));
        assert!(!user.matches("cat"));
    }

    #[test]
    fn test_repo_matches_substring() {
        let repo = GithubRepo {
            id: 1296269,
            name: "Hello-World".to_string(),
            full_name: "octocat/Hello-World".to_string(),
            description: None,
            html_url: String::new(),
            stargazers_count: 0,
        };
        assert!(repo.matches("world"));
        assert!(repo.matches(""));
        assert!(!repo.matches("spoon"));
    }

    #[test]
    fn test_release_deserializes_from_api_payload() {
        let json = r#"{
            "id": 1,
            "tag_name": "v1.0.0",
            "name": "v1.0.0",
            "html_url": "https://github.com/octocat/Hello-World/releases/v1.0.0",
            "published_at": "2013-02-27T19:35:32Z",
            "prerelease": false,
            "draft": false,
            "assets": [{
                "id": 1,
                "name": "example.zip",
                "browser_download_url": "https://github.com/octocat/Hello-World/releases/download/v1.0.0/example.zip",
                "size": 1024,
                "download_count": 42,
                "content_type": "application/zip"
            }]
        }"#;
        let release: GithubRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].download_count, 42);
        assert!(release.published_at.is_some());
    }

    #[test]
    fn test_asset_size_label() {
        let mut asset = ReleaseAsset {
            id: 1,
            name: "a".to_string(),
            browser_download_url: String::new(),
            size: 512,
            download_count: 0,
            content_type: None,
        };
        assert_eq!(asset.size_label(), "512 B");
        asset.size = 1536;
        assert_eq!(asset.size_label(), "1.5 KB");
        asset.size = 5 * 1024 * 1024;
        assert_eq!(asset.size_label(), "5.0 MB");
    }
}
