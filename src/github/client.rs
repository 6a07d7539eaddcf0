use crate::github::types::*;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub returned status {0}")]
    Status(u16),
    #[error("response carried no data payload")]
    MissingData,
}

/// One of the three listing shapes the cascade needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageQuery {
    SearchUsers { query: String },
    SearchRepos { owner: String, query: String },
    ListReleases { owner: String, repo: String },
}

/// Items from one page, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum PageItems {
    Users(Vec<GithubUser>),
    Repos(Vec<GithubRepo>),
    Releases(Vec<GithubRelease>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: PageItems,
    /// Only the search endpoints report a total
    pub total_count: Option<u64>,
}

impl PageItems {
    pub fn len(&self) -> usize {
        match self {
            PageItems::Users(v) => v.len(),
            PageItems::Repos(v) => v.len(),
            PageItems::Releases(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageQuery {
    /// Search term sent as `q`, None for plain listings
    pub fn search_terms(&self) -> Option<String> {
        match self {
            PageQuery::SearchUsers { query } => Some(query.clone()),
            PageQuery::SearchRepos { owner, query } => {
                Some(format!("{} user:{}", query.trim(), owner).trim().to_string())
            }
            PageQuery::ListReleases { .. } => None,
        }
    }

    /// Page ceiling for this query. Search results stop at 1000 on GitHub's
    /// side; release listings are walked to the end.
    pub fn page_limit(&self, max_search_pages: u32) -> u32 {
        match self {
            PageQuery::SearchUsers { .. } | PageQuery::SearchRepos { .. } => max_search_pages,
            PageQuery::ListReleases { .. } => u32::MAX,
        }
    }

    fn path(&self) -> String {
        match self {
            PageQuery::SearchUsers { .. } => "/search/users".to_string(),
            PageQuery::SearchRepos { .. } => "/search/repositories".to_string(),
            PageQuery::ListReleases { owner, repo } => format!(
                "/repos/{}/{}/releases",
                urlencoding::encode(owner),
                urlencoding::encode(repo)
            ),
        }
    }
}

/// GitHub ignores anything larger
pub const MAX_PER_PAGE: u32 = 100;

/// Thin REST client for the three listing endpoints
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    pub per_page: u32,
}

impl GithubClient {
    pub fn new(api_base: &str, timeout_secs: u64, per_page: u32) -> Result<Self, GithubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("release-finder/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: None,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Fetch a single page (1-based) of `query`
    pub async fn fetch_page(&self, query: &PageQuery, page: u32) -> Result<Page, GithubError> {
        let url = format!("{}{}", self.api_base, query.path());
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = query.search_terms() {
            params.push(("q", q));
            params.push(("order", "asc".to_string()));
        }
        params.push(("per_page", self.per_page.to_string()));
        params.push(("page", page.to_string()));

        let mut request = self
            .http
            .get(&url)
            .query(&params)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        tracing::debug!(%url, page, "GitHub request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GithubError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        match query {
            PageQuery::SearchUsers { .. } => {
                let parsed: SearchResponse<GithubUser> =
                    serde_json::from_str(&body).map_err(|_| GithubError::MissingData)?;
                let items = parsed.items.ok_or(GithubError::MissingData)?;
                Ok(Page { items: PageItems::Users(items), total_count: parsed.total_count })
            }
            PageQuery::SearchRepos { .. } => {
                let parsed: SearchResponse<GithubRepo> =
                    serde_json::from_str(&body).map_err(|_| GithubError::MissingData)?;
                let items = parsed.items.ok_or(GithubError::MissingData)?;
                Ok(Page { items: PageItems::Repos(items), total_count: parsed.total_count })
            }
            PageQuery::ListReleases { .. } => {
                let items: Vec<GithubRelease> =
                    serde_json::from_str(&body).map_err(|_| GithubError::MissingData)?;
                Ok(Page { items: PageItems::Releases(items), total_count: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GithubClient {
        GithubClient::new(&server.uri(), 5, 100).unwrap().with_token("gho_test")
    }

    #[test]
    fn test_per_page_is_clamped() {
        assert_eq!(GithubClient::new("https://api.github.com", 5, 500).unwrap().per_page, 100);
        assert_eq!(GithubClient::new("https://api.github.com", 5, 0).unwrap().per_page, 1);
        assert_eq!(GithubClient::new("https://api.github.com", 5, 30).unwrap().per_page, 30);
    }

    #[test]
    fn test_page_limit_only_bounds_searches() {
        let users = PageQuery::SearchUsers { query: "oc".into() };
        let repos = PageQuery::SearchRepos { owner: "octocat".into(), query: String::new() };
        let releases = PageQuery::ListReleases { owner: "octocat".into(), repo: "Hello-World".into() };
        assert_eq!(users.page_limit(10), 10);
        assert_eq!(repos.page_limit(10), 10);
        assert_eq!(releases.page_limit(10), u32::MAX);
    }

    #[test]
    fn test_repo_search_terms_scope_owner() {
        let q = PageQuery::SearchRepos { owner: "octocat".into(), query: "".into() };
        assert_eq!(q.search_terms().as_deref(), Some("user:octocat"));

        let q = PageQuery::SearchRepos { owner: "octocat".into(), query: "hello".into() };
        assert_eq!(q.search_terms().as_deref(), Some("hello user:octocat"));

        let q = PageQuery::ListReleases { owner: "octocat".into(), repo: "Hello-World".into() };
        assert_eq!(q.search_terms(), None);
    }

    #[tokio::test]
    async fn test_search_users_sends_query_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/users"))
            .and(query_param("q", "octo"))
            .and(query_param("order", "asc"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer gho_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "incomplete_results": false,
                "items": [{ "id": 583231, "login": "octocat" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .fetch_page(&PageQuery::SearchUsers { query: "octo".into() }, 1)
            .await
            .unwrap();

        assert_eq!(page.total_count, Some(1));
        match page.items {
            PageItems::Users(users) => assert_eq!(users[0].login, "octocat"),
            other => panic!("unexpected items: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_releases_page_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World/releases"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "tag_name": "v1.0.0", "assets": [] }
            ])))
            .mount(&server)
            .await;

        let query = PageQuery::ListReleases { owner: "octocat".into(), repo: "Hello-World".into() };
        let page = client(&server).fetch_page(&query, 2).await.unwrap();

        assert_eq!(page.total_count, None);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/users"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_page(&PageQuery::SearchUsers { query: "octo".into() }, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::Status(403)));
    }

    #[tokio::test]
    async fn test_missing_items_is_missing_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "weird" })))
            .mount(&server)
            .await;

        let query = PageQuery::SearchRepos { owner: "octocat".into(), query: String::new() };
        let err = client(&server).fetch_page(&query, 1).await.unwrap_err();
        assert!(matches!(err, GithubError::MissingData));
    }
}
