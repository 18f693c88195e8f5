use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::CollectSettings;
use crate::error::{MetricsError, Result};
use crate::model::{PullRequest, Review, ReviewState};

const USER_AGENT: &str = "review-metrics";

const ACCESS_QUERY: &str = r#"
query TestAccess($owner: String!, $repo: String!) {
    viewer {
        login
    }
    repository(owner: $owner, name: $repo) {
        nameWithOwner
    }
}
"#;

/// Newest first, one page per request, the first 100 reviews of each PR.
pub const PULL_REQUESTS_QUERY: &str = r#"
query GetPullRequests($owner: String!, $repo: String!, $pageSize: Int!, $cursor: String) {
    repository(owner: $owner, name: $repo) {
        nameWithOwner
        pullRequests(first: $pageSize, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
            pageInfo {
                hasNextPage
                endCursor
            }
            nodes {
                number
                createdAt
                author {
                    login
                }
                reviews(first: 100) {
                    nodes {
                        state
                        author {
                            login
                        }
                    }
                }
            }
        }
    }
}
"#;

#[derive(Clone)]
pub struct GithubClient {
    token: Arc<String>,
    http: Arc<Client>,
    api_url: Arc<String>,
}

/// Who we are and which repository we can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfo {
    pub login: String,
    pub name_with_owner: String,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Actor {
    login: String,
}

#[derive(Deserialize)]
struct ReviewNode {
    state: ReviewState,
    author: Option<Actor>,
}

#[derive(Deserialize)]
struct ReviewNodes {
    nodes: Option<Vec<ReviewNode>>,
}

#[derive(Deserialize)]
struct PullRequestNode {
    number: u64,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    author: Option<Actor>,
    reviews: Option<ReviewNodes>,
}

impl From<PullRequestNode> for PullRequest {
    fn from(node: PullRequestNode) -> Self {
        let reviews = node
            .reviews
            .and_then(|r| r.nodes)
            .unwrap_or_default()
            .into_iter()
            .map(|review| Review {
                state: review.state,
                author: review.author.map(|a| a.login),
            })
            .collect();

        PullRequest {
            number: node.number,
            created_at: node.created_at,
            author: node.author.map(|a| a.login),
            reviews,
        }
    }
}

impl GithubClient {
    /// Create a GitHub GraphQL client for the resolved run settings.
    pub fn new(settings: &CollectSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MetricsError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            token: Arc::new(settings.token.clone()),
            http: Arc::new(http),
            api_url: Arc::new(settings.api_url.clone()),
        })
    }

    /// Send one query and decode the JSON body. Does not look at `errors`.
    async fn post(&self, query: &str, variables: &Value) -> Result<Value> {
        debug!("Making GraphQL request with variables: {variables}");

        let resp = self
            .http
            .post(self.api_url.as_str())
            .bearer_auth(&*self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(MetricsError::Auth(message));
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MetricsError::Network(format!(
                "GitHub API returned HTTP {}: {body}",
                status.as_u16()
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| MetricsError::Decode(format!("Failed to parse JSON from GitHub: {e}")))
    }

    /// GraphQL request that fails on the first reported error.
    async fn graphql(&self, query: &str, variables: &Value) -> Result<Value> {
        let json = self.post(query, variables).await?;
        if let Some(err) = first_error(&json) {
            return Err(MetricsError::Graph(err.message));
        }
        Ok(json)
    }

    /// Resolve the authenticated login and confirm the repository is visible.
    pub async fn verify_access(&self, owner: &str, repo: &str) -> Result<AccessInfo> {
        #[derive(Deserialize)]
        struct AccessResponse {
            data: Option<AccessData>,
        }
        #[derive(Deserialize)]
        struct AccessData {
            viewer: Option<Actor>,
            repository: Option<RepoName>,
        }
        #[derive(Deserialize)]
        struct RepoName {
            #[serde(rename = "nameWithOwner")]
            name_with_owner: String,
        }

        let cannot_access =
            || MetricsError::Access(format!("Cannot access repository: {owner}/{repo}"));

        let json = self
            .post(ACCESS_QUERY, &json!({ "owner": owner, "repo": repo }))
            .await?;

        if let Some(err) = first_error(&json) {
            return Err(match err.kind.as_deref() {
                Some("NOT_FOUND") | Some("FORBIDDEN") => cannot_access(),
                _ => MetricsError::Graph(err.message),
            });
        }

        let parsed: AccessResponse = serde_json::from_value(json)
            .map_err(|e| MetricsError::Decode(format!("access check response: {e}")))?;
        let data = parsed
            .data
            .ok_or_else(|| MetricsError::Decode("access check returned no data".to_string()))?;

        let viewer = data.viewer.ok_or_else(|| {
            MetricsError::Auth("Failed to authenticate with GitHub API".to_string())
        })?;
        info!("Authenticated as: {}", viewer.login);

        let repository = data.repository.ok_or_else(cannot_access)?;
        info!("Repository access confirmed: {}", repository.name_with_owner);

        Ok(AccessInfo {
            login: viewer.login,
            name_with_owner: repository.name_with_owner,
        })
    }

    /// Follow `pageInfo` until exhausted, concatenating pull request nodes in
    /// the order received. `variables` must be an object; its `cursor` entry is
    /// managed here.
    pub async fn fetch_all_pages(&self, query: &str, variables: Value) -> Result<Vec<PullRequest>> {
        #[derive(Deserialize)]
        struct PullRequestsResponse {
            data: Option<PullRequestsData>,
        }
        #[derive(Deserialize)]
        struct PullRequestsData {
            repository: Option<RepositoryNode>,
        }
        #[derive(Deserialize)]
        struct RepositoryNode {
            #[serde(rename = "pullRequests")]
            pull_requests: PullRequestPage,
        }
        #[derive(Deserialize)]
        struct PullRequestPage {
            #[serde(rename = "pageInfo")]
            page_info: PageInfo,
            nodes: Option<Vec<PullRequestNode>>,
        }

        let Value::Object(mut variables) = variables else {
            return Err(MetricsError::Config(
                "GraphQL variables must be a JSON object".to_string(),
            ));
        };

        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            variables.insert("cursor".to_string(), json!(cursor));
            let vars = Value::Object(variables.clone());

            let json = self.graphql(query, &vars).await?;
            let parsed: PullRequestsResponse = serde_json::from_value(json)
                .map_err(|e| MetricsError::Decode(format!("pull request page: {e}")))?;

            let page = parsed
                .data
                .and_then(|d| d.repository)
                .map(|r| r.pull_requests)
                .ok_or_else(|| {
                    MetricsError::Access(format!(
                        "Cannot access repository: {}/{}",
                        vars["owner"].as_str().unwrap_or("?"),
                        vars["repo"].as_str().unwrap_or("?")
                    ))
                })?;

            let nodes = page.nodes.unwrap_or_default();
            info!(
                "Fetched {} PRs. Has more pages: {}",
                nodes.len(),
                page.page_info.has_next_page
            );
            all.extend(nodes.into_iter().map(PullRequest::from));

            if !page.page_info.has_next_page {
                break;
            }

            cursor = Some(page.page_info.end_cursor.ok_or_else(|| {
                MetricsError::Decode("hasNextPage is set but endCursor is missing".to_string())
            })?);
        }

        Ok(all)
    }

    /// Every pull request of `owner/repo`, newest first.
    pub async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page_size: u32,
    ) -> Result<Vec<PullRequest>> {
        self.fetch_all_pages(
            PULL_REQUESTS_QUERY,
            json!({ "owner": owner, "repo": repo, "pageSize": page_size }),
        )
        .await
    }
}

fn first_error(json: &Value) -> Option<GraphError> {
    let first = json.get("errors")?.as_array()?.first()?.clone();
    Some(serde_json::from_value(first).unwrap_or_else(|_| GraphError {
        message: "unknown GraphQL error".to_string(),
        kind: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> CollectSettings {
        CollectSettings {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            token: "test-token".to_string(),
            year: 2024,
            api_url: format!("{}/graphql", server.uri()),
            timeout: Duration::from_secs(5),
            page_size: 2,
            output: PathBuf::from("unused.json"),
        }
    }

    fn page(numbers: &[u64], next: Option<&str>) -> Value {
        let nodes: Vec<Value> = numbers
            .iter()
            .map(|n| {
                json!({
                    "number": n,
                    "createdAt": "2024-03-01T10:00:00Z",
                    "author": { "login": "alice" },
                    "reviews": { "nodes": [
                        { "state": "CHANGES_REQUESTED", "author": { "login": "bob" } },
                        { "state": "APPROVED", "author": null }
                    ] }
                })
            })
            .collect();

        json!({
            "data": {
                "repository": {
                    "nameWithOwner": "acme/widgets",
                    "pullRequests": {
                        "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next },
                        "nodes": nodes
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn follows_cursor_until_last_page() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({ "variables": { "cursor": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[3, 2], Some("c1"))))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "cursor": "c1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1], None)))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let prs = client.fetch_pull_requests("acme", "widgets", 2).await.unwrap();

        let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
        assert_eq!(prs[0].author.as_deref(), Some("alice"));
        assert_eq!(prs[0].reviews.len(), 2);
        assert_eq!(prs[0].reviews[0].state, ReviewState::ChangesRequested);
        assert_eq!(prs[0].reviews[1].author, None);
    }

    #[tokio::test]
    async fn graphql_errors_surface_first_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [
                    { "message": "Something broke" },
                    { "message": "Second problem" }
                ]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client
            .fetch_pull_requests("acme", "widgets", 2)
            .await
            .unwrap_err();

        match err {
            MetricsError::Graph(message) => assert_eq!(message, "Something broke"),
            other => panic!("expected GraphQL error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_credentials_are_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        assert!(matches!(err, MetricsError::Auth(ref m) if m == "Bad credentials"));
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client
            .fetch_pull_requests("acme", "widgets", 2)
            .await
            .unwrap_err();

        assert!(matches!(err, MetricsError::Network(_)));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(&[1], None))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut settings = settings(&server);
        settings.timeout = Duration::from_millis(200);
        let client = GithubClient::new(&settings).unwrap();

        let err = client
            .fetch_pull_requests("acme", "widgets", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MetricsError::Network(_)));
    }

    #[tokio::test]
    async fn verify_access_reports_login_and_repository() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "owner": "acme", "repo": "widgets" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "viewer": { "login": "octocat" },
                    "repository": { "nameWithOwner": "acme/widgets" }
                }
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let access = client.verify_access("acme", "widgets").await.unwrap();

        assert_eq!(
            access,
            AccessInfo {
                login: "octocat".to_string(),
                name_with_owner: "acme/widgets".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn missing_repository_is_an_access_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "viewer": { "login": "octocat" }, "repository": null },
                "errors": [{
                    "type": "NOT_FOUND",
                    "message": "Could not resolve to a Repository with the name 'acme/widgets'."
                }]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        assert_eq!(err.to_string(), "Cannot access repository: acme/widgets");
    }

    #[tokio::test]
    async fn forbidden_repository_is_an_access_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "viewer": { "login": "octocat" }, "repository": null },
                "errors": [{
                    "type": "FORBIDDEN",
                    "message": "Resource not accessible by integration"
                }]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        assert!(matches!(err, MetricsError::Access(ref m) if m == "Cannot access repository: acme/widgets"));
    }

    #[tokio::test]
    async fn other_access_check_errors_are_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [
                    { "type": "RATE_LIMITED", "message": "API rate limit exceeded" },
                    { "message": "Second problem" }
                ]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        match err {
            MetricsError::Graph(message) => assert_eq!(message, "API rate limit exceeded"),
            other => panic!("expected GraphQL error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn untyped_access_check_errors_are_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Something broke" }]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        assert!(matches!(err, MetricsError::Graph(ref m) if m == "Something broke"));
    }

    #[tokio::test]
    async fn missing_viewer_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "viewer": null, "repository": { "nameWithOwner": "acme/widgets" } }
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&settings(&server)).unwrap();
        let err = client.verify_access("acme", "widgets").await.unwrap_err();

        assert!(matches!(err, MetricsError::Auth(_)));
    }
}
