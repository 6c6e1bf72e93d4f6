//! HTTP access to the Drive v3 API.
//!
//! `DriveApi` is the only interface the rest of the app uses for network
//! calls. `HttpDriveApi` implements it over a blocking reqwest client that
//! runs on rustls with a TLS 1.2 floor, which avoids the handshake failures
//! some proxies and antivirus intermediaries cause with older stacks.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::AccessToken;
use crate::error::{DriveError, Result};
use crate::models::{FOLDER_MIME_TYPE, FilePage, RawFile};

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
const USER_AGENT: &str = concat!("drive_copy/", env!("CARGO_PKG_VERSION"));

/// Largest page `files.list` accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    /// Every folder the user can see that is not trashed.
    Folders,
    /// Non-folder, non-trashed children of the given folder.
    FilesIn(String),
}

impl ListQuery {
    pub fn q(&self) -> String {
        match self {
            ListQuery::Folders => format!("mimeType='{FOLDER_MIME_TYPE}' and trashed=false"),
            ListQuery::FilesIn(folder_id) => format!(
                "'{}' in parents and mimeType!='{FOLDER_MIME_TYPE}' and trashed=false",
                escape_query_literal(folder_id)
            ),
        }
    }

    pub fn fields(&self) -> &'static str {
        match self {
            ListQuery::Folders => "nextPageToken, files(id, name, parents)",
            ListQuery::FilesIn(_) => "nextPageToken, files(id, name, mimeType, parents)",
        }
    }

    pub fn order_by(&self) -> Option<&'static str> {
        match self {
            ListQuery::Folders => None,
            ListQuery::FilesIn(_) => Some("name"),
        }
    }
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub trait DriveApi: Send + Sync {
    /// Fetch a single page of `query`, continuing from `page_token`.
    fn list_page(&self, query: &ListQuery, page_size: u32, page_token: Option<&str>)
    -> Result<FilePage>;

    /// Duplicate `file_id` into `dest_folder_id` under `name`; returns the new
    /// file's id.
    fn copy_file(&self, file_id: &str, name: &str, dest_folder_id: &str) -> Result<String>;

    fn file_metadata(&self, file_id: &str) -> Result<RawFile>;

    /// Raw content of a binary (non Google Docs) file.
    fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout. `None` keeps the HTTP library's default.
    pub timeout: Option<Duration>,
    /// Root of the Drive v3 REST API, without a trailing slash.
    pub base_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            base_url: DRIVE_API_URL.to_string(),
        }
    }
}

pub fn build_http_client(config: &TransportConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .https_only(config.base_url.starts_with("https://"))
        .user_agent(USER_AGENT);
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

pub struct HttpDriveApi {
    client: Client,
    base_url: String,
    token: AccessToken,
}

impl HttpDriveApi {
    pub fn new(config: &TransportConfig, token: AccessToken) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(self.token.secret()).send()?;
        check_status(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(DriveError::Unauthorized);
    }
    let body = response.text().unwrap_or_default();
    let message = api_error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(DriveError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Message of a Google API error body (`{"error": {"code": .., "message": ..}}`).
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

#[derive(Deserialize)]
struct CopiedFile {
    id: Option<String>,
}

impl DriveApi for HttpDriveApi {
    fn list_page(
        &self,
        query: &ListQuery,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        let mut params = vec![
            ("q", query.q()),
            ("fields", query.fields().to_string()),
            ("pageSize", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "false".to_string()),
        ];
        if let Some(order_by) = query.order_by() {
            params.push(("orderBy", order_by.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        debug!(?query, has_token = page_token.is_some(), "listing page");
        let request = self.client.get(self.url("files")).query(&params);
        Ok(self.send(request)?.json()?)
    }

    fn copy_file(&self, file_id: &str, name: &str, dest_folder_id: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url(&format!("files/{file_id}/copy")))
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({ "name": name, "parents": [dest_folder_id] }));
        let copied: CopiedFile = self.send(request)?.json()?;
        copied.id.ok_or(DriveError::MissingField {
            field: "id",
            context: "copy response",
        })
    }

    fn file_metadata(&self, file_id: &str) -> Result<RawFile> {
        let request = self
            .client
            .get(self.url(&format!("files/{file_id}")))
            .query(&[
                ("supportsAllDrives", "true"),
                ("fields", "id, name, mimeType, parents"),
            ]);
        Ok(self.send(request)?.json()?)
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(self.url(&format!("files/{file_id}")))
            .query(&[("supportsAllDrives", "true"), ("alt", "media")]);
        Ok(self.send(request)?.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Run `f` against `server` on a blocking thread; the blocking client must
    /// not be created or dropped on the async runtime.
    async fn call<T: Send + 'static>(
        server: &MockServer,
        f: impl FnOnce(&HttpDriveApi) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let config = TransportConfig {
            base_url: server.uri(),
            ..TransportConfig::default()
        };
        tokio::task::spawn_blocking(move || {
            let api = HttpDriveApi::new(&config, AccessToken::new("secret-token"))?;
            f(&api)
        })
        .await
        .unwrap()
    }

    async fn respond_to_copy(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/files/src-1/copy"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn copy(api: &HttpDriveApi) -> Result<String> {
        api.copy_file("src-1", "a.jpg", "dest")
    }

    #[test]
    fn folders_query_excludes_trash() {
        assert_eq!(
            ListQuery::Folders.q(),
            "mimeType='application/vnd.google-apps.folder' and trashed=false"
        );
        assert_eq!(ListQuery::Folders.order_by(), None);
    }

    #[test]
    fn files_query_targets_parent_and_skips_folders() {
        let query = ListQuery::FilesIn("abc123".into());
        assert_eq!(
            query.q(),
            "'abc123' in parents and mimeType!='application/vnd.google-apps.folder' and trashed=false"
        );
        assert_eq!(query.order_by(), Some("name"));
        assert!(query.fields().contains("mimeType"));
    }

    #[test]
    fn files_query_escapes_quotes() {
        let query = ListQuery::FilesIn(r"it's\odd".into());
        assert!(query.q().starts_with(r"'it\'s\\odd' in parents"));
    }

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error": {"code": 403, "message": "The user does not have sufficient permissions for file."}}"#;
        assert_eq!(
            api_error_message(body).as_deref(),
            Some("The user does not have sufficient permissions for file.")
        );
    }

    #[test]
    fn non_json_error_body_has_no_message() {
        assert_eq!(api_error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(api_error_message(r#"{"error": {"code": 500}}"#), None);
    }

    #[test]
    fn builds_client_with_and_without_timeout() {
        assert!(build_http_client(&TransportConfig::default()).is_ok());
        let config = TransportConfig {
            timeout: Some(Duration::from_secs(60)),
            ..TransportConfig::default()
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[tokio::test]
    async fn list_page_sends_query_and_continuation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(header("authorization", "Bearer secret-token"))
            .and(query_param("q", ListQuery::FilesIn("abc".into()).q()))
            .and(query_param("orderBy", "name"))
            .and(query_param("pageSize", "1000"))
            .and(query_param("pageToken", "next-1"))
            .and(query_param("supportsAllDrives", "true"))
            .and(query_param("includeItemsFromAllDrives", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{"id": "f1", "name": "a.jpg", "mimeType": "image/jpeg", "parents": ["abc"]}],
                "nextPageToken": "next-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = call(&server, |api| {
            api.list_page(&ListQuery::FilesIn("abc".into()), 5000, Some("next-1"))
        })
        .await
        .unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].id.as_deref(), Some("f1"));
        assert_eq!(page.files[0].mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(page.next_page_token.as_deref(), Some("next-2"));
    }

    #[tokio::test]
    async fn first_folder_page_has_no_token_or_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("q", ListQuery::Folders.q()))
            .and(query_param("pageSize", "50"))
            .and(query_param_is_missing("pageToken"))
            .and(query_param_is_missing("orderBy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
            .expect(1)
            .mount(&server)
            .await;

        let page = call(&server, |api| api.list_page(&ListQuery::Folders, 50, None))
            .await
            .unwrap();
        assert!(page.files.is_empty());
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn copy_posts_name_and_destination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/src-1/copy"))
            .and(header("authorization", "Bearer secret-token"))
            .and(query_param("supportsAllDrives", "true"))
            .and(body_json(json!({"name": "a.jpg", "parents": ["dest"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-1"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(call(&server, copy).await.unwrap(), "new-1");
    }

    #[tokio::test]
    async fn copy_response_without_id_is_rejected() {
        let server = MockServer::start().await;
        respond_to_copy(&server, ResponseTemplate::new(200).set_body_json(json!({}))).await;

        let err = call(&server, copy).await.unwrap_err();
        assert!(matches!(err, DriveError::MissingField { field: "id", .. }));
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let server = MockServer::start().await;
        respond_to_copy(
            &server,
            ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "Request had invalid authentication credentials."}
            })),
        )
        .await;

        let err = call(&server, copy).await.unwrap_err();
        assert!(matches!(err, DriveError::Unauthorized));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn forbidden_keeps_google_message() {
        let server = MockServer::start().await;
        respond_to_copy(
            &server,
            ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "The user does not have sufficient permissions for file."}
            })),
        )
        .await;

        match call(&server, copy).await.unwrap_err() {
            DriveError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "The user does not have sufficient permissions for file.");
            }
            other => panic!("expected DriveError::Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_falls_back_to_reason() {
        let server = MockServer::start().await;
        respond_to_copy(
            &server,
            ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"),
        )
        .await;

        let err = call(&server, copy).await.unwrap_err();
        assert!(err.is_retryable());
        match err {
            DriveError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected DriveError::Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_requests_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/img-1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let bytes = call(&server, |api| api.download("img-1")).await.unwrap();
        assert_eq!(bytes, [1, 2, 3]);
    }
}
