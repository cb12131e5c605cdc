use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use tracing::{error, info, warn};

use crate::bookmark::{BookmarkRecord, RemoteDocument};
use crate::cache::LocalCache;
use crate::config::SyncSettings;
use crate::error::{CaptureError, CaptureResult, StoreError};
use crate::store::KvStore;

pub const CLIENT_ID: &str = "BookmarkExtension/1.0.0";
const DOCUMENTS_PATH: &str = "/api/documents";

/// Outcome of a successful remote write.
#[derive(Debug)]
pub struct Synced {
    pub document: RemoteDocument,
    pub response: serde_json::Value,
    /// Set when the server has the record but the local copy could not be written.
    pub local_error: Option<StoreError>,
}

pub struct SyncClient {
    http: reqwest::Client,
    settings: SyncSettings,
}

impl SyncClient {
    pub fn new(settings: SyncSettings) -> Self {
        SyncClient {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.settings.server_url, DOCUMENTS_PATH)
    }

    /// Post the record, then store it locally whatever the remote said.
    /// A remote failure is returned only after the local write has happened.
    pub async fn sync_and_persist<S: KvStore>(
        &self,
        record: BookmarkRecord,
        cache: &mut LocalCache<S>,
    ) -> CaptureResult<Synced> {
        let document = RemoteDocument::from_record(&record, self.settings.user_id);
        let remote = self.post(&document).await;
        let local = cache.prepend(record);

        match (remote, local) {
            (Ok(response), Ok(())) => {
                info!("Synced {} to {}", document.url, self.endpoint());
                Ok(Synced {
                    document,
                    response,
                    local_error: None,
                })
            }
            (Ok(response), Err(storage)) => {
                error!("Synced {} but the local copy failed: {}", document.url, storage);
                Ok(Synced {
                    document,
                    response,
                    local_error: Some(storage),
                })
            }
            (Err(sync), Ok(())) => {
                warn!("Sync failed for {}, kept local copy: {}", document.url, sync);
                Err(sync)
            }
            (Err(sync), Err(storage)) => {
                error!(
                    "RECORD LOST for {}: sync failed ({}) and local storage failed ({})",
                    document.url, sync, storage
                );
                Err(CaptureError::RecordLost {
                    sync: Box::new(sync),
                    storage,
                })
            }
        }
    }

    async fn post(&self, document: &RemoteDocument) -> CaptureResult<serde_json::Value> {
        let mut request = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_ID)
            .json(document);
        if !self.settings.api_key.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptureError::from_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| CaptureError::Decode(format!("{}: {}", e, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::BookmarkType;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> BookmarkRecord {
        BookmarkRecord {
            url: "https://github.com/rust-lang/rust".into(),
            title: "rust-lang/rust".into(),
            tags: vec!["开发".into(), "代码".into()],
            note: "compiler".into(),
            favicon: Some("https://github.com/favicon.ico".into()),
            domain: "github.com".into(),
            content: "Empowering everyone to build reliable software".into(),
            summary: "Empowering everyone to build reliable software".into(),
            keywords: vec!["empowering".into()],
            extracted_at: Utc::now(),
            kind: BookmarkType::Page,
        }
    }

    fn client(server: &MockServer, api_key: &str) -> SyncClient {
        SyncClient::new(SyncSettings {
            server_url: server.uri(),
            api_key: api_key.into(),
            user_id: 9,
        })
    }

    #[tokio::test]
    async fn success_posts_document_and_caches_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/documents"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("User-Agent", CLIENT_ID))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({
                "uid": 9,
                "url": "https://github.com/rust-lang/rust",
                "source": "https://github.com/rust-lang/rust",
                "tags": "开发, 代码",
                "evaluate": 0
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 17})))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        let attempted = record();
        let synced = client(&server, "secret")
            .sync_and_persist(attempted.clone(), &mut cache)
            .await
            .unwrap();

        assert_eq!(synced.response, json!({"id": 17}));
        assert!(synced.local_error.is_none());
        assert_eq!(synced.document.uid, 9);
        assert!(synced.document.content.starts_with("# rust-lang/rust"));
        assert_eq!(cache.entries().unwrap()[0], attempted);
    }

    #[tokio::test]
    async fn unauthorized_still_persists_locally_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/documents"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        let attempted = record();
        let err = client(&server, "wrong")
            .sync_and_persist(attempted.clone(), &mut cache)
            .await
            .unwrap_err();

        match err {
            CaptureError::Unauthorized { body } => assert_eq!(body, "bad key"),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        assert_eq!(cache.entries().unwrap()[0], attempted);
    }

    #[tokio::test]
    async fn missing_endpoint_and_server_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        let sync = client(&server, "");

        let first = sync.sync_and_persist(record(), &mut cache).await.unwrap_err();
        assert!(matches!(first, CaptureError::EndpointMissing { .. }));
        let second = sync.sync_and_persist(record(), &mut cache).await.unwrap_err();
        assert!(matches!(second, CaptureError::Server { status: 500, .. }));
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn no_authorization_header_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        client(&server, "")
            .sync_and_persist(record(), &mut cache)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_local() {
        let server = MockServer::start().await;
        let settings = SyncSettings {
            server_url: server.uri(),
            api_key: String::new(),
            user_id: 1,
        };
        drop(server);

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        let err = SyncClient::new(settings)
            .sync_and_persist(record(), &mut cache)
            .await
            .unwrap_err();
        assert!(err.is_sync_failure());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn both_paths_failing_reports_record_lost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = MemoryStore::failing();
        let mut cache = LocalCache::new(&store);
        let err = client(&server, "")
            .sync_and_persist(record(), &mut cache)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::RecordLost { .. }));
    }

    #[tokio::test]
    async fn local_failure_after_remote_success_is_carried_on_the_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
            .mount(&server)
            .await;

        let store = MemoryStore::failing();
        let mut cache = LocalCache::new(&store);
        let synced = client(&server, "")
            .sync_and_persist(record(), &mut cache)
            .await
            .unwrap();
        assert_eq!(synced.response, json!({"id": 3}));
        assert!(matches!(synced.local_error, Some(StoreError::Backend(_))));
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_decode_error_but_kept_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let mut cache = LocalCache::new(&store);
        let err = client(&server, "")
            .sync_and_persist(record(), &mut cache)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
        assert_eq!(cache.len().unwrap(), 1);
    }
}
