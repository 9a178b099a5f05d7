use crate::config::{RaffleConfig, RemoteConfig};
use crate::error::{RaffleError, Result};
use crate::sync::backend::RemoteBackend;
use crate::types::SharedSessionState;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const API_KEY_HEADER: &str = "x-api-key";

/// Sync endpoint client. `GET` returns the current document, `POST` takes a
/// (possibly partial) document and merges it. Subscriptions are emulated by
/// polling.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl HttpBackend {
    pub fn new(remote: &RemoteConfig, config: &RaffleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/sync", remote.url.trim_end_matches('/')),
            api_key: remote.api_key.clone(),
            poll_interval: config.poll_interval(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

/// Digest over the synchronised content of a raw document. The endpoint
/// re-stamps `lastUpdated` on every read, so it is left out.
fn raw_digest(document: &Value) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&document["participantPool"])?);
    hasher.update(serde_json::to_vec(&document["prizeLedger"])?);
    Ok(hex::encode(hasher.finalize()))
}

fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn fetch(&self) -> Result<Option<Value>> {
        let response = self.authorize(self.client.get(&self.endpoint)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        let document: Value = response.json().await?;

        if is_empty_document(&document) {
            Ok(None)
        } else {
            Ok(Some(document))
        }
    }

    async fn store(&self, state: &SharedSessionState) -> Result<()> {
        let response = self
            .authorize(self.client.post(&self.endpoint))
            .json(state)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RaffleError::network(format!(
                "POST {} returned {}: {}",
                self.endpoint, status, body
            )));
        }

        Ok(())
    }

    async fn watch(&self) -> Result<mpsc::Receiver<Value>> {
        let (tx, rx) = mpsc::channel(8);
        let backend = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(backend.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately; the caller has just read
            ticker.tick().await;

            let mut last_digest: Option<String> = None;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                let document = match backend.fetch().await {
                    Ok(Some(document)) => document,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("Polling {} failed: {}", backend.endpoint, e);
                        break;
                    }
                };

                let digest = match raw_digest(&document) {
                    Ok(digest) => digest,
                    Err(e) => {
                        tracing::warn!("Could not digest polled document: {}", e);
                        continue;
                    }
                };

                if last_digest.as_deref() == Some(digest.as_str()) {
                    continue;
                }

                tracing::debug!("Remote document changed ({}...)", &digest[..12]);
                last_digest = Some(digest);

                if tx.send(document).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::Storage;
    use crate::sync::{SyncManager, SyncMode};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const WAIT: Duration = Duration::from_secs(2);

    /// Local HTTP endpoint answering each connection with the next canned
    /// `(status, body)`, then 500 once they run out.
    struct StubEndpoint {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubEndpoint {
        async fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let seen = requests.clone();
            let mut responses = VecDeque::from(responses);
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let request = read_request(&mut socket).await;
                    seen.lock().push(request);

                    let (status, body) = responses.pop_front().unwrap_or((500, "exhausted"));
                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { url, requests }
        }

        fn backend(&self, config: &RaffleConfig) -> HttpBackend {
            let mut remote = RemoteConfig::new(self.url.clone());
            remote.api_key = Some("secret".to_string());
            HttpBackend::new(&remote, config).unwrap()
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }

        String::from_utf8_lossy(&buf).to_string()
    }

    fn fast_polling() -> RaffleConfig {
        RaffleConfig {
            poll_interval_ms: 10,
            ..RaffleConfig::default()
        }
    }

    const DOC_A: &str = r#"{"participantPool":[{"id":"1001","name":"Alice","department":"HR"}],"prizeLedger":{"remaining":10,"winners":[]},"lastUpdated":1700000000000}"#;
    const DOC_A_RESTAMPED: &str = r#"{"participantPool":[{"id":"1001","name":"Alice","department":"HR"}],"prizeLedger":{"remaining":10,"winners":[]},"lastUpdated":1700000005000}"#;
    const DOC_B: &str = r#"{"participantPool":[{"id":"1002","name":"Bob","department":"IT"}],"prizeLedger":{"remaining":10,"winners":[]},"lastUpdated":1700000009000}"#;

    #[test]
    fn test_endpoint_normalisation() {
        let config = RaffleConfig::default();
        let backend =
            HttpBackend::new(&RemoteConfig::new("https://raffle.example.com/"), &config).unwrap();
        assert_eq!(backend.endpoint(), "https://raffle.example.com/api/sync");
    }

    #[test]
    fn test_raw_digest_ignores_last_updated() {
        let a = json!({"participantPool": [], "prizeLedger": {"remaining": 10, "winners": []}, "lastUpdated": 1});
        let b = json!({"participantPool": [], "prizeLedger": {"remaining": 10, "winners": []}, "lastUpdated": 2});
        let c = json!({"participantPool": [{"id": "1", "name": "A"}], "prizeLedger": {"remaining": 10, "winners": []}});

        assert_eq!(raw_digest(&a).unwrap(), raw_digest(&b).unwrap());
        assert_ne!(raw_digest(&a).unwrap(), raw_digest(&c).unwrap());
    }

    #[test]
    fn test_empty_documents() {
        assert!(is_empty_document(&Value::Null));
        assert!(is_empty_document(&json!({})));
        assert!(!is_empty_document(&json!({"participantPool": []})));
    }

    #[tokio::test]
    async fn test_fetch_treats_missing_and_empty_as_absent() {
        let stub = StubEndpoint::start(vec![(404, ""), (200, "{}"), (200, "null"), (200, DOC_A)]).await;
        let backend = stub.backend(&RaffleConfig::default());

        assert!(backend.fetch().await.unwrap().is_none());
        assert!(backend.fetch().await.unwrap().is_none());
        assert!(backend.fetch().await.unwrap().is_none());

        let document = backend.fetch().await.unwrap().unwrap();
        assert_eq!(document["participantPool"][0]["id"], "1001");

        let requests = stub.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests[0].starts_with("GET /api/sync "));
        assert!(requests[0].to_lowercase().contains("x-api-key: secret"));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_an_error() {
        let stub = StubEndpoint::start(vec![(503, "")]).await;
        let backend = stub.backend(&RaffleConfig::default());

        assert!(matches!(backend.fetch().await, Err(RaffleError::Network(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_non_success() {
        let stub = StubEndpoint::start(vec![(500, "boom"), (200, "{}")]).await;
        let backend = stub.backend(&RaffleConfig::default());
        let state = SharedSessionState::initial(10, chrono::Utc::now());

        let err = backend.store(&state).await.unwrap_err();
        assert!(matches!(err, RaffleError::Network(ref msg) if msg.contains("500")));

        backend.store(&state).await.unwrap();

        let requests = stub.requests();
        assert!(requests[1].starts_with("POST /api/sync "));
        assert!(requests[1].contains("\"prizeLedger\""));
    }

    #[tokio::test]
    async fn test_watch_forwards_only_changes() {
        let stub = StubEndpoint::start(vec![
            (200, DOC_A),
            (200, DOC_A_RESTAMPED),
            (404, ""),
            (200, DOC_B),
            (500, "down"),
        ])
        .await;
        let backend = stub.backend(&fast_polling());
        let mut events = backend.watch().await.unwrap();

        let first = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(first["participantPool"][0]["id"], "1001");

        let second = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(second["participantPool"][0]["id"], "1002");

        // the failed poll ends the subscription
        assert!(tokio::time::timeout(WAIT, events.recv()).await.unwrap().is_none());
        assert_eq!(stub.requests().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_poll_degrades_client() {
        let stub = StubEndpoint::start(vec![(200, DOC_A), (500, "down")]).await;
        let mut remote = RemoteConfig::new(stub.url.clone());
        remote.api_key = Some("secret".to_string());
        let config = fast_polling().with_remote(remote);

        let backend = crate::sync::backend_from_config(&config).unwrap();
        let manager = SyncManager::connect(
            &config,
            Arc::new(Storage::in_memory().await.unwrap()),
            backend,
            Arc::new(SystemClock),
        )
        .await
        .unwrap();
        assert_eq!(manager.read().participant_pool[0].id, "1001");

        let mut mode = manager.watch_mode();
        tokio::time::timeout(WAIT, mode.wait_for(|m| *m == SyncMode::Degraded))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manager.read().participant_pool[0].id, "1001");
    }
}
