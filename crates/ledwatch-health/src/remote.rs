//! Remote uptime monitor lookups and the per-endpoint session pool.
//!
//! Sessions are keyed by endpoint URL. Each endpoint has its own slot
//! lock, so lookups against one endpoint never log in twice concurrently,
//! while different endpoints proceed independently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ledwatch_core::CheckResult;

/// Status vocabulary of the remote monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Down,
    Up,
    Pending,
    Maintenance,
}

impl RemoteStatus {
    /// Decode the numeric `monitor_status` gauge (0 down, 1 up, 2 pending, 3 maintenance).
    ///
    /// Fractional and non-finite samples are not statuses.
    pub fn from_gauge(value: f64) -> Option<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        match value as i64 {
            0 => Some(RemoteStatus::Down),
            1 => Some(RemoteStatus::Up),
            2 => Some(RemoteStatus::Pending),
            3 => Some(RemoteStatus::Maintenance),
            _ => None,
        }
    }
}

impl From<RemoteStatus> for CheckResult {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Up => CheckResult::Ok,
            RemoteStatus::Pending => CheckResult::Pending,
            RemoteStatus::Maintenance => CheckResult::Maintenance,
            RemoteStatus::Down => CheckResult::Fail,
        }
    }
}

/// Errors talking to the remote monitor.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote monitor {endpoint} rejected the token ({status})")]
    Unauthorized { endpoint: String, status: u16 },

    #[error("remote monitor {endpoint} answered {status}")]
    Status { endpoint: String, status: u16 },

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("monitor {0} not found")]
    MonitorNotFound(u64),

    #[error("remote monitor protocol error: {0}")]
    Protocol(String),
}

/// Login and status lookups against one kind of remote monitor.
pub trait RemoteMonitorClient: Send + Sync {
    /// Authenticated handle for one endpoint.
    type Session: Send;

    fn login(
        &self,
        endpoint: &str,
        token: &str,
    ) -> impl Future<Output = Result<Self::Session, RemoteError>> + Send;

    fn monitor_status(
        &self,
        session: &mut Self::Session,
        monitor_id: u64,
    ) -> impl Future<Output = Result<RemoteStatus, RemoteError>> + Send;

    fn disconnect(&self, session: Self::Session) -> impl Future<Output = ()> + Send;
}

type Slot<S> = Arc<Mutex<Option<S>>>;

/// Cache of live sessions, at most one per endpoint URL.
pub struct SessionPool<C: RemoteMonitorClient> {
    client: C,
    slots: Mutex<HashMap<String, Slot<C::Session>>>,
}

impl<C: RemoteMonitorClient> SessionPool<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn slot(&self, endpoint: &str) -> Slot<C::Session> {
        let mut slots = self.slots.lock().await;
        slots.entry(endpoint.to_string()).or_default().clone()
    }

    async fn login(&self, endpoint: &str, token: &str) -> Result<C::Session, RemoteError> {
        let session = self.client.login(endpoint, token).await?;
        info!(%endpoint, "remote monitor session opened");
        Ok(session)
    }

    /// Make sure a session exists for `endpoint`, logging in if needed.
    pub async fn acquire(&self, endpoint: &str, token: &str) -> Result<(), RemoteError> {
        let slot = self.slot(endpoint).await;
        let mut guard = slot.lock().await;
        if guard.is_none() {
            *guard = Some(self.login(endpoint, token).await?);
        }
        Ok(())
    }

    /// Look up one monitor, reusing the cached session.
    ///
    /// Any error drops the session so the next call logs in fresh.
    pub async fn status(
        &self,
        endpoint: &str,
        token: &str,
        monitor_id: u64,
    ) -> Result<RemoteStatus, RemoteError> {
        let slot = self.slot(endpoint).await;
        let mut guard = slot.lock().await;

        let mut session = match guard.take() {
            Some(session) => session,
            None => self.login(endpoint, token).await?,
        };

        match self.client.monitor_status(&mut session, monitor_id).await {
            Ok(status) => {
                *guard = Some(session);
                Ok(status)
            }
            Err(e) => {
                warn!(%endpoint, monitor_id, error = %e, "remote monitor session invalidated");
                self.client.disconnect(session).await;
                Err(e)
            }
        }
    }

    /// Drop the session for `endpoint`, if any.
    pub async fn invalidate(&self, endpoint: &str) {
        let slot = self.slot(endpoint).await;
        let session = slot.lock().await.take();
        if let Some(session) = session {
            self.client.disconnect(session).await;
            debug!(%endpoint, "remote monitor session invalidated");
        }
    }

    /// Whether a live session is cached for `endpoint`.
    pub async fn is_cached(&self, endpoint: &str) -> bool {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(endpoint).cloned()
        };
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Disconnect every cached session (for graceful shutdown).
    pub async fn release_all(&self) {
        let slots: Vec<(String, Slot<C::Session>)> = self.slots.lock().await.drain().collect();
        let mut released = 0;
        for (endpoint, slot) in slots {
            if let Some(session) = slot.lock().await.take() {
                self.client.disconnect(session).await;
                debug!(%endpoint, "remote monitor session released");
                released += 1;
            }
        }
        info!(released, "remote monitor sessions released");
    }
}

// ── Uptime Kuma ────────────────────────────────────────────────────

/// Client for Uptime Kuma's Prometheus `/metrics` endpoint.
///
/// Authenticates with an API key as the basic-auth password and reads
/// the `monitor_status` gauge for the requested monitor.
pub struct KumaClient {
    http: reqwest::Client,
}

/// A verified Uptime Kuma endpoint plus the key that unlocked it.
#[derive(Debug, Clone)]
pub struct KumaSession {
    metrics_url: String,
    token: String,
}

impl KumaClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ledwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn fetch_metrics(&self, metrics_url: &str, token: &str) -> Result<String, RemoteError> {
        let http_err = |source| RemoteError::Http {
            endpoint: metrics_url.to_string(),
            source,
        };

        let resp = self
            .http
            .get(metrics_url)
            .basic_auth("", Some(token))
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthorized {
                endpoint: metrics_url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                endpoint: metrics_url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(http_err)
    }
}

impl RemoteMonitorClient for KumaClient {
    type Session = KumaSession;

    async fn login(&self, endpoint: &str, token: &str) -> Result<KumaSession, RemoteError> {
        let metrics_url = format!("{}/metrics", endpoint.trim_end_matches('/'));
        self.fetch_metrics(&metrics_url, token).await?;
        Ok(KumaSession {
            metrics_url,
            token: token.to_string(),
        })
    }

    async fn monitor_status(
        &self,
        session: &mut KumaSession,
        monitor_id: u64,
    ) -> Result<RemoteStatus, RemoteError> {
        let body = self.fetch_metrics(&session.metrics_url, &session.token).await?;
        parse_monitor_status(&body, monitor_id)
    }

    async fn disconnect(&self, session: KumaSession) {
        // Plain HTTP; nothing to tear down server-side.
        debug!(endpoint = %session.metrics_url, "kuma session dropped");
    }
}

/// Find the `monitor_status` sample for `monitor_id` in a Prometheus text body.
pub fn parse_monitor_status(body: &str, monitor_id: u64) -> Result<RemoteStatus, RemoteError> {
    let wanted = monitor_id.to_string();

    for line in body.lines() {
        let Some(rest) = line.trim().strip_prefix("monitor_status{") else {
            continue;
        };
        let Some(end) = rest.rfind('}') else {
            continue;
        };
        let labels = parse_labels(&rest[..end]);
        let matches = labels
            .iter()
            .any(|(k, v)| k == "monitor_id" && *v == wanted);
        if !matches {
            continue;
        }

        let sample = rest[end + 1..].split_whitespace().next().unwrap_or_default();
        let value: f64 = sample
            .parse()
            .map_err(|_| RemoteError::Protocol(format!("bad monitor_status value {sample:?}")))?;
        return RemoteStatus::from_gauge(value)
            .ok_or_else(|| RemoteError::Protocol(format!("unknown monitor_status {value}")));
    }

    Err(RemoteError::MonitorNotFound(monitor_id))
}

/// Split a Prometheus label set (`a="x",b="y"`) into pairs.
fn parse_labels(s: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(',') | Some(' ')) {
            chars.next();
        }
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if key.is_empty() || chars.next() != Some('"') {
            break;
        }

        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => value.push('\n'),
                    Some(other) => value.push(other),
                    None => break,
                },
                '"' => break,
                c => value.push(c),
            }
        }
        out.push((key.trim().to_string(), value));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const METRICS: &str = r#"# HELP monitor_status Monitor Status (1 = UP, 0= DOWN, 2= PENDING, 3= MAINTENANCE)
# TYPE monitor_status gauge
monitor_status{monitor_id="1",monitor_name="blog, main",monitor_type="http",monitor_url="https://blog.example.com/",monitor_hostname="null",monitor_port="null"} 1
monitor_status{monitor_id="12",monitor_name="db",monitor_type="port",monitor_url="https://",monitor_hostname="10.0.0.5",monitor_port="5432"} 0
monitor_status{monitor_id="3",monitor_name="queue \"q\"",monitor_type="http"} 3
monitor_status{monitor_id="4",monitor_name="cron"} 2
monitor_response_time{monitor_id="5",monitor_name="api"} 120
"#;

    /// Client that records logins and replays a fixed status.
    struct FakeClient {
        logins: AtomicUsize,
        disconnects: AtomicUsize,
        status: std::sync::Mutex<Result<RemoteStatus, String>>,
    }

    impl FakeClient {
        fn new(status: RemoteStatus) -> Self {
            Self {
                logins: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                status: std::sync::Mutex::new(Ok(status)),
            }
        }

        fn fail_queries(&self) {
            *self.status.lock().unwrap() = Err("socket closed".into());
        }
    }

    impl RemoteMonitorClient for FakeClient {
        type Session = String;

        async fn login(&self, endpoint: &str, token: &str) -> Result<String, RemoteError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if token == "bad" {
                return Err(RemoteError::Unauthorized {
                    endpoint: endpoint.to_string(),
                    status: 401,
                });
            }
            Ok(endpoint.to_string())
        }

        async fn monitor_status(
            &self,
            _session: &mut String,
            _monitor_id: u64,
        ) -> Result<RemoteStatus, RemoteError> {
            let status = self.status.lock().unwrap().clone();
            status.map_err(RemoteError::Protocol)
        }

        async fn disconnect(&self, _session: String) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn parse_status_by_monitor_id() {
        assert_eq!(parse_monitor_status(METRICS, 1).unwrap(), RemoteStatus::Up);
        assert_eq!(parse_monitor_status(METRICS, 12).unwrap(), RemoteStatus::Down);
        assert_eq!(parse_monitor_status(METRICS, 3).unwrap(), RemoteStatus::Maintenance);
        assert_eq!(parse_monitor_status(METRICS, 4).unwrap(), RemoteStatus::Pending);
    }

    #[test]
    fn parse_status_ignores_other_metrics() {
        assert!(matches!(
            parse_monitor_status(METRICS, 5),
            Err(RemoteError::MonitorNotFound(5))
        ));
        assert!(matches!(
            parse_monitor_status(METRICS, 2),
            Err(RemoteError::MonitorNotFound(2))
        ));
    }

    #[test]
    fn parse_status_rejects_non_integer_gauge() {
        for sample in ["1.9", "NaN", "inf", "-0.5"] {
            let body = format!("monitor_status{{monitor_id=\"1\"}} {sample}\n");
            assert!(
                matches!(parse_monitor_status(&body, 1), Err(RemoteError::Protocol(_))),
                "sample {sample} should be rejected"
            );
        }
        assert_eq!(RemoteStatus::from_gauge(1.9), None);
        assert_eq!(RemoteStatus::from_gauge(f64::NAN), None);
        assert_eq!(RemoteStatus::from_gauge(3.0), Some(RemoteStatus::Maintenance));
    }

    #[test]
    fn parse_labels_handles_escapes_and_commas() {
        let labels = parse_labels(r#"monitor_id="3",monitor_name="a, \"b\"""#);
        assert_eq!(
            labels,
            vec![
                ("monitor_id".to_string(), "3".to_string()),
                ("monitor_name".to_string(), "a, \"b\"".to_string()),
            ]
        );
    }

    #[test]
    fn remote_status_maps_to_check_result() {
        assert_eq!(CheckResult::from(RemoteStatus::Up), CheckResult::Ok);
        assert_eq!(CheckResult::from(RemoteStatus::Pending), CheckResult::Pending);
        assert_eq!(CheckResult::from(RemoteStatus::Maintenance), CheckResult::Maintenance);
        assert_eq!(CheckResult::from(RemoteStatus::Down), CheckResult::Fail);
        assert_eq!(RemoteStatus::from_gauge(7.0), None);
    }

    #[tokio::test]
    async fn pool_reuses_session_per_endpoint() {
        let pool = SessionPool::new(FakeClient::new(RemoteStatus::Up));

        for id in [1, 2, 3] {
            let status = pool.status("https://kuma.example.com", "t", id).await.unwrap();
            assert_eq!(status, RemoteStatus::Up);
        }
        assert_eq!(pool.client().logins.load(Ordering::SeqCst), 1);
        assert!(pool.is_cached("https://kuma.example.com").await);

        pool.status("https://other.example.com", "t", 1).await.unwrap();
        assert_eq!(pool.client().logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pool_invalidates_on_query_error() {
        let pool = SessionPool::new(FakeClient::new(RemoteStatus::Up));
        pool.acquire("https://kuma.example.com", "t").await.unwrap();

        pool.client().fail_queries();
        let err = pool.status("https://kuma.example.com", "t", 1).await;
        assert!(err.is_err());
        assert!(!pool.is_cached("https://kuma.example.com").await);
        assert_eq!(pool.client().disconnects.load(Ordering::SeqCst), 1);

        // Next lookup logs in again.
        *pool.client().status.lock().unwrap() = Ok(RemoteStatus::Maintenance);
        let status = pool.status("https://kuma.example.com", "t", 1).await.unwrap();
        assert_eq!(status, RemoteStatus::Maintenance);
        assert_eq!(pool.client().logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pool_login_failure_caches_nothing() {
        let pool = SessionPool::new(FakeClient::new(RemoteStatus::Up));
        let err = pool.status("https://kuma.example.com", "bad", 1).await;
        assert!(matches!(err, Err(RemoteError::Unauthorized { status: 401, .. })));
        assert!(!pool.is_cached("https://kuma.example.com").await);
    }

    #[tokio::test]
    async fn pool_concurrent_lookups_login_once() {
        let pool = Arc::new(SessionPool::new(FakeClient::new(RemoteStatus::Up)));
        let lookups = (0..8).map(|id| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.status("https://kuma.example.com", "t", id).await })
        });
        for handle in lookups.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(pool.client().logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_all_disconnects_every_session() {
        let pool = SessionPool::new(FakeClient::new(RemoteStatus::Up));
        pool.acquire("https://a.example.com", "t").await.unwrap();
        pool.acquire("https://b.example.com", "t").await.unwrap();

        pool.release_all().await;
        assert_eq!(pool.client().disconnects.load(Ordering::SeqCst), 2);
        assert!(!pool.is_cached("https://a.example.com").await);

        pool.invalidate("https://a.example.com").await;
        assert_eq!(pool.client().disconnects.load(Ordering::SeqCst), 2);
    }

    /// Answer each incoming connection with the next canned response.
    async fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn kuma_client_login_and_status() {
        let endpoint = serve(vec![
            http_response("200 OK", METRICS),
            http_response("200 OK", METRICS),
        ])
        .await;

        let client = KumaClient::new(Duration::from_secs(5)).unwrap();
        let mut session = client.login(&format!("{endpoint}/"), "key").await.unwrap();
        assert_eq!(session.metrics_url, format!("{endpoint}/metrics"));

        let status = client.monitor_status(&mut session, 12).await.unwrap();
        assert_eq!(status, RemoteStatus::Down);
    }

    #[tokio::test]
    async fn kuma_client_rejected_token() {
        let endpoint = serve(vec![http_response("401 Unauthorized", "")]).await;
        let client = KumaClient::new(Duration::from_secs(5)).unwrap();
        let err = client.login(&endpoint, "wrong").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unauthorized { status: 401, .. }));
    }
}
