//! Check providers.
//!
//! Every provider folds its outcome into a [`CheckResult`]; transport
//! errors are logged and reported as `Fail`, never propagated.

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use ledwatch_core::config::RemoteMonitorConfig;
use ledwatch_core::{CheckResult, CheckSpec, ServiceSpec};

use crate::remote::{KumaClient, RemoteMonitorClient, SessionPool};

/// Something that can check a service.
pub trait Probe: Send + Sync {
    /// Run one check. Never fails; problems come back as [`CheckResult::Fail`].
    fn check(&self, service: &ServiceSpec) -> impl Future<Output = CheckResult> + Send;

    /// Release long-lived resources at shutdown.
    fn release(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Timeouts and attempt counts for the built-in probes.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Echo requests per ping check.
    pub ping_attempts: u32,
    /// Deadline for each echo reply.
    pub ping_timeout: Duration,
    pub http_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_attempts: 2,
            ping_timeout: Duration::from_secs(2),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Production [`Probe`]: ping, HTTP, HTTP through a proxy, and remote monitor lookups.
pub struct Checker<C: RemoteMonitorClient = KumaClient> {
    settings: ProbeSettings,
    /// Direct client; ignores proxy environment variables.
    http: reqwest::Client,
    /// One client per proxy URL.
    proxied: Mutex<HashMap<String, reqwest::Client>>,
    sessions: Arc<SessionPool<C>>,
    remote: Option<RemoteMonitorConfig>,
}

impl<C: RemoteMonitorClient> Checker<C> {
    pub fn new(
        settings: ProbeSettings,
        sessions: Arc<SessionPool<C>>,
        remote: Option<RemoteMonitorConfig>,
    ) -> Result<Self, reqwest::Error> {
        let http = http_client_builder(&settings).no_proxy().build()?;
        Ok(Self {
            settings,
            http,
            proxied: Mutex::new(HashMap::new()),
            sessions,
            remote,
        })
    }

    pub fn sessions(&self) -> &Arc<SessionPool<C>> {
        &self.sessions
    }

    fn proxied_client(&self, proxy: &str) -> Result<reqwest::Client, reqwest::Error> {
        // A poisoned cache only ever holds fully built clients.
        let mut cache = self.proxied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = cache.get(proxy) {
            return Ok(client.clone());
        }
        let client = http_client_builder(&self.settings)
            .proxy(reqwest::Proxy::all(proxy)?)
            .build()?;
        debug!(%proxy, "proxy client created");
        cache.insert(proxy.to_string(), client.clone());
        Ok(client)
    }

    async fn check_proxied(&self, url: &str, proxy: &str) -> CheckResult {
        match self.proxied_client(proxy) {
            Ok(client) => http_probe(&client, url).await,
            Err(e) => {
                warn!(%proxy, error = %e, "invalid proxy");
                CheckResult::Fail
            }
        }
    }

    async fn check_remote(&self, monitor_id: u64) -> CheckResult {
        let Some(remote) = self
            .remote
            .as_ref()
            .filter(|r| !r.url.is_empty() && !r.token.is_empty())
        else {
            debug!(monitor_id, "remote monitor not configured");
            return CheckResult::Fail;
        };

        match self
            .sessions
            .status(&remote.url, &remote.token, monitor_id)
            .await
        {
            Ok(status) => status.into(),
            Err(e) => {
                warn!(monitor_id, error = %e, "remote monitor lookup failed");
                CheckResult::Fail
            }
        }
    }
}

impl<C: RemoteMonitorClient> Probe for Checker<C> {
    async fn check(&self, service: &ServiceSpec) -> CheckResult {
        let result = match &service.check {
            CheckSpec::Ping { host } => {
                ping_probe(host, self.settings.ping_attempts, self.settings.ping_timeout).await
            }
            CheckSpec::Http { url } => http_probe(&self.http, url).await,
            CheckSpec::HttpProxy { url, proxy } => self.check_proxied(url, proxy).await,
            CheckSpec::RemoteMonitor { monitor_id } => self.check_remote(*monitor_id).await,
            CheckSpec::Placeholder => CheckResult::Placeholder,
        };
        info!(service = %service.name, method = service.check.method(), %result, "check finished");
        result
    }

    async fn release(&self) {
        self.sessions.release_all().await;
    }
}

fn http_client_builder(settings: &ProbeSettings) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .user_agent(concat!("ledwatch/", env!("CARGO_PKG_VERSION")))
}

/// GET `url`. Anything below 500 counts as up: a 404 still proves the server answers.
pub async fn http_probe(client: &reqwest::Client, url: &str) -> CheckResult {
    match client.get(url).send().await {
        Ok(resp) if resp.status().as_u16() < 500 => CheckResult::Ok,
        Ok(resp) => {
            debug!(%url, status = %resp.status(), "http check server error");
            CheckResult::Fail
        }
        Err(e) => {
            debug!(%url, error = %e, "http check failed");
            CheckResult::Fail
        }
    }
}

/// Ping `host` through the system `ping` binary. Exit status 0 is up.
pub async fn ping_probe(host: &str, attempts: u32, timeout: Duration) -> CheckResult {
    // Refuse anything ping would parse as an option.
    if host.is_empty() || host.starts_with('-') {
        warn!(%host, "refusing to ping invalid host");
        return CheckResult::Fail;
    }

    let attempts = attempts.max(1);
    let mut cmd = tokio::process::Command::new("ping");
    if cfg!(windows) {
        cmd.arg("-n")
            .arg(attempts.to_string())
            .arg("-w")
            .arg(timeout.as_millis().to_string());
    } else {
        cmd.arg("-c").arg(attempts.to_string());
        if cfg!(target_os = "linux") {
            cmd.arg("-W").arg(timeout.as_secs().max(1).to_string());
        }
    }
    cmd.arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let deadline = timeout * attempts + Duration::from_secs(1);
    match tokio::time::timeout(deadline, cmd.status()).await {
        Ok(Ok(status)) if status.success() => CheckResult::Ok,
        Ok(Ok(status)) => {
            debug!(%host, code = ?status.code(), "ping failed");
            CheckResult::Fail
        }
        Ok(Err(e)) => {
            warn!(%host, error = %e, "could not run ping");
            CheckResult::Fail
        }
        Err(_) => {
            debug!(%host, "ping timed out");
            CheckResult::Fail
        }
    }
}
