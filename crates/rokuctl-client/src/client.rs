//! The device client facade.
//!
//! [`RokuClient`] owns the HTTP client, the [`CommandQueue`], and the
//! [`DebugChannel`]. Every control action builds one queued operation, so a
//! caller can fire off a whole key sequence without awaiting each press:
//!
//! ```rust,no_run
//! use rokuctl_client::RokuClient;
//! use rokuctl_core::Key;
//!
//! # async fn example() -> rokuctl_core::Result<()> {
//! let client = RokuClient::builder("192.168.1.40").build()?;
//! client.press(Key::Home);
//! client.press(Key::Down);
//! let selected = client.press(Key::Select).await;
//! # selected
//! # }
//! ```
//!
//! Operations execute strictly in submission order, one at a time. The
//! handles returned by each method resolve with that operation's own result;
//! an ignored handle is an ignored error.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::sync::broadcast;
use url::Url;

use rokuctl_core::keys::Key;
use rokuctl_core::ports::LogPort;
use rokuctl_core::prelude::*;

use crate::config::DeviceConfig;
use crate::debug::{ChannelPhase, DebugChannel, DEFAULT_GRACE};
use crate::query::{self, AppRecord, DeviceInfo};
use crate::queue::{CommandHandle, CommandQueue};

/// Developer-mode username for the sideload installer.
const DEV_USER: &str = "rokudev";

/// What to launch: an app id, an installed channel's name, or a media URL
/// played through the dev channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Launch by numeric app id
    Id(u32),
    /// Launch an installed channel by display name (case-insensitive)
    Name(String),
    /// Probe a media URL with HEAD and play it through the dev channel
    Url(String),
}

impl From<u32> for LaunchTarget {
    fn from(id: u32) -> Self {
        LaunchTarget::Id(id)
    }
}

impl From<&str> for LaunchTarget {
    /// Strings containing `://` are treated as media URLs, anything else as
    /// a channel name.
    fn from(s: &str) -> Self {
        if s.contains("://") {
            LaunchTarget::Url(s.to_string())
        } else {
            LaunchTarget::Name(s.to_string())
        }
    }
}

impl From<String> for LaunchTarget {
    fn from(s: String) -> Self {
        LaunchTarget::from(s.as_str())
    }
}

/// Builder for [`RokuClient`].
#[derive(Debug, Clone)]
pub struct RokuClientBuilder {
    host: String,
    ecp_port: u16,
    installer_port: u16,
    dev_password: Option<String>,
    log_port: Option<LogPort>,
    grace: Duration,
    http: Option<reqwest::Client>,
}

impl RokuClientBuilder {
    fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ecp_port: 8060,
            installer_port: 80,
            dev_password: None,
            log_port: None,
            grace: DEFAULT_GRACE,
            http: None,
        }
    }

    /// Override the external control port (default 8060).
    pub fn ecp_port(mut self, port: u16) -> Self {
        self.ecp_port = port;
        self
    }

    /// Override the developer installer port (default 80).
    pub fn installer_port(mut self, port: u16) -> Self {
        self.installer_port = port;
        self
    }

    /// Developer-mode password, needed for [`RokuClient::install`].
    pub fn dev_password(mut self, password: impl Into<String>) -> Self {
        self.dev_password = Some(password.into());
        self
    }

    /// Attach the debug log channel to this port on construction. The
    /// connect is queued first, so it is ordered before any command issued
    /// after `build()` returns.
    pub fn log_port(mut self, port: LogPort) -> Self {
        self.log_port = Some(port);
        self
    }

    /// Override the backlog grace window (default one second).
    pub fn log_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Supply a pre-configured HTTP client (proxies, timeouts, ...).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the client. Must be called within a Tokio runtime: queued
    /// operations (including the initial log connect, when configured)
    /// execute on background tasks.
    pub fn build(self) -> Result<RokuClient> {
        let base_url = Url::parse(&format!("http://{}:{}/", self.host, self.ecp_port))
            .map_err(|e| Error::config(format!("bad device host '{}': {}", self.host, e)))?;

        let client = RokuClient {
            host: self.host.clone(),
            base_url,
            installer_port: self.installer_port,
            dev_password: self.dev_password,
            http: self.http.unwrap_or_default(),
            queue: CommandQueue::new(),
            debug: DebugChannel::new(self.host, self.grace),
        };

        if let Some(port) = self.log_port {
            // Errors surface through tracing; an explicit connect_log call
            // gives callers a handle to await instead.
            drop(client.connect_log(port));
        }

        Ok(client)
    }
}

/// Async client for one device.
///
/// Cloning is cheap; clones share the command queue and the log channel.
#[derive(Debug, Clone)]
pub struct RokuClient {
    host: String,
    base_url: Url,
    installer_port: u16,
    dev_password: Option<String>,
    http: reqwest::Client,
    queue: CommandQueue,
    debug: DebugChannel,
}

impl RokuClient {
    /// Start building a client for the given host or IP.
    pub fn builder(host: impl Into<String>) -> RokuClientBuilder {
        RokuClientBuilder::new(host)
    }

    /// Build a client from a [`DeviceConfig`].
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        let mut builder = Self::builder(config.host.clone())
            .ecp_port(config.ecp_port)
            .log_grace(Duration::from_millis(config.grace_ms));
        if let Some(password) = &config.dev_password {
            builder = builder.dev_password(password.clone());
        }
        if let Some(port) = config.log_port()? {
            builder = builder.log_port(port);
        }
        builder.build()
    }

    /// Device hostname or IP this client talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL of the control surface.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────
    // Remote control
    // ─────────────────────────────────────────────────────────────

    /// Queue a single key press.
    pub fn press(&self, key: Key) -> CommandHandle<()> {
        let http = self.http.clone();
        let base = self.base_url.clone();
        let segment = key.request_segment();

        self.queue.submit(format!("keypress {}", segment), async move {
            let context = format!("keypress/{}", segment);
            let url = join_url(&base, &context)?;
            let response = http.post(url).send().await?;
            ensure_success(response, &context)?;
            Ok(())
        })
    }

    /// Queue one literal key press per character, strictly in input order.
    ///
    /// Returns the per-character handles; characters are pressed in order
    /// because the queue preserves submission order.
    pub fn type_text(&self, text: &str) -> Vec<CommandHandle<()>> {
        text.chars().map(|c| self.press(Key::Literal(c))).collect()
    }

    /// Queue a pause between commands.
    pub fn delay(&self, duration: Duration) -> CommandHandle<()> {
        self.queue.submit(format!("delay {:?}", duration), async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    /// Send free-form input parameters to the focused channel.
    ///
    /// Sent immediately, bypassing the command queue.
    pub async fn input<I, K, V>(&self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = join_url(&self.base_url, "input")?;
        url.query_pairs_mut().extend_pairs(params);
        let response = self.http.post(url).send().await?;
        ensure_success(response, "input")?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Launching
    // ─────────────────────────────────────────────────────────────

    /// Queue a channel launch.
    pub fn launch(&self, target: impl Into<LaunchTarget>) -> CommandHandle<()> {
        match target.into() {
            LaunchTarget::Id(id) => self.launch_with_args(&id.to_string(), &[]),
            LaunchTarget::Name(name) => {
                let http = self.http.clone();
                let base = self.base_url.clone();
                self.queue.submit(format!("launch '{}'", name), async move {
                    // Fetch directly rather than re-queueing: this operation
                    // is already the one in flight, and a nested queued query
                    // could never start before it completed.
                    let apps = fetch_apps(&http, &base).await?;
                    let wanted = name.to_lowercase();
                    let app = apps
                        .iter()
                        .find(|app| app.name.to_lowercase() == wanted)
                        .ok_or_else(|| Error::app_not_found(name.clone()))?;
                    post_launch(&http, &base, &app.id.to_string(), &[]).await
                })
            }
            LaunchTarget::Url(media_url) => {
                let http = self.http.clone();
                let base = self.base_url.clone();
                self.queue.submit("launch url", async move {
                    let head = http.head(&media_url).send().await?;
                    let head = ensure_success(head, &media_url)?;
                    let content_type = head
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| {
                            Error::protocol(format!("no content-type from {}", media_url))
                        })?;
                    // "video/mp4; codecs=..." -> "mp4"
                    let essence = content_type.split(';').next().unwrap_or(content_type).trim();
                    let streamformat = essence.rsplit('/').next().unwrap_or(essence);

                    post_launch(
                        &http,
                        &base,
                        "dev",
                        &[("url", media_url.as_str()), ("streamformat", streamformat)],
                    )
                    .await
                })
            }
        }
    }

    /// Queue a launch of an app id or name with explicit query arguments.
    pub fn launch_with_args(&self, app: &str, args: &[(&str, &str)]) -> CommandHandle<()> {
        let http = self.http.clone();
        let base = self.base_url.clone();
        let app = app.to_string();
        let args: Vec<(String, String)> = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        self.queue.submit(format!("launch {}", app), async move {
            let pairs: Vec<(&str, &str)> = args
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            post_launch(&http, &base, &app, &pairs).await
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Sideloading
    // ─────────────────────────────────────────────────────────────

    /// Queue a sideload of a channel archive through the developer
    /// installer (port 80, not the control port).
    ///
    /// Credentials (`rokudev` / the configured dev password) are only sent
    /// after the installer answers with a 401 challenge.
    pub fn install(&self, archive: impl Into<PathBuf>) -> CommandHandle<()> {
        let http = self.http.clone();
        let host = self.host.clone();
        let installer_port = self.installer_port;
        let password = self.dev_password.clone().unwrap_or_default();
        let path = archive.into();

        self.queue.submit("plugin install", async move {
            let bytes = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "archive.zip".to_string());
            let url = format!("http://{}:{}/plugin_install", host, installer_port);

            let form = install_form(bytes.clone(), file_name.clone())?;
            let response = http.post(&url).multipart(form).send().await?;

            let response = if response.status() == StatusCode::UNAUTHORIZED {
                debug!("installer challenged, retrying with credentials");
                let form = install_form(bytes, file_name)?;
                http.post(&url)
                    .multipart(form)
                    .basic_auth(DEV_USER, Some(&password))
                    .send()
                    .await?
            } else {
                response
            };

            if !response.status().is_success() {
                return Err(Error::install(format!(
                    "installer returned {}",
                    response.status()
                )));
            }
            info!("sideloaded {}", path.display());
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    /// Queue an installed-apps query.
    pub fn apps(&self) -> CommandHandle<Vec<AppRecord>> {
        let http = self.http.clone();
        let base = self.base_url.clone();
        self.queue
            .submit("query apps", async move { fetch_apps(&http, &base).await })
    }

    /// Queue a device-info query.
    pub fn device_info(&self) -> CommandHandle<DeviceInfo> {
        let http = self.http.clone();
        let base = self.base_url.clone();
        self.queue.submit("query device info", async move {
            let url = join_url(&base, "")?;
            let response = http.get(url).send().await?;
            let response = ensure_success(response, "device info")?;
            let body = response.text().await?;
            query::parse_device_info(&body)
        })
    }

    /// Fetch a channel's icon. Sent immediately, bypassing the queue; the
    /// returned response streams the image bytes.
    pub async fn icon(&self, app_id: u32) -> Result<reqwest::Response> {
        let context = format!("query/icon/{}", app_id);
        let url = join_url(&self.base_url, &context)?;
        let response = self.http.get(url).send().await?;
        ensure_success(response, &context)
    }

    // ─────────────────────────────────────────────────────────────
    // Debug log channel
    // ─────────────────────────────────────────────────────────────

    /// Connect (or reconnect) the debug log channel. Any previous socket is
    /// force-closed first; the connect and the grace window both run through
    /// the command queue.
    pub fn connect_log(&self, port: LogPort) -> CommandHandle<()> {
        info!("attaching debug log on {}", port);
        self.debug.connect(&self.queue, port.port())
    }

    /// Force-close the debug log socket. Idempotent.
    pub fn destroy_log(&self) {
        self.debug.destroy();
    }

    /// Subscribe to live debug log lines.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.debug.subscribe()
    }

    /// Current phase of the debug log channel.
    pub fn log_phase(&self) -> ChannelPhase {
        self.debug.phase()
    }
}

// ─────────────────────────────────────────────────────────────────
// Request helpers
// ─────────────────────────────────────────────────────────────────

fn join_url(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::protocol(format!("bad request path '{}': {}", path, e)))
}

fn ensure_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::status(status.as_u16(), context))
    }
}

async fn fetch_apps(http: &reqwest::Client, base: &Url) -> Result<Vec<AppRecord>> {
    let url = join_url(base, "query/apps")?;
    let response = http.get(url).send().await?;
    let response = ensure_success(response, "query/apps")?;
    let body = response.text().await?;
    query::parse_apps(&body)
}

async fn post_launch(
    http: &reqwest::Client,
    base: &Url,
    app: &str,
    args: &[(&str, &str)],
) -> Result<()> {
    let mut url = join_url(base, &format!("launch/{}", app))?;
    if !args.is_empty() {
        url.query_pairs_mut().extend_pairs(args.iter().copied());
    }
    let context = format!("launch/{}", app);
    let response = http.post(url).send().await?;
    ensure_success(response, &context)?;
    Ok(())
}

fn install_form(bytes: Vec<u8>, file_name: String) -> Result<Form> {
    let archive = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/zip")?;
    Ok(Form::new()
        .text("mysubmit", "Install")
        .text("passwd", "")
        .part("archive", archive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_target_from() {
        assert_eq!(LaunchTarget::from(12u32), LaunchTarget::Id(12));
        assert_eq!(
            LaunchTarget::from("Netflix"),
            LaunchTarget::Name("Netflix".to_string())
        );
        assert_eq!(
            LaunchTarget::from("http://example.com/a.mp4"),
            LaunchTarget::Url("http://example.com/a.mp4".to_string())
        );
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let client = RokuClient::builder("192.168.1.40").build().unwrap();
        assert_eq!(client.host(), "192.168.1.40");
        assert_eq!(client.base_url().as_str(), "http://192.168.1.40:8060/");
        assert_eq!(client.log_phase(), ChannelPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_builder_custom_port() {
        let client = RokuClient::builder("roku.lan")
            .ecp_port(9060)
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://roku.lan:9060/");
    }

    #[tokio::test]
    async fn test_type_text_queues_one_press_per_char() {
        let client = RokuClient::builder("127.0.0.1").build().unwrap();
        let handles = client.type_text("AB");
        assert_eq!(handles.len(), 2);
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = DeviceConfig::new("10.0.0.9");
        let client = RokuClient::from_config(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "http://10.0.0.9:8060/");
    }
}
