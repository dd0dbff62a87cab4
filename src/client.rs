use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, trace};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    control_body, control_payload, ACCEPT_JSON, CONTROL_CONTENT_TYPE, CONTROL_PATH,
    OVERVIEW_PATH,
};
use crate::types::Action;
use crate::{Error, Result};

/// Hard limit on every request to the machine.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct XeniaClientBuilder {
    host: String,
    protocol: String,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl XeniaClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: "http".to_string(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<XeniaClient> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(XeniaClient {
            http,
            base_url: format!("{}://{}", self.protocol, self.host),
            host: self.host,
            logger,
        })
    }
}

/// HTTP client for a single machine. Stateless apart from the optional
/// message log; no retries, callers decide what a failure means.
pub struct XeniaClient {
    http: reqwest::Client,
    host: String,
    base_url: String,
    logger: Option<Mutex<MessageLogger>>,
}

impl XeniaClient {
    pub fn builder(host: impl Into<String>) -> XeniaClientBuilder {
        XeniaClientBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `GET /api/v2/overview`. 401 is reported as [`Error::Auth`], any other
    /// non-2xx as [`Error::Http`].
    pub async fn fetch_status(&self) -> Result<Value> {
        let url = format!("{}{}", self.base_url, OVERVIEW_PATH);
        debug!(url = %url, "fetching status");
        self.log(|logger| logger.log_request("GET", OVERVIEW_PATH));

        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .await?;
        let status = resp.status();

        if let Err(e) = check_status(status) {
            debug!(status = status.as_u16(), "status poll rejected");
            self.log(|logger| logger.log_poll(status.as_u16(), &Value::Null));
            return Err(e);
        }

        let body = resp.text().await?;
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| Error::Protocol(format!("status body is not JSON: {e}")))?;

        trace!(body = %body, "status poll");
        self.log(|logger| logger.log_poll(status.as_u16(), &data));
        Ok(data)
    }

    /// `POST /api/v2/machine/control`. Does not touch any cached state.
    pub async fn send_control(&self, action: Action) -> Result<()> {
        let url = format!("{}{}", self.base_url, CONTROL_PATH);
        debug!(url = %url, action = action.as_wire_str(), "sending control");

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, CONTROL_CONTENT_TYPE)
            .body(control_body(action))
            .send()
            .await?;
        let status = resp.status();

        self.log(|logger| {
            logger.log_command(command_name(action), &control_payload(action), Some(status.as_u16()))
        });
        check_status(status)
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut guard) = logger.lock()
        {
            f(&mut guard);
        }
    }
}

fn check_status(status: StatusCode) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Auth);
    }
    if !status.is_success() {
        return Err(Error::Http(status.as_u16()));
    }
    Ok(())
}

fn command_name(action: Action) -> &'static str {
    match action {
        Action::On => "turn_on",
        Action::Off => "turn_off",
    }
}
