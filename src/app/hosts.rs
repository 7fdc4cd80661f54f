// LogPilot - app/hosts.rs
//
// Host directory: the list of machines that can be searched, served by the
// log server at `GET {base}/plugin/logs/api/ip_list` as
//
//   { "code": 200, "data": ["10.0.0.1", ...], "msg": "" }
//
// Any other `code` is a server-side refusal and `msg` explains it.
//
// `HostDirectory` does the blocking HTTP call. `HostListManager` runs it on
// a background thread and hands the result to the UI thread over an mpsc
// channel, the same way a long-running scan would.

use crate::util::constants::{HOST_LIST_PATH, HOST_LIST_SUCCESS_CODE};
use crate::util::error::HostDirectoryError;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// JSON envelope returned by the host list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HostListResponse {
    pub code: i64,
    #[serde(default)]
    pub data: Option<Vec<String>>,
    #[serde(default)]
    pub msg: String,
}

impl HostListResponse {
    /// Extract the host list, or the refusal the server reported.
    ///
    /// Blank entries are skipped and duplicates collapse onto their first
    /// occurrence so the list order is the server's order.
    pub fn into_hosts(self, url: &str) -> Result<Vec<String>, HostDirectoryError> {
        if self.code != HOST_LIST_SUCCESS_CODE {
            return Err(HostDirectoryError::Rejected {
                url: url.to_string(),
                code: self.code,
                msg: self.msg,
            });
        }

        let mut hosts: Vec<String> = Vec::new();
        for host in self.data.unwrap_or_default() {
            let host = host.trim();
            if host.is_empty() || hosts.iter().any(|h| h == host) {
                continue;
            }
            hosts.push(host.to_string());
        }
        Ok(hosts)
    }
}

/// Full endpoint URL for `base_url`.
pub fn host_list_url(base_url: &str) -> String {
    format!("{}{HOST_LIST_PATH}", base_url.trim().trim_end_matches('/'))
}

/// Blocking client for the host list endpoint.
#[derive(Debug, Clone)]
pub struct HostDirectory {
    client: reqwest::blocking::Client,
    url: String,
}

impl HostDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HostDirectoryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| HostDirectoryError::Client { source })?;
        Ok(Self {
            client,
            url: host_list_url(base_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the searchable hosts.
    pub fn fetch(&self) -> Result<Vec<String>, HostDirectoryError> {
        tracing::debug!(url = %self.url, "Fetching host list");

        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|source| HostDirectoryError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostDirectoryError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: HostListResponse =
            response.json().map_err(|source| HostDirectoryError::Decode {
                url: self.url.clone(),
                source,
            })?;

        let hosts = envelope.into_hosts(&self.url)?;
        tracing::info!(url = %self.url, count = hosts.len(), "Host list loaded");
        Ok(hosts)
    }
}

// =============================================================================
// Background fetch
// =============================================================================

/// Outcome of one background fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostListProgress {
    Loaded(Vec<String>),
    Failed(String),
}

/// Runs host list fetches off the UI thread.
pub struct HostListManager {
    directory: HostDirectory,
    progress_rx: Option<mpsc::Receiver<HostListProgress>>,
    /// Set when a newer fetch supersedes the running one.
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl HostListManager {
    pub fn new(directory: HostDirectory) -> Self {
        Self {
            directory,
            progress_rx: None,
            cancel_flag: None,
        }
    }

    pub fn url(&self) -> &str {
        self.directory.url()
    }

    /// Start a fetch. A fetch already in flight is abandoned; its result is
    /// discarded when it arrives.
    pub fn start_fetch(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.progress_rx = Some(rx);
        self.cancel_flag = Some(Arc::clone(&cancel));

        let directory = self.directory.clone();
        std::thread::spawn(move || {
            let progress = match directory.fetch() {
                Ok(hosts) => HostListProgress::Loaded(hosts),
                Err(e) => {
                    tracing::warn!(error = %e, "Host list fetch failed");
                    HostListProgress::Failed(e.to_string())
                }
            };
            if !cancel.load(Ordering::SeqCst) && tx.send(progress).is_err() {
                tracing::debug!("Host list receiver gone; result discarded");
            }
        });
    }

    pub fn is_fetching(&self) -> bool {
        self.progress_rx.is_some()
    }

    /// Non-blocking check for a finished fetch.
    pub fn poll_progress(&mut self) -> Option<HostListProgress> {
        let rx = self.progress_rx.as_ref()?;
        match rx.try_recv() {
            Ok(progress) => {
                self.progress_rx = None;
                self.cancel_flag = None;
                Some(progress)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.progress_rx = None;
                self.cancel_flag = None;
                Some(HostListProgress::Failed(
                    "host list fetch ended without a result".to_string(),
                ))
            }
        }
    }
}
