//! Best-effort driver log retrieval.
//!
//! YARN logs come from the resource manager REST API: the application
//! record names the AM container log page, and the log text is the last
//! `<pre>` block of that page. Kubernetes logs come from `kubectl logs`.
//! Failures here are logged and never fail the job.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

use super::backend::BackendResolution;
use super::commands::render_command;
use super::session::JobSession;
use crate::config::LogsConfig;
use crate::error::{ErrorCode, HookError, Result};
use crate::http::HttpClient;
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

static PRE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").expect("Valid regex pattern"));

#[derive(Debug, Deserialize)]
struct ApplicationEnvelope {
    app: ApplicationInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationInfo {
    am_container_logs: String,
}

/// Text of the last `<pre>` block in an HTML page, entities decoded
pub fn extract_last_pre(html: &str) -> Option<String> {
    let block = PRE_BLOCK.captures_iter(html).last()?.get(1)?.as_str();
    Some(unescape_html(block))
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub struct DriverLogFetcher {
    config: LogsConfig,
    namespace: Option<String>,
    runner: Arc<dyn ProcessRunner>,
    http: Arc<dyn HttpClient>,
}

impl DriverLogFetcher {
    pub fn new(
        config: LogsConfig,
        namespace: Option<String>,
        runner: Arc<dyn ProcessRunner>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            namespace,
            runner,
            http,
        }
    }

    /// Fetch the driver log for the job's backend and write it to the log.
    ///
    /// Returns the text that was emitted, if any.
    pub async fn emit(
        &self,
        resolution: &BackendResolution,
        session: &JobSession,
    ) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let fetched = if resolution.is_yarn {
            let Some(app_id) = session.yarn_application_id() else {
                tracing::info!("Can not get yarn application id, skipping driver log");
                return None;
            };
            self.fetch_yarn(app_id).await
        } else if resolution.is_kubernetes {
            let Some(pod) = session.kubernetes_driver_pod() else {
                tracing::info!("Can not get kubernetes driver pod, skipping driver log");
                return None;
            };
            self.fetch_kubernetes(pod).await
        } else {
            return None;
        };

        match fetched {
            Ok(text) => {
                tracing::info!("Print driver log ...");
                for line in text.lines() {
                    tracing::info!("{}", line);
                }
                Some(text)
            }
            Err(e) => {
                tracing::info!("Can not get driver log: {}", e.user_message());
                None
            }
        }
    }

    pub async fn fetch_yarn(&self, application_id: &str) -> Result<String> {
        let base = self.config.yarn_rm_url.as_deref().ok_or_else(|| {
            HookError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "logs.yarn_rm_url is not configured",
            )
        })?;

        let app_url = format!("{}/{}", base.trim_end_matches('/'), application_id);
        let response = self.http.get(&app_url).await?;
        if !response.is_success() {
            return Err(HookError::http_with_code(
                ErrorCode::HTTP_STATUS,
                format!("resource manager returned HTTP {}", response.status),
                Some(app_url),
            ));
        }
        let log_url = response.json::<ApplicationEnvelope>()?.app.am_container_logs;
        tracing::info!("Driver log url: {}", log_url);

        for attempt in 1..=self.config.max_fetch_attempts {
            tokio::time::sleep(self.config.fetch_retry_delay).await;

            match self.http.get(&log_url).await {
                Ok(page) if page.is_success() => {
                    if let Some(text) = extract_last_pre(&page.body) {
                        return Ok(text);
                    }
                    tracing::debug!("No log block yet (attempt {})", attempt);
                }
                Ok(page) => tracing::debug!(
                    "Driver log page returned HTTP {} (attempt {})",
                    page.status,
                    attempt
                ),
                Err(e) => tracing::debug!("Driver log page failed (attempt {}): {}", attempt, e),
            }
        }

        Err(HookError::http_with_code(
            ErrorCode::HTTP_DECODE,
            format!(
                "no log block found after {} attempts",
                self.config.max_fetch_attempts
            ),
            Some(log_url),
        ))
    }

    pub async fn fetch_kubernetes(&self, pod: &str) -> Result<String> {
        let mut builder = ProcessCommandBuilder::new(&self.config.kubectl_binary).arg("logs");
        if let Some(namespace) = &self.namespace {
            builder = builder.args(["-n", namespace.as_str()]);
        }
        let command = builder.arg(pod).build();
        let rendered = render_command(&command.argv());

        let output = self.runner.run(command).await?;
        if !output.status.success() {
            return Err(HookError::execution_with_code(
                ErrorCode::EXEC_GENERIC,
                format!("exited with {}", output.status),
                Some(rendered),
            ));
        }

        Ok(output.combined())
    }
}
