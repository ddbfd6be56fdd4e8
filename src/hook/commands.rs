//! Command construction for submit, status, kill and YARN kill, plus the
//! masking applied to every rendered command line.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;

use super::backend::BackendResolution;
use crate::config::{ConnectionDescriptor, KUBERNETES_NAMESPACE_CONF};
use crate::error::{ErrorCode, HookError, Result};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};

pub const MASK: &str = "******";

static QUOTED_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\S*?(?:secret|password)\S*?\s*=\s*')[^']*'").expect("Valid regex pattern")
});

// Same keys once a shell has stripped the quotes
static BARE_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\S*?(?:secret|password)\S*?\s*=\s*)[^'\s]\S*").expect("Valid regex pattern")
});

/// Replace secret and password values in a rendered command line
pub fn mask_command(rendered: &str) -> String {
    let masked = QUOTED_SECRET.replace_all(rendered, format!("${{1}}{}'", MASK).as_str());
    BARE_SECRET
        .replace_all(&masked, format!("${{1}}{}", MASK).as_str())
        .into_owned()
}

/// Space-joined, masked rendering of an argument vector
pub fn render_command<S: AsRef<str>>(argv: &[S]) -> String {
    let joined = argv.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
    mask_command(&joined)
}

/// Caller-supplied arguments appended to the submit binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    pub tokens: Vec<String>,
}

impl SubmitCommand {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command string the way a POSIX shell would
    pub fn parse(command: &str) -> Result<Self> {
        let tokens = shell_words::split(command).map_err(|e| {
            HookError::precondition(
                ErrorCode::PRECONDITION_EMPTY_COMMAND,
                "cannot split submit command",
            )
            .with_source(e)
        })?;

        if tokens.is_empty() {
            return Err(HookError::precondition(
                ErrorCode::PRECONDITION_EMPTY_COMMAND,
                "submit command is empty",
            ));
        }

        Ok(Self { tokens })
    }

    /// Prepend `--master`, `--conf` entries and `--deploy-mode` taken from
    /// the connection, skipping any the tokens already set.
    ///
    /// Kubernetes masters with a namespace also get
    /// `spark.kubernetes.namespace`.
    pub fn with_connection_args(
        self,
        conn: &ConnectionDescriptor,
        conf: &BTreeMap<String, String>,
    ) -> Self {
        let mut tokens = Vec::new();

        if !self.sets_option("--master") {
            tokens.extend(["--master".to_string(), conn.master.clone()]);
        }

        let mut conf = conf.clone();
        if let (true, Some(namespace)) = (
            BackendResolution::resolve(conn).is_kubernetes,
            &conn.namespace,
        ) {
            conf.insert(KUBERNETES_NAMESPACE_CONF.to_string(), namespace.clone());
        }
        for (key, value) in &conf {
            if !self.sets_conf(key) {
                tokens.extend(["--conf".to_string(), format!("{}={}", key, value)]);
            }
        }

        if let Some(deploy_mode) = &conn.deploy_mode {
            if !self.sets_option("--deploy-mode") {
                tokens.extend(["--deploy-mode".to_string(), deploy_mode.clone()]);
            }
        }

        tokens.extend(self.tokens);
        Self { tokens }
    }

    fn sets_option(&self, flag: &str) -> bool {
        self.tokens.iter().any(|token| {
            token == flag
                || token
                    .strip_prefix(flag)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }

    fn sets_conf(&self, key: &str) -> bool {
        let assigns = |value: &str| {
            value
                .strip_prefix(key)
                .is_some_and(|rest| rest.starts_with('='))
        };

        self.tokens.iter().enumerate().any(|(i, token)| match token.as_str() {
            "--conf" | "-c" => self.tokens.get(i + 1).is_some_and(|next| assigns(next)),
            other => other.strip_prefix("--conf=").is_some_and(assigns),
        })
    }
}

/// `[binary path] + tokens` with the configured environment layered on top
pub fn build_submit_command(
    conn: &ConnectionDescriptor,
    command: &SubmitCommand,
    env: &BTreeMap<String, String>,
) -> ProcessCommand {
    ProcessCommandBuilder::new(&conn.spark_binary_path())
        .args(&command.tokens)
        .envs(env)
        .build()
}

#[derive(Debug, Clone)]
pub enum StatusQuery {
    /// GET against the master's REST submission server
    Rest { url: String },
    /// `spark-submit --master <master> --status <driver id>`
    Cli(ProcessCommand),
}

impl StatusQuery {
    pub fn render(&self) -> String {
        match self {
            StatusQuery::Rest { url } => format!("GET {}", url),
            StatusQuery::Cli(command) => render_command(&command.argv()),
        }
    }
}

/// Build the driver status query. The REST form is used when the master
/// ends with `:{rest_port}`.
pub fn build_status_query(
    conn: &ConnectionDescriptor,
    driver_id: Option<&str>,
    rest_port: u16,
) -> Result<StatusQuery> {
    let driver_id = driver_id.ok_or_else(|| HookError::missing_driver_id("poll driver status"))?;

    if conn.master.ends_with(&format!(":{}", rest_port)) {
        let host = conn.master.replace("spark://", "http://");
        return Ok(StatusQuery::Rest {
            url: format!(
                "{}/v1/submissions/status/{}",
                host.trim_end_matches('/'),
                driver_id
            ),
        });
    }

    Ok(StatusQuery::Cli(
        ProcessCommandBuilder::new(&conn.spark_binary_path())
            .args(["--master", conn.master.as_str(), "--status", driver_id])
            .build(),
    ))
}

pub fn build_kill_command(
    conn: &ConnectionDescriptor,
    driver_id: Option<&str>,
) -> Result<ProcessCommand> {
    let driver_id = driver_id.ok_or_else(|| HookError::missing_driver_id("kill the driver"))?;

    Ok(ProcessCommandBuilder::new(&conn.spark_binary_path())
        .args(["--master", conn.master.as_str(), "--kill", driver_id])
        .build())
}

pub fn build_yarn_kill_command(application_id: &str, timeout: Option<Duration>) -> ProcessCommand {
    let mut builder =
        ProcessCommandBuilder::new("yarn").args(["application", "-kill", application_id]);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}
