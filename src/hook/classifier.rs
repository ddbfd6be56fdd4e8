//! Classification of spark-submit output.
//!
//! Each backend gets a small table of extraction rules. The table is picked
//! once per job in backend priority order (YARN cluster mode, then
//! Kubernetes, then tracked standalone), so a job is classified by exactly
//! one backend's rules.

use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;

use super::backend::BackendResolution;
use super::session::{DriverIdentity, JobSession, SharedSession};
use crate::subprocess::ProcessError;

static YARN_APPLICATION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(application[0-9_]+)").expect("Valid regex pattern"));

static KUBERNETES_DRIVER_POD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*pod name: ((.+?)-([a-z0-9]+)-driver)").expect("Valid regex pattern")
});

static KUBERNETES_EXIT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*exit code: (\d+)").expect("Valid regex pattern"));

static STANDALONE_DRIVER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(driver-[0-9\-]+)").expect("Valid regex pattern"));

/// Session field a rule writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DriverIdentity,
    ExitCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Keep the first value, ignore later matches
    FirstWins,
    /// Every match replaces the previous value
    LastWins,
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub name: &'static str,
    pub pattern: &'static Regex,
    pub field: Field,
    pub policy: OverwritePolicy,
}

/// A value written to the session by one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Identity(DriverIdentity),
    ExitCode(i32),
}

/// Receives every submit output line after classification
pub trait LineObserver: Send + Sync {
    fn observe(&self, line: &str);
}

/// Forwards submit output to tracing at TRACE level on target `spark_submit`
pub struct TracingObserver;

impl LineObserver for TracingObserver {
    fn observe(&self, line: &str) {
        tracing::trace!(target: "spark_submit", "{}", line);
    }
}

pub struct LogClassifier {
    rules: Vec<ExtractionRule>,
    identity: fn(String) -> DriverIdentity,
}

impl LogClassifier {
    pub fn for_backend(resolution: &BackendResolution) -> Self {
        if resolution.is_yarn && resolution.cluster_mode {
            Self {
                rules: vec![ExtractionRule {
                    name: "yarn application id",
                    pattern: &YARN_APPLICATION_ID,
                    field: Field::DriverIdentity,
                    policy: OverwritePolicy::FirstWins,
                }],
                identity: DriverIdentity::YarnApplication,
            }
        } else if resolution.is_kubernetes {
            Self {
                rules: vec![
                    ExtractionRule {
                        name: "kubernetes driver pod",
                        pattern: &KUBERNETES_DRIVER_POD,
                        field: Field::DriverIdentity,
                        policy: OverwritePolicy::LastWins,
                    },
                    ExtractionRule {
                        name: "kubernetes exit code",
                        pattern: &KUBERNETES_EXIT_CODE,
                        field: Field::ExitCode,
                        policy: OverwritePolicy::LastWins,
                    },
                ],
                identity: DriverIdentity::KubernetesPod,
            }
        } else if resolution.track_driver_status {
            Self {
                rules: vec![ExtractionRule {
                    name: "standalone driver id",
                    pattern: &STANDALONE_DRIVER_ID,
                    field: Field::DriverIdentity,
                    policy: OverwritePolicy::FirstWins,
                }],
                identity: DriverIdentity::StandaloneDriver,
            }
        } else {
            Self {
                rules: Vec::new(),
                identity: DriverIdentity::StandaloneDriver,
            }
        }
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Apply every rule to one trimmed line, writing matches into `session`.
    ///
    /// Returns the values actually written.
    pub fn classify_line(&self, line: &str, session: &mut JobSession) -> Vec<Extraction> {
        let mut written = Vec::new();

        for rule in &self.rules {
            let Some(captured) = rule
                .pattern
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
            else {
                continue;
            };

            match rule.field {
                Field::DriverIdentity => {
                    session.identity_matches += 1;
                    let keep_existing = rule.policy == OverwritePolicy::FirstWins
                        && session.driver_identity.is_some();
                    if keep_existing {
                        continue;
                    }

                    let identity = (self.identity)(captured.to_string());
                    match rule.policy {
                        OverwritePolicy::FirstWins => {
                            tracing::info!("Identified spark driver id: {}", identity)
                        }
                        OverwritePolicy::LastWins => {
                            tracing::info!("Identified spark driver pod: {}", identity)
                        }
                    }
                    session.driver_identity = Some(identity.clone());
                    written.push(Extraction::Identity(identity));
                }
                Field::ExitCode => {
                    if rule.policy == OverwritePolicy::FirstWins
                        && session.kubernetes_exit_code.is_some()
                    {
                        continue;
                    }
                    match captured.parse::<i32>() {
                        Ok(code) => {
                            session.kubernetes_exit_code = Some(code);
                            written.push(Extraction::ExitCode(code));
                        }
                        Err(e) => {
                            tracing::warn!("Ignoring unparsable {} '{}': {}", rule.name, captured, e)
                        }
                    }
                }
            }
        }

        written
    }

    /// Consume the submit output to exhaustion, classifying and forwarding
    /// each trimmed line. Returns the number of lines seen.
    pub async fn consume<S>(
        &self,
        mut lines: S,
        session: &SharedSession,
        observer: &dyn LineObserver,
    ) -> usize
    where
        S: Stream<Item = Result<String, ProcessError>> + Unpin,
    {
        let mut count = 0;

        while let Some(item) = lines.next().await {
            match item {
                Ok(raw) => {
                    let line = raw.trim();
                    session.update(|s| self.classify_line(line, s));
                    observer.observe(line);
                    count += 1;
                }
                Err(e) => tracing::warn!("Failed to read spark-submit output: {}", e),
            }
        }

        count
    }
}
