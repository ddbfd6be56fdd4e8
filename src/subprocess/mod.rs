pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::ProcessCommand;
pub use runner::{ExitStatus, ProcessOutput, ProcessRunner, ProcessStream, TokioProcessRunner};

use std::sync::Arc;

#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(runner::TokioProcessRunner))
    }

    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }
}
