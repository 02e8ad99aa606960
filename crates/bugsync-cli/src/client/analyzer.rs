use bugsync_core::config::AnalyzerConfig;
use bugsync_core::model::{BugAnalysis, BugId};
use bugsync_core::{Analyzer, ClientError};
use std::process::Command;
use tracing::debug;

use super::render::MarkdownRenderer;

/// Runs `{program} {args..} {bug_id}` and reads the analysis JSON from stdout.
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
    renderer: MarkdownRenderer,
}

impl CommandAnalyzer {
    pub fn new(config: &AnalyzerConfig, renderer: MarkdownRenderer) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            renderer,
        }
    }
}

impl Analyzer for CommandAnalyzer {
    fn analyze(&self, bug_id: BugId) -> Result<BugAnalysis, ClientError> {
        debug!(bug_id = %bug_id, program = %self.program, "Running patch analysis");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(bug_id.to_string())
            .output()
            .map_err(|err| ClientError::Analyzer(format!("failed to run {}: {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::Analyzer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|err| {
            ClientError::Analyzer(format!("{} printed invalid analysis JSON: {err}", self.program))
        })
    }

    fn render_uplift_comment(&self, text: &str, _bug_id: BugId) -> Result<String, ClientError> {
        Ok(self.renderer.render(text))
    }
}
