//! The execution pipeline behind every prompt-running tool.
//!
//! One invocation: resolve the working directory, fetch or create the
//! workspace session, build the flag vector, run the CLI with streaming and
//! timeout, then record the transcript and continuation token. Failures cross
//! this boundary as [`ClassifiedError`]s; raw runner results never leak to
//! tools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::config::{Config, SALVAGE_THRESHOLD_BYTES};
use crate::error::ClassifiedError;
use crate::process::{self, ExecOptions, RetryPolicy};
use crate::progress::ProgressSink;
use crate::session::{parse_conversation_id, Role, Session, SessionStore};
use crate::workdir;

use super::{build_args, CopilotOptions};

/// Result of a successful (or salvaged) execution.
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    /// The CLI's stdout (or salvaged partial output).
    pub output: String,
    /// Session the invocation was recorded under, if tracking was enabled.
    pub session: Option<Session>,
    /// Working directory the CLI ran in.
    pub working_dir: PathBuf,
    /// True when the run failed but its partial output was worth returning.
    pub salvaged: bool,
}

/// Executes prompts against the Copilot CLI.
pub struct Executor {
    config: Config,
    store: Arc<dyn SessionStore>,
    retry: Option<RetryPolicy>,
}

impl Executor {
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            store,
            retry: None,
        }
    }

    /// Apply a retry policy to every run (transient failures only make sense
    /// here; the policy's triggers decide).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one prompt through the CLI.
    pub async fn execute(
        &self,
        prompt: &str,
        options: &CopilotOptions,
        progress: &ProgressSink,
    ) -> Result<ExecuteOutcome, ClassifiedError> {
        if prompt.trim().is_empty() {
            return Err(ClassifiedError::new("No prompt provided for execution"));
        }

        let working_dir = workdir::resolve(options.working_dir.as_deref(), Some(prompt));

        // Session row is fetched and the user turn recorded before the only
        // suspension point (the subprocess await).
        let session = if options.session_tracking_enabled() {
            let session = self.store.get_or_create(
                &working_dir,
                options.session_id.as_deref(),
                options.model.as_deref(),
            );
            self.store.add_to_history(&session.id, Role::User, prompt);
            Some(session)
        } else {
            None
        };

        let resume_latest = session
            .as_ref()
            .is_some_and(|s| s.conversation_id.is_some());
        let args = build_args(
            prompt,
            options,
            &working_dir,
            self.config.default_model.as_deref(),
            resume_latest,
        );

        let exec_options = ExecOptions {
            timeout: options
                .timeout
                .map_or(self.config.timeout, Duration::from_millis),
            max_output_bytes: options
                .max_output_bytes
                .unwrap_or(self.config.max_output_bytes),
            cwd: Some(working_dir.clone()),
            retry: self.retry.clone(),
        };

        let result = process::run(&self.config.binary, &args, &exec_options, progress).await;

        if !result.ok {
            // Availability over strict correctness: a failed run that already
            // produced a useful amount of output is returned, not discarded.
            if let Some(partial) = result
                .partial_stdout
                .as_ref()
                .filter(|p| p.len() > SALVAGE_THRESHOLD_BYTES)
            {
                tracing::warn!(
                    bytes = partial.len(),
                    "run failed but partial output is usable, salvaging"
                );
                if let Some(session) = &session {
                    self.store.add_to_history(&session.id, Role::Assistant, partial);
                }
                return Ok(ExecuteOutcome {
                    output: partial.clone(),
                    session: session.and_then(|s| self.store.get(&s.id)),
                    working_dir,
                    salvaged: true,
                });
            }

            let message = if result.timed_out {
                format!(
                    "Copilot CLI timed out after {}ms",
                    exec_options.timeout.as_millis()
                )
            } else {
                let detail = if result.stderr.is_empty() {
                    "Unknown error"
                } else {
                    result.stderr.as_str()
                };
                match result.exit_code {
                    Some(code) => format!("Copilot CLI failed with exit code {code}: {detail}"),
                    None => format!("Copilot CLI failed: {detail}"),
                }
            };

            let mut error = ClassifiedError::new(message)
                .context("command", self.config.binary.clone())
                .context("working_dir", working_dir.display().to_string())
                .context("timed_out", result.timed_out);
            if let Some(code) = result.exit_code {
                error = error.context("exit_code", code);
            }
            if let Some(signal) = &result.signal {
                error = error.context("signal", signal.clone());
            }
            if let Some(session) = &session {
                error = error.context("session_id", json!(session.id));
            }
            return Err(error);
        }

        if let Some(session) = &session {
            if session.conversation_id.is_none() {
                if let Some(conversation_id) = parse_conversation_id(&result.stdout) {
                    self.store.set_conversation_id(&session.id, &conversation_id);
                }
            }
            self.store
                .add_to_history(&session.id, Role::Assistant, &result.stdout);
        }

        Ok(ExecuteOutcome {
            output: result.stdout,
            session: session.and_then(|s| self.store.get(&s.id)),
            working_dir,
            salvaged: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;

    fn executor_for(binary: &str) -> Executor {
        let config = Config {
            binary: binary.to_string(),
            default_model: None,
            ..Config::default()
        };
        Executor::new(config, Arc::new(InMemorySessionStore::new()))
    }

    fn options_in(dir: &std::path::Path) -> CopilotOptions {
        CopilotOptions {
            working_dir: Some(dir.display().to_string()),
            ..CopilotOptions::default()
        }
    }

    #[tokio::test]
    async fn records_both_turns_in_session_history() {
        // `echo` stands in for the CLI: it prints its arguments, so the
        // trailing prompt comes back in stdout.
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_for("echo");

        let outcome = executor
            .execute("hello there", &options_in(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();

        assert!(outcome.output.ends_with("hello there"));
        let session = outcome.session.expect("session tracked");
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].role, Role::User);
        assert_eq!(session.history[0].content, "hello there");
        assert_eq!(session.history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn consecutive_calls_share_the_workspace_session() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_for("echo");
        let options = options_in(dir.path());

        let first = executor
            .execute("one", &options, &ProgressSink::disabled())
            .await
            .unwrap();
        let second = executor
            .execute("two", &options, &ProgressSink::disabled())
            .await
            .unwrap();

        assert_eq!(
            first.session.unwrap().id,
            second.session.as_ref().unwrap().id
        );
        assert_eq!(second.session.unwrap().history.len(), 4);
    }

    #[tokio::test]
    async fn session_tracking_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_for("echo");
        let options = CopilotOptions {
            enable_session_tracking: Some(false),
            ..options_in(dir.path())
        };

        let outcome = executor
            .execute("untracked", &options, &ProgressSink::disabled())
            .await
            .unwrap();
        assert!(outcome.session.is_none());
        assert!(executor.store().all().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captured_conversation_id_is_stored() {
        use std::os::unix::fs::PermissionsExt;

        // Fake CLI whose output carries a continuation token.
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-copilot.sh");
        std::fs::write(&fake, "#!/bin/sh\necho 'done'\necho 'conversation: conv_999'\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let executor = executor_for(fake.to_str().unwrap());

        let outcome = executor
            .execute("anything", &options_in(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();
        let session = outcome.session.unwrap();
        assert_eq!(session.conversation_id.as_deref(), Some("conv_999"));
    }

    #[tokio::test]
    async fn failure_yields_classified_error_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_for("definitely_not_installed_cli_tool");

        let err = executor
            .execute("hello", &options_in(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap_err();

        assert_eq!(err.category, crate::error::ErrorCategory::CliNotFound);
        assert!(err.context.contains_key("working_dir"));
        assert!(err.context.contains_key("command"));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_for("echo");
        let err = executor
            .execute("   ", &options_in(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap_err();
        assert!(err.message.contains("No prompt"));
    }
}
