use std::io::ErrorKind;
use std::process::Stdio;

use skitz_types::ActionResult;
use skitz_util::redact_sensitive;
use tokio::process::Command;
use tracing::{debug, warn};

use super::PROGRAM_NOT_FOUND;

/// Run `program` to completion and capture its output.
///
/// Stdout becomes the result output. A non-zero exit reports stderr (or the
/// exit status when stderr is empty) as the error.
pub(super) async fn run(program: &str, args: &[String], env: &[(String, String)]) -> ActionResult {
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match command.output().await {
        Ok(output) => output,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(program, "program not installed");
            return ActionResult::failure(format!("{program}: {PROGRAM_NOT_FOUND}"));
        }
        Err(error) => {
            warn!(program, error = %error, "failed to spawn program");
            return ActionResult::failure(format!("Failed to run {program}: {error}"));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return ActionResult::ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let error = if stderr.is_empty() {
        format!("{program} exited with {}", output.status)
    } else {
        stderr
    };
    debug!(program, status = %output.status, error = %redact_sensitive(&error), "program failed");
    ActionResult::failure_with_output(error, stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let result = run("sh", &["-c".into(), "printf hello".into()], &[]).await;
        assert_eq!(result, ActionResult::ok("hello"));
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let result = run("sh", &["-c".into(), "echo partial; echo broken >&2; exit 3".into()], &[]).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("broken"));
        assert_eq!(result.output, "partial\n");
    }

    #[tokio::test]
    async fn environment_is_passed_through() {
        let env = vec![("SKITZ_TEST_VALUE".to_string(), "42".to_string())];
        let result = run("sh", &["-c".into(), "printf $SKITZ_TEST_VALUE".into()], &env).await;
        assert_eq!(result.output, "42");
    }

    #[tokio::test]
    async fn missing_program_is_recognizable() {
        let result = run("skitz-definitely-missing-binary", &[], &[]).await;
        assert!(result.message().contains(PROGRAM_NOT_FOUND));
    }
}
