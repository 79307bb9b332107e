//! Out-of-process Python front-end.
//!
//! Spawns `<python_command> -m devac_frontend <config-json> <file-path>`,
//! feeds in-memory content on stdin when present, and reads one JSON
//! response document from stdout. Non-zero exit, invalid JSON, or an
//! `error` field all surface as `ExternalToolFailure`; exceeding the
//! per-file timeout kills the child and fails with `Timeout`.

use crate::registry::{LanguageFrontend, ParseOptions};
use devac_core::model::StructuralParseResult;
use devac_core::error::ParseError;
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Deserialize)]
struct FrontendResponse {
    #[serde(flatten)]
    result: StructuralParseResult,
    #[serde(default)]
    error: Option<String>,
}

pub struct PythonFrontend;

impl LanguageFrontend for PythonFrontend {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn parse(
        &self,
        path: &Path,
        options: &ParseOptions,
    ) -> Result<StructuralParseResult, ParseError> {
        run_frontend(path, None, options)
    }

    fn parse_content(
        &self,
        content: &str,
        path: &Path,
        options: &ParseOptions,
    ) -> Result<StructuralParseResult, ParseError> {
        run_frontend(path, Some(content), options)
    }
}

fn run_frontend(
    path: &Path,
    content: Option<&str>,
    options: &ParseOptions,
) -> Result<StructuralParseResult, ParseError> {
    let file = path.display().to_string();
    let tool_failure = |detail: String| ParseError::ExternalToolFailure {
        file: file.clone(),
        detail,
    };

    let config = serde_json::json!({
        "repo": options.repo,
        "packagePath": options.package_path,
        "timeoutMs": options.timeout_ms,
        "contentOnStdin": content.is_some(),
    })
    .to_string();

    debug!(file = %file, command = %options.python_command, "spawning python front-end");
    let mut child = Command::new(&options.python_command)
        .arg("-m")
        .arg("devac_frontend")
        .arg(&config)
        .arg(&file)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| tool_failure(format!("failed to spawn {}: {e}", options.python_command)))?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(content) = content {
            // A closed pipe here means the child already exited; its status
            // and stderr carry the real failure.
            let _ = stdin.write_all(content.as_bytes());
        }
        drop(stdin);
    }

    // Drain both pipes on threads so a chatty child can never fill a pipe
    // buffer and deadlock against our exit polling.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout));
    let stderr_thread = std::thread::spawn(move || drain(stderr));

    let status = wait_with_deadline(
        &mut child,
        Duration::from_millis(options.timeout_ms),
    )
    .map_err(|e| tool_failure(format!("wait failed: {e}")))?;

    let stdout_bytes = stdout_thread.join().unwrap_or_default();
    let stderr_bytes = stderr_thread.join().unwrap_or_default();

    let Some(status) = status else {
        return Err(ParseError::Timeout {
            file,
            timeout_ms: options.timeout_ms,
        });
    };
    if !status.success() {
        let stderr_text = String::from_utf8_lossy(&stderr_bytes);
        return Err(tool_failure(format!(
            "exited with {status}: {}",
            stderr_text.trim()
        )));
    }

    let response: FrontendResponse = serde_json::from_slice(&stdout_bytes)
        .map_err(|e| tool_failure(format!("invalid JSON response: {e}")))?;
    if let Some(error) = response.error {
        return Err(tool_failure(error));
    }
    Ok(response.result)
}

/// Poll for exit until the deadline; kill and reap on timeout (`None`).
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
