//! Capped, combined stdout+stderr capture and the `outputData` folding
//! rule: a JSON object on stdout is surfaced as-is, anything else becomes
//! `{ "raw_output": <trimmed string> }`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::Mutex;

pub(crate) struct CapturedOutput {
    pub stdout: String,
    pub combined_log: String,
    pub truncated: bool,
}

/// Drain stdout and stderr concurrently into one size-capped buffer for
/// the execution log, while keeping stdout separately for `outputData`
/// parsing. Reading continues to completion even after the cap is hit so
/// the child is never blocked on a full pipe.
pub(crate) async fn capture(stdout: ChildStdout, stderr: ChildStderr, max_output_size: usize) -> CapturedOutput {
    let combined = Arc::new(Mutex::new(Vec::<u8>::new()));
    let stdout_only = Arc::new(Mutex::new(Vec::<u8>::new()));
    let truncated = Arc::new(AtomicBool::new(false));

    let (stdout_task, stderr_task) = tokio::join!(
        drain(stdout, Arc::clone(&combined), Some(Arc::clone(&stdout_only)), max_output_size, Arc::clone(&truncated)),
        drain(stderr, Arc::clone(&combined), None, max_output_size, Arc::clone(&truncated)),
    );
    let _ = (stdout_task, stderr_task);

    CapturedOutput {
        stdout: String::from_utf8_lossy(&stdout_only.lock().await).to_string(),
        combined_log: String::from_utf8_lossy(&combined.lock().await).to_string(),
        truncated: truncated.load(Ordering::Relaxed),
    }
}

async fn drain<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    combined: Arc<Mutex<Vec<u8>>>,
    mirror: Option<Arc<Mutex<Vec<u8>>>>,
    cap: usize,
    truncated: Arc<AtomicBool>,
) {
    let mut chunk = [0_u8; 8192];
    loop {
        let Ok(n) = reader.read(&mut chunk).await else { break };
        if n == 0 {
            break;
        }
        if let Some(mirror) = &mirror {
            let mut m = mirror.lock().await;
            let room = cap.saturating_sub(m.len());
            m.extend_from_slice(&chunk[..n.min(room)]);
        }
        let mut buf = combined.lock().await;
        let room = cap.saturating_sub(buf.len());
        if n > room {
            truncated.store(true, Ordering::Relaxed);
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
}

/// `outputData` per the I/O contract: stdout, when non-empty and
/// parseable as a JSON object, is surfaced as-is; otherwise the trimmed
/// text is wrapped under `raw_output`.
#[must_use]
pub(crate) fn fold_output_data(stdout: &str) -> HashMap<String, Value> {
    let trimmed = stdout.trim();
    if !trimmed.is_empty()
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed)
    {
        return map.into_iter().collect();
    }
    let mut out = HashMap::new();
    out.insert("raw_output".to_string(), Value::String(trimmed.to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_stdout_passes_through() {
        let data = fold_output_data(r#"{"cpu": 12.5}"#);
        assert_eq!(data.get("cpu"), Some(&Value::from(12.5)));
        assert!(!data.contains_key("raw_output"));
    }

    #[test]
    fn non_json_stdout_falls_back_to_raw_output() {
        let data = fold_output_data("  all good  \n");
        assert_eq!(data.get("raw_output"), Some(&Value::String("all good".to_string())));
    }

    #[test]
    fn json_array_is_not_treated_as_an_object() {
        let data = fold_output_data("[1, 2, 3]");
        assert_eq!(data.get("raw_output"), Some(&Value::String("[1, 2, 3]".to_string())));
    }
}
