//! Auxiliary supervised processes for `stagehand dev`.

use std::sync::Arc;
use std::time::Duration;

use stagehand_core::Backoff;
use stagehand_supervisor::{ProcessDescriptor, TaskContext, TaskError, TaskFuture};

use crate::http::HttpPlatformClient;

const LOG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Announces the session endpoint being forwarded, then idles until the
/// session shuts down.
pub fn tunnel_descriptor(session_endpoint: String) -> ProcessDescriptor {
    ProcessDescriptor::new("tunnel", "tunnel", move |ctx: TaskContext| {
        Box::pin(async move {
            ctx.output
                .write_line(format!("forwarding to {session_endpoint}"))
                .await;
            ctx.shutdown.cancelled().await;
            Ok(())
        }) as TaskFuture
    })
}

/// Polls the platform for recent extension log lines on a fixed interval.
///
/// Transient failures back off under one retry budget that resets on the
/// next success; a non-retryable failure or an exhausted budget ends the
/// task, which tears down the whole session.
pub fn log_poll_descriptor(client: Arc<HttpPlatformClient>) -> ProcessDescriptor {
    ProcessDescriptor::new("log-poll", "logs", move |ctx: TaskContext| {
        Box::pin(async move {
            let budget = Backoff::default();
            let mut delays = budget.delays();
            loop {
                tokio::select! {
                    () = ctx.shutdown.cancelled() => return Ok(()),
                    () = tokio::time::sleep(LOG_POLL_INTERVAL) => {}
                }

                let fetch = {
                    let client = client.clone();
                    tokio::task::spawn_blocking(move || client.fetch_recent_logs())
                };
                match fetch.await {
                    Ok(Ok(lines)) => {
                        delays = budget.delays();
                        for line in lines {
                            ctx.output.write_line(line).await;
                        }
                    }
                    Ok(Err(err)) if err.retryable() => {
                        let Some(delay) = delays.next() else {
                            return Err(TaskError::fatal(format!(
                                "log polling gave up after repeated failures: {err}"
                            )));
                        };
                        tracing::warn!(error = %err, "log poll failed, backing off");
                        tokio::select! {
                            () = ctx.shutdown.cancelled() => return Ok(()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                    Ok(Err(err)) => {
                        return Err(TaskError::fatal(format!("log polling failed: {err}")));
                    }
                    Err(join) => {
                        return Err(TaskError::fatal(format!("log fetch aborted: {join}")));
                    }
                }
            }
        }) as TaskFuture
    })
}
