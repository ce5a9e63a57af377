//! Sheet source integration: HTTP fetch plus the restartable polling engine.

use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use podium_core::{MIN_POLL_INTERVAL_SECS, log_debug, parse_sheet};

const SHEET_CMD_QUEUE_CAPACITY: usize = 64;
const SHEET_EVENT_QUEUE_CAPACITY: usize = 64;
const FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub sheet_url: String,
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub enum SheetCommand {
    /// Replaces any running poll timer and begins a fresh cycle immediately.
    StartPolling(PollConfig),
    StopPolling,
    /// One out-of-cycle fetch; the recurring timer is left untouched.
    FetchNow { sheet_url: String },
}

#[derive(Debug, Clone)]
pub enum SheetEvent {
    FetchStarted {
        context: FetchContext,
    },
    SheetLoaded {
        context: FetchContext,
        table: Vec<Vec<String>>,
    },
    FetchFailed {
        context: FetchContext,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchContext {
    Poll,
    Manual,
}

pub fn fetch_context_label(context: FetchContext) -> &'static str {
    match context {
        FetchContext::Poll => "poll",
        FetchContext::Manual => "manual",
    }
}

#[derive(Clone)]
pub struct SheetEngine {
    tx: mpsc::Sender<SheetCommand>,
}

impl SheetEngine {
    pub fn start() -> (Self, mpsc::Receiver<SheetEvent>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SheetCommand>(SHEET_CMD_QUEUE_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel::<SheetEvent>(SHEET_EVENT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            let client = http_client();
            let mut poller: Option<JoinHandle<()>> = None;
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    SheetCommand::StartPolling(config) => {
                        if let Some(handle) = poller.take() {
                            handle.abort();
                        }
                        if config.sheet_url.trim().is_empty() {
                            log_debug("sheet_poll not started: no source url");
                            continue;
                        }
                        log_debug(&format!(
                            "sheet_poll start url={} interval={}s",
                            config.sheet_url, config.interval_secs
                        ));
                        let client = client.clone();
                        let tx = evt_tx.clone();
                        poller = Some(tokio::spawn(poll_loop(client, config, tx)));
                    }
                    SheetCommand::StopPolling => {
                        if let Some(handle) = poller.take() {
                            handle.abort();
                            log_debug("sheet_poll stop");
                        }
                    }
                    SheetCommand::FetchNow { sheet_url } => {
                        if sheet_url.trim().is_empty() {
                            continue;
                        }
                        let client = client.clone();
                        let tx = evt_tx.clone();
                        tokio::spawn(async move {
                            run_fetch(&client, &sheet_url, FetchContext::Manual, &tx).await;
                        });
                    }
                }
            }
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        });

        (Self { tx: cmd_tx }, evt_rx)
    }

    pub fn send(&self, cmd: SheetCommand) -> Result<()> {
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                log_debug(&format!("sheet cmd queue full, dropping: {:?}", cmd));
                Err(anyhow!("sheet command queue full"))
            }
            Err(TrySendError::Closed(_)) => Err(anyhow!("sheet command queue closed")),
        }
    }
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn effective_interval(interval_secs: u64) -> Duration {
    Duration::from_secs(interval_secs.max(MIN_POLL_INTERVAL_SECS))
}

/// One timer, one cycle at a time: the first tick fires immediately, and a
/// tick's fetch completes before the next tick is taken, so poll cycles
/// never overlap even when the source is slower than the interval.
async fn poll_loop(client: Client, config: PollConfig, tx: mpsc::Sender<SheetEvent>) {
    let mut ticker = tokio::time::interval(effective_interval(config.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        run_fetch(&client, &config.sheet_url, FetchContext::Poll, &tx).await;
    }
}

async fn run_fetch(
    client: &Client,
    sheet_url: &str,
    context: FetchContext,
    tx: &mpsc::Sender<SheetEvent>,
) {
    let _ = tx.send(SheetEvent::FetchStarted { context }).await;
    match fetch_sheet_text(client, sheet_url).await {
        Ok(body) => {
            let table = parse_sheet(&body);
            log_debug(&format!(
                "sheet_fetch ok context={} rows={}",
                fetch_context_label(context),
                table.len()
            ));
            let _ = tx.send(SheetEvent::SheetLoaded { context, table }).await;
        }
        Err(err) => {
            log_debug(&format!(
                "sheet_fetch error context={} {}",
                fetch_context_label(context),
                err
            ));
            let _ = tx
                .send(SheetEvent::FetchFailed {
                    context,
                    reason: err.to_string(),
                })
                .await;
        }
    }
}

async fn fetch_sheet_text(client: &Client, sheet_url: &str) -> Result<String> {
    let response = client.get(sheet_url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::{
        FetchContext, SheetCommand, SheetEngine, SheetEvent, effective_interval,
        fetch_context_label,
    };

    #[test]
    fn send_returns_error_when_queue_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let engine = SheetEngine { tx };
        engine.send(SheetCommand::StopPolling).unwrap();

        let err = engine.send(SheetCommand::StopPolling).unwrap_err();
        assert!(err.to_string().contains("queue full"));
    }

    #[test]
    fn send_returns_error_when_queue_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let engine = SheetEngine { tx };

        let err = engine.send(SheetCommand::StopPolling).unwrap_err();
        assert!(err.to_string().contains("queue closed"));
    }

    #[test]
    fn effective_interval_enforces_the_minimum() {
        assert_eq!(effective_interval(1), Duration::from_secs(5));
        assert_eq!(effective_interval(5), Duration::from_secs(5));
        assert_eq!(effective_interval(45), Duration::from_secs(45));
    }

    #[test]
    fn fetch_context_labels() {
        assert_eq!(fetch_context_label(FetchContext::Poll), "poll");
        assert_eq!(fetch_context_label(FetchContext::Manual), "manual");
    }

    #[tokio::test]
    async fn manual_fetch_against_refused_port_reports_started_then_failed() {
        let (engine, mut events) = SheetEngine::start();
        engine
            .send(SheetCommand::FetchNow {
                sheet_url: "http://127.0.0.1:1/questions.csv".to_string(),
            })
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(15), events.recv())
            .await
            .expect("no event before timeout")
            .expect("event channel closed");
        assert!(matches!(
            first,
            SheetEvent::FetchStarted {
                context: FetchContext::Manual
            }
        ));

        let second = tokio::time::timeout(Duration::from_secs(15), events.recv())
            .await
            .expect("no event before timeout")
            .expect("event channel closed");
        match second {
            SheetEvent::FetchFailed { context, reason } => {
                assert_eq!(context, FetchContext::Manual);
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
