//! Reachability checking: single TCP probes and the bounded scheduler that fans them out

use crate::proxy::models::ProbeResult;
use crate::proxy::parser::EndpointParser;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

/// Default timeout for a single connect attempt in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 4;

/// Default number of probes in flight
const DEFAULT_CONCURRENCY: usize = 200;

/// Configuration for reachability checks
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each connect attempt
    pub timeout: Duration,
    /// Maximum number of probes in flight
    pub concurrency: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// TCP connect prober for a single descriptor
#[derive(Debug, Clone)]
pub struct ReachabilityProber {
    timeout: Duration,
}

impl ReachabilityProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect to the descriptor's target and measure how long it took
    ///
    /// Unparseable descriptors, refusals, DNS failures and timeouts all yield
    /// `None`. The stream is dropped before returning.
    pub async fn probe(&self, descriptor: &str) -> Option<ProbeResult> {
        let target = EndpointParser::parse(descriptor)?;

        let start = Instant::now();
        let connect = TcpStream::connect((target.host.as_str(), target.port));
        let stream = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(_)) | Err(_) => return None,
        };
        let latency_ms = (start.elapsed().as_secs_f64() * 1000.0).round() as u64;
        drop(stream);

        Some(ProbeResult::new(descriptor.to_string(), latency_ms, target.host))
    }
}

/// Outcome of one dispatched probe
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    /// Position of the descriptor in dispatch order
    pub index: usize,
    pub result: Option<ProbeResult>,
}

/// Running counters reported while probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeProgress {
    pub completed: usize,
    pub total: usize,
    pub reachable: usize,
}

impl ProbeProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Fans probes out over a descriptor set under a concurrency ceiling
#[derive(Debug, Clone)]
pub struct ProbeScheduler {
    config: CheckerConfig,
    prober: ReachabilityProber,
}

impl ProbeScheduler {
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        let prober = ReachabilityProber::new(config.timeout);
        Self { config, prober }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Probe every descriptor, emitting each outcome as soon as it completes
    ///
    /// At most `concurrency` probes hold a permit at once. The receiver
    /// closes once every dispatched probe has reported.
    pub fn probe_stream(&self, descriptors: Vec<String>) -> mpsc::Receiver<ProbeEvent> {
        let prober = self.prober.clone();
        dispatch_bounded(descriptors, self.config.concurrency, move |descriptor| {
            let prober = prober.clone();
            async move { prober.probe(&descriptor).await }
        })
    }

    /// Probe every descriptor and return the reachable ones, fastest first
    ///
    /// `on_progress` is called once per completed probe. Equal latencies keep
    /// the order in which descriptors were given.
    pub async fn run_all<I, F>(&self, descriptors: I, mut on_progress: F) -> Vec<ProbeResult>
    where
        I: IntoIterator<Item = String>,
        F: FnMut(ProbeProgress),
    {
        let descriptors: Vec<String> = descriptors.into_iter().collect();
        let mut progress = ProbeProgress {
            total: descriptors.len(),
            ..Default::default()
        };
        if descriptors.is_empty() {
            return Vec::new();
        }

        let mut rx = self.probe_stream(descriptors);
        let mut reachable = Vec::new();

        while let Some(event) = rx.recv().await {
            progress.completed += 1;
            if let Some(result) = event.result {
                debug!(
                    descriptor = %result.descriptor,
                    latency_ms = result.latency_ms,
                    "endpoint reachable"
                );
                reachable.push((event.index, result));
                progress.reachable += 1;
            }
            on_progress(progress);
        }

        sort_by_latency(reachable)
    }
}

impl Default for ProbeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `probe` over every descriptor with at most `concurrency` calls in flight
///
/// A call keeps its permit until its outcome is queued on the channel.
fn dispatch_bounded<P, Fut>(
    descriptors: Vec<String>,
    concurrency: usize,
    probe: P,
) -> mpsc::Receiver<ProbeEvent>
where
    P: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = Option<ProbeResult>> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let (tx, rx) = mpsc::channel(concurrency);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    tokio::spawn(async move {
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            // The semaphore is owned by this task and never closed
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let tx = tx.clone();
            let unit = probe(descriptor);
            tokio::spawn(async move {
                let _permit = permit;
                let result = unit.await;
                let _ = tx.send(ProbeEvent { index, result }).await;
            });
        }
    });

    rx
}

/// Order results by latency, then by dispatch position
fn sort_by_latency(mut collected: Vec<(usize, ProbeResult)>) -> Vec<ProbeResult> {
    collected.sort_by_key(|(index, result)| (result.latency_ms, *index));
    collected.into_iter().map(|(_, result)| result).collect()
}
