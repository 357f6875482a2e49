//! The sampling worker
//!
//! One task owns all mutable engine state. Tick producers (the poll timer
//! or the GPIO interrupt callback) only enqueue "sample now" requests on a
//! bounded channel; no sampling pass can overlap another and no lock is
//! needed around the dispatcher.
//!
//! A pass reads both port registers before dispatching anything, so a bus
//! error abandons the pass cleanly: no events emitted, no state mutated,
//! and the next tick retries. Consecutive failures escalate to a fatal
//! error after a threshold.

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{mpsc, watch};

use crate::dispatcher::Dispatcher;
use crate::expander::PortSource;
use crate::injector::KeySink;

/// Consecutive failed passes tolerated before the worker gives up.
pub const MAX_CONSECUTIVE_BUS_FAILURES: u32 = 10;

/// Interval for self-scheduled ticks while buttons are held in interrupt
/// mode. The expander's interrupt compares against the idle value, so
/// releases never re-assert the INT line; these follow-ups stand in for the
/// missing edges and also advance combo hold timers.
const FOLLOW_UP_INTERVAL: Duration = Duration::from_millis(25);

pub struct Sampler<S, K> {
    source: S,
    dispatcher: Dispatcher,
    sink: K,
    /// Present in interrupt mode: where follow-up ticks are sent.
    followup: Option<mpsc::Sender<()>>,
}

impl<S: PortSource, K: KeySink> Sampler<S, K> {
    pub fn new(source: S, dispatcher: Dispatcher, sink: K) -> Self {
        Self {
            source,
            dispatcher,
            sink,
            followup: None,
        }
    }

    /// Enable interrupt-mode follow-up ticks, sent on the given channel
    /// (normally a clone of the worker's own tick sender).
    pub fn with_followup(mut self, tx: mpsc::Sender<()>) -> Self {
        self.followup = Some(tx);
        self
    }

    /// One sampling pass over both ports.
    fn sample_pass(&mut self) -> Result<()> {
        // Both reads happen before any dispatch so a failed read leaves the
        // engine exactly as it was.
        let raw_a = self.source.read_port(0)?;
        let raw_b = self.source.read_port(1)?;
        let now = Instant::now();

        for (index, raw) in [(0u8, raw_a), (1u8, raw_b)] {
            for event in self.dispatcher.process_sample(index, raw, now) {
                self.sink.emit_key(event.key, event.pressed)?;
            }
        }

        Ok(())
    }

    /// Schedule a delayed tick so held buttons keep getting sampled.
    fn schedule_followup(&self) {
        if let Some(tx) = &self.followup {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(FOLLOW_UP_INTERVAL).await;
                // Full or closed both mean a tick is already on its way or
                // the worker is gone; either way there is nothing to do.
                let _ = tx.try_send(());
            });
        }
    }

    /// Process ticks until the channel closes or shutdown is signalled.
    ///
    /// Returns an error only when consecutive bus failures cross
    /// [`MAX_CONSECUTIVE_BUS_FAILURES`]; the caller turns that into a
    /// non-zero exit.
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("sampler stopping");
                        break;
                    }
                }
                tick = ticks.recv() => {
                    match tick {
                        None => break,
                        Some(()) => match self.sample_pass() {
                            Ok(()) => {
                                consecutive_failures = 0;
                                if !self.dispatcher.all_idle() {
                                    self.schedule_followup();
                                }
                            }
                            Err(e) => {
                                consecutive_failures += 1;
                                tracing::warn!(
                                    consecutive = consecutive_failures,
                                    "sampling pass abandoned: {:#}", e
                                );
                                if consecutive_failures >= MAX_CONSECUTIVE_BUS_FAILURES {
                                    return Err(e.context(
                                        "bus unavailable, giving up after repeated failures",
                                    ));
                                }
                                // Retry even if no further edge arrives.
                                self.schedule_followup();
                            }
                        },
                    }
                }
            }
        }

        Ok(())
    }
}
