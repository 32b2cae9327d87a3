// src/worker.rs

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::orchestrator::{LogSink, Orchestrator, RunPhase, TweakOutcome};

/// Progress of a background run, in the order it happened.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Phase(RunPhase),
    Line(String),
    Finished(TweakOutcome),
    /// Always the last event of a run.
    Completed(Vec<TweakOutcome>),
}

/// Forwards sink calls to the channel.
struct ChannelSink {
    sender: Sender<RunEvent>,
}

impl ChannelSink {
    fn send(&self, event: RunEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::debug!("Run event dropped, receiver is gone: {:?}", e.into_inner());
        }
    }
}

impl LogSink for ChannelSink {
    fn line(&mut self, text: &str) {
        self.send(RunEvent::Line(text.to_string()));
    }

    fn phase(&mut self, phase: RunPhase) {
        self.send(RunEvent::Phase(phase));
    }

    fn finished(&mut self, outcome: &TweakOutcome) {
        self.send(RunEvent::Finished(outcome.clone()));
    }
}

/// A run executing off the calling thread.
pub struct RunHandle {
    pub events: Receiver<RunEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    /// Asks the run to stop before its next item. The item in progress, including
    /// an open elevation prompt, is not interrupted.
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested.");
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the worker thread exits.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Run thread terminated abnormally.");
            }
        }
    }
}

/// Starts `items` on a background thread and returns immediately.
pub fn spawn_run(
    orchestrator: Arc<Orchestrator>,
    items: Vec<String>,
    elevated_already: bool,
) -> RunHandle {
    let (sender, receiver) = unbounded::<RunEvent>();
    let cancel = orchestrator.cancel_flag();
    cancel.store(false, Ordering::SeqCst);

    let thread = thread::spawn(move || {
        let mut sink = ChannelSink { sender };

        // Keep the channel contract even if a tweak panics.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            orchestrator.run_selected(&items, elevated_already, &mut sink)
        }));

        let outcomes = match result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Run thread panicked: {:?}", e);
                sink.line("⚠ Internal error, run aborted.");
                Vec::new()
            }
        };
        sink.send(RunEvent::Completed(outcomes));
        tracing::info!("Run thread terminating.");
    });

    RunHandle {
        events: receiver,
        cancel,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig,
        language::{Language, Message},
        tweaks::{
            all_tweaks,
            method::testing::{output, FakeBroker, FakeRunner, NoPolicy},
        },
        utils::windows::ElevationOutcome,
    };

    fn orchestrator(runner: FakeRunner) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            all_tweaks(),
            Arc::new(runner),
            Arc::new(FakeBroker::new(ElevationOutcome::DeniedByUser)),
            Arc::new(NoPolicy),
            EngineConfig::default(),
        ))
    }

    #[test]
    fn test_events_end_with_completed() {
        let handle = spawn_run(
            orchestrator(FakeRunner::new(|_, _| output(0, "ran", ""))),
            vec!["one.ps1".to_string(), "two.cmd".to_string()],
            false,
        );

        let events: Vec<RunEvent> = handle.events.iter().collect();
        let finished = events
            .iter()
            .filter(|e| matches!(e, RunEvent::Finished(_)))
            .count();
        assert_eq!(finished, 2);
        assert!(matches!(events.first(), Some(RunEvent::Phase(RunPhase::Idle))));
        match events.last() {
            Some(RunEvent::Completed(outcomes)) => {
                assert_eq!(outcomes.len(), 2);
                assert!(outcomes.iter().all(|o| o.succeeded));
            }
            other => panic!("unexpected last event {:?}", other),
        }
        handle.join();
    }

    #[test]
    fn test_cancel_between_items() {
        let (started_tx, started_rx) = unbounded::<()>();
        let (gate_tx, gate_rx) = unbounded::<()>();
        let runner = FakeRunner::new(move |_, _| {
            // Hold the first item until the test has cancelled.
            let _ = started_tx.send(());
            let _ = gate_rx.recv();
            output(0, "", "")
        });
        let handle = spawn_run(
            orchestrator(runner),
            vec!["one.ps1".to_string(), "two.ps1".to_string()],
            false,
        );

        started_rx.recv().unwrap();
        handle.cancel();
        gate_tx.send(()).unwrap();
        drop(gate_tx);

        let events: Vec<RunEvent> = handle.events.iter().collect();
        let cancelled = Message::RunCancelled.text(Language::English);
        assert!(events
            .iter()
            .any(|e| matches!(e, RunEvent::Line(line) if line == cancelled)));
        match events.last() {
            Some(RunEvent::Completed(outcomes)) => assert_eq!(outcomes.len(), 1),
            other => panic!("unexpected last event {:?}", other),
        }
        handle.join();
    }

    #[test]
    fn test_panicking_run_still_completes() {
        let handle = spawn_run(
            orchestrator(FakeRunner::new(|_, _| panic!("runner exploded"))),
            vec!["boom.ps1".to_string()],
            false,
        );
        let events: Vec<RunEvent> = handle.events.iter().collect();
        assert!(matches!(events.last(), Some(RunEvent::Completed(o)) if o.is_empty()));
        handle.join();
    }
}
