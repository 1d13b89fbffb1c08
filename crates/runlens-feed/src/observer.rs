use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use runlens_core::records::JobStatus;

use crate::contracts::FeedClient;
use crate::controller::PollUpdate;
use crate::controller::PollingController;

#[derive(Debug, Clone, PartialEq)]
pub enum ObservationEvent {
    Progress(PollUpdate),
    Finished { run_id: String, status: JobStatus },
}

/// A controller running on its own worker thread. The worker ticks every
/// `tick`; the controller decides when a tick turns into a fetch.
pub struct Observation {
    run_id: String,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<PollingController>,
}

impl Observation {
    pub fn spawn<F>(
        client: Arc<dyn FeedClient>,
        mut controller: PollingController,
        tick: Duration,
        mut on_event: F,
    ) -> Self
    where
        F: FnMut(ObservationEvent) + Send + 'static,
    {
        let run_id = controller.run_id().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        let handle = thread::spawn(move || {
            if !controller.start() {
                return controller;
            }
            while !worker_cancel.load(Ordering::SeqCst) {
                if let Some(fetch) = controller.poll(client.as_ref(), Instant::now()) {
                    if worker_cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(update) = controller.apply(fetch, Instant::now()) {
                        let finished = update.terminal.then(|| ObservationEvent::Finished {
                            run_id: update.run_id.clone(),
                            status: update.status.clone(),
                        });
                        on_event(ObservationEvent::Progress(update));
                        if let Some(event) = finished {
                            on_event(event);
                            return controller;
                        }
                    }
                }
                thread::sleep(tick);
            }
            controller.stop();
            controller
        });

        Self {
            run_id,
            cancel,
            handle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Asks the worker to stop after its current tick. An in-flight fetch
    /// completes and is discarded.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and hands back its controller, trace cursor
    /// intact. `None` if the worker panicked.
    pub fn join(self) -> Option<PollingController> {
        match self.handle.join() {
            Ok(controller) => Some(controller),
            Err(_) => {
                tracing::error!(run_id = %self.run_id, "observation worker panicked");
                None
            }
        }
    }
}
