//! Background status poller

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest the poller sleeps before re-checking its stop flag.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Running,
    Stopped,
}

impl AppStatus {
    pub fn from_running(running: bool) -> Self {
        if running {
            AppStatus::Running
        } else {
            AppStatus::Stopped
        }
    }

    pub fn is_running(self) -> bool {
        self == AppStatus::Running
    }
}

/// Handle to a poller thread. The thread posts an [`AppStatus`] whenever
/// the observed state changes (and once at start), and exits when the
/// handle is dropped or the receiving side hangs up.
pub struct StatusMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    pub(crate) fn spawn<F>(interval: Duration, is_running: F, sink: Sender<AppStatus>) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut last = None;
            while !flag.load(Ordering::Relaxed) {
                let status = AppStatus::from_running(is_running());
                if last != Some(status) {
                    log::debug!("Status changed: {status:?}");
                    if sink.send(status).is_err() {
                        break;
                    }
                    last = Some(status);
                }

                let wake = Instant::now() + interval;
                while !flag.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if now >= wake {
                        break;
                    }
                    thread::sleep(STOP_CHECK_SLICE.min(wake - now));
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
