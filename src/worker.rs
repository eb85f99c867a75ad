//! Running one operation off the calling thread.
//!
//! ```no_run
//! use std::path::Path;
//! use tidytree::{CategoryTable, OrganizeOptions, Organizer, worker};
//!
//! let task = worker::spawn(256, |sink, cancel| {
//!     Organizer::new(CategoryTable::default())
//!         .with_events(sink)
//!         .with_cancel(cancel)
//!         .organize(Path::new("inbox"), &OrganizeOptions::default())
//! });
//! for event in task.events() {
//!     println!("{event}");
//! }
//! let stats = task.join().expect("worker panicked")?;
//! # Ok::<(), tidytree::OrganizeError>(())
//! ```

use crate::events::{Event, EventSink};
use crate::guard::CancelToken;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

/// A running operation with its event stream and cancel switch.
pub struct BackgroundTask<T> {
    handle: JoinHandle<T>,
    events: Receiver<Event>,
    cancel: CancelToken,
}

/// Starts `job` on a new thread.
///
/// `job` receives a sink feeding a queue of `capacity` events and the token
/// that [`BackgroundTask::cancel`] sets.
pub fn spawn<T, F>(capacity: usize, job: F) -> BackgroundTask<T>
where
    T: Send + 'static,
    F: FnOnce(EventSink, CancelToken) -> T + Send + 'static,
{
    let (sink, events) = EventSink::channel(capacity);
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let handle = thread::spawn(move || job(sink, token));
    BackgroundTask {
        handle,
        events,
        cancel,
    }
}

impl<T> BackgroundTask<T> {
    /// Events received so far, without waiting.
    pub fn try_events(&self) -> Vec<Event> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Blocking iterator over events; ends once the job has finished.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.events.iter()
    }

    /// Asks the job to stop after the file it is working on.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job and returns its result.
    pub fn join(self) -> thread::Result<T> {
        self.handle.join()
    }
}
