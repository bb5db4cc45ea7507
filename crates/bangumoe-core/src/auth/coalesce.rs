//! Single-slot request coalescer.
//!
//! Only one profile exists per process, so the key is implicit: while a
//! flight is outstanding every caller awaits the same shared future and
//! receives a clone of its output. The slot empties itself when the flight
//! settles, so the next call after completion starts fresh.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

struct Flight<T> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

pub struct SingleFlight<T: Clone> {
    slot: Arc<Mutex<Option<Flight<T>>>>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the outstanding flight, or start one with `make`.
    /// `make` is only called when the slot is empty.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(flight) => {
                    debug!(flight = flight.id, "Joining in-flight request");
                    flight.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let slot_ref = Arc::clone(&self.slot);
                    let work = make();
                    let future = async move {
                        let output = work.await;
                        let mut slot = slot_ref.lock().unwrap_or_else(|e| e.into_inner());
                        // A cleared or replaced slot belongs to someone else now
                        if slot.as_ref().map(|f| f.id) == Some(id) {
                            *slot = None;
                        }
                        output
                    }
                    .boxed()
                    .shared();
                    *slot = Some(Flight {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        shared.await
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Forget the outstanding flight. Callers already awaiting it still get
    /// its result; new callers start a fresh one.
    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
