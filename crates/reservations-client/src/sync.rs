//! Client synchronization state.
//!
//! The list lives in memory and is the source of truth for write-back. It is
//! loaded once from the read endpoint; until that request settles, local
//! changes are kept but never sent, so a slow or failed load cannot be
//! clobbered by an empty write. After that, every change sends the full list
//! in a background task. Writes are not sequenced: whichever lands last wins.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use reservations_core::{Reservation, MAX_SEATS};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ReservationsApi;
use crate::error::SyncError;

/// Whether the initial read has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Unloaded,
    Loaded,
}

/// Result of `ReservationSync::load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Remote document replaced the local list
    Fetched(usize),
    /// Read failed; the local list was kept
    Failed,
    /// Another call already performed the load
    AlreadyStarted,
}

/// What happened to the write-back of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    /// No write was issued (initial load still pending)
    Held,
    /// A write carrying the full list is in flight
    Scheduled,
}

#[derive(Debug)]
struct SyncState {
    phase: LoadPhase,
    reservations: Vec<Reservation>,
}

/// In-memory reservation list synchronized with the remote document.
pub struct ReservationSync {
    api: Arc<dyn ReservationsApi>,
    state: Mutex<SyncState>,
    load_started: AtomicBool,
    runtime: OnceLock<Handle>,
    writes: Mutex<Vec<JoinHandle<()>>>,
}

impl ReservationSync {
    pub fn new(api: Arc<dyn ReservationsApi>) -> Self {
        Self {
            api,
            state: Mutex::new(SyncState {
                phase: LoadPhase::Unloaded,
                reservations: Vec::new(),
            }),
            load_started: AtomicBool::new(false),
            runtime: OnceLock::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Perform the initial read. Only the first call does any work.
    ///
    /// The phase becomes `Loaded` once the request settles, whatever its outcome.
    pub async fn load(&self) -> LoadOutcome {
        if self.load_started.swap(true, Ordering::SeqCst) {
            return LoadOutcome::AlreadyStarted;
        }
        if let Ok(handle) = Handle::try_current() {
            let _ = self.runtime.set(handle);
        }

        let result = self.api.fetch().await;

        let mut state = self.lock_state();
        let outcome = match result {
            Ok(reservations) => {
                let count = reservations.len();
                state.reservations = reservations;
                info!("Loaded {} reservations", count);
                LoadOutcome::Fetched(count)
            }
            Err(e) => {
                warn!("Initial load failed, continuing with local list: {}", e);
                LoadOutcome::Failed
            }
        };
        state.phase = LoadPhase::Loaded;
        outcome
    }

    /// Run `load` in the background.
    pub fn spawn_load(self: &Arc<Self>) -> JoinHandle<LoadOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.load().await })
    }

    pub fn phase(&self) -> LoadPhase {
        self.lock_state().phase
    }

    pub fn is_loaded(&self) -> bool {
        self.phase() == LoadPhase::Loaded
    }

    /// Snapshot of the current list.
    pub fn reservations(&self) -> Vec<Reservation> {
        self.lock_state().reservations.clone()
    }

    /// Reservations scheduled after `now`.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Reservation> {
        self.lock_state()
            .reservations
            .iter()
            .filter(|r| r.starts_after(now))
            .cloned()
            .collect()
    }

    /// Apply `f` to the list and write the result back if loaded.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Reservation>) -> R) -> (R, Persist) {
        match self.try_mutate(|list| Ok::<_, Infallible>(f(list))) {
            Ok(done) => done,
            Err(never) => match never {},
        }
    }

    /// Like `mutate`, but nothing is written when `f` fails.
    pub fn try_mutate<R, E>(
        &self,
        f: impl FnOnce(&mut Vec<Reservation>) -> Result<R, E>,
    ) -> Result<(R, Persist), E> {
        let (result, snapshot) = {
            let mut state = self.lock_state();
            let result = f(&mut state.reservations)?;
            let snapshot = (state.phase == LoadPhase::Loaded).then(|| state.reservations.clone());
            (result, snapshot)
        };

        let persist = match snapshot {
            Some(snapshot) => self.schedule_write(snapshot),
            None => {
                debug!("Initial load pending, not writing");
                Persist::Held
            }
        };
        Ok((result, persist))
    }

    /// Book a table. The new reservation gets a fresh id and no seats.
    pub fn reserve(
        &self,
        table_number: u32,
        reserved_by: &str,
        date: &str,
    ) -> Result<(Reservation, Persist), SyncError> {
        if table_number == 0 {
            return Err(SyncError::InvalidInput(
                "table number must be positive".to_string(),
            ));
        }
        let reserved_by = reserved_by.trim();
        if reserved_by.is_empty() {
            return Err(SyncError::InvalidInput(
                "reserving name must not be empty".to_string(),
            ));
        }

        let reservation = Reservation::new(table_number, reserved_by, date);
        let ((), persist) = self.mutate(|list| list.push(reservation.clone()));
        Ok((reservation, persist))
    }

    /// Seat a guest on the next free seat of a reservation.
    pub fn add_seat(&self, id: &str, guest: &str) -> Result<Persist, SyncError> {
        let guest = guest.trim();
        if guest.is_empty() {
            return Err(SyncError::InvalidInput("guest name must not be empty".to_string()));
        }

        let ((), persist) = self.try_mutate(|list| {
            let reservation = list
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
            if !reservation.has_free_seat() {
                return Err(SyncError::TableFull {
                    id: id.to_string(),
                    max: MAX_SEATS,
                });
            }
            reservation.seats.push(guest.to_string());
            Ok(())
        })?;
        Ok(persist)
    }

    /// Remove a reservation; the remote document is rewritten without it.
    pub fn cancel(&self, id: &str) -> Result<(Reservation, Persist), SyncError> {
        self.try_mutate(|list| {
            let pos = list
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
            Ok(list.remove(pos))
        })
    }

    /// Replace the whole list.
    pub fn replace_all(&self, reservations: Vec<Reservation>) -> Persist {
        self.mutate(|list| *list = reservations).1
    }

    /// Wait for every write issued so far to finish.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.lock_writes());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Write task failed: {}", e);
            }
        }
    }

    fn schedule_write(&self, snapshot: Vec<Reservation>) -> Persist {
        let Some(handle) = self
            .runtime
            .get()
            .cloned()
            .or_else(|| Handle::try_current().ok())
        else {
            warn!("No async runtime available, dropping write of {} reservations", snapshot.len());
            return Persist::Held;
        };

        let api = Arc::clone(&self.api);
        let task = handle.spawn(async move {
            match api.save(&snapshot).await {
                Ok(()) => debug!("Saved {} reservations", snapshot.len()),
                Err(e) => warn!("Failed to save reservations: {}", e),
            }
        });

        let mut writes = self.lock_writes();
        writes.retain(|w| !w.is_finished());
        writes.push(task);
        Persist::Scheduled
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writes(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
