//! Profile commands
//!
//! [`ProfileController`] owns the in-memory profile snapshot for one signed-in
//! identity. Local mutations replace the snapshot synchronously and queue a
//! store write; one writer task per controller sends them in order.
//!
//! Snapshots arriving from the store subscription replace the local copy,
//! with local writes the snapshot does not yet reflect laid back on top.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::models::day_record::{upgrade_for_write, write_day_value};
use crate::models::Profile;
use crate::store::document::{decode_profile, encode_profile};
use crate::store::{FieldPath, ProfileStore, ProfileUpdate, Revision, StoreError};
use crate::streak::{self, StreakState};
use crate::trends::daily::{date_key, highest_day_total};
use crate::trends::weekly::{week_end, week_start, weekly_activity_flags};
use crate::trends::{
    self, monthly, weekly, CalendarDay, DashboardSummary, DayActivity, PeriodStats,
};

/// Where the local snapshot stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting for the first snapshot from the store
    Loading,
    Ready(Profile),
    /// The subscription failed before any profile arrived
    Unavailable,
}

/// Why a mutation left the profile unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("No profile loaded")]
    NoProfile,

    #[error("Count for {phrase:?} would drop below zero ({current} {amount:+})")]
    NegativeCount {
        phrase: String,
        current: u64,
        amount: i64,
    },

    #[error("Count for {phrase:?} would overflow")]
    CountOverflow { phrase: String },

    #[error("Phrase is empty")]
    EmptyPhrase,

    #[error("Daily goal must be positive")]
    NonPositiveGoal,
}

/// Background write to the store
pub struct PendingWrite {
    done: Option<oneshot::Receiver<bool>>,
}

impl PendingWrite {
    fn queued(done: oneshot::Receiver<bool>) -> Self {
        Self { done: Some(done) }
    }

    fn local_only() -> Self {
        Self { done: None }
    }

    /// Wait for the write; true if the store accepted it
    pub async fn settled(self) -> bool {
        match self.done {
            Some(done) => done.await.unwrap_or(false),
            None => false,
        }
    }
}

/// Result of a mutation
pub enum MutationOutcome {
    /// The local snapshot changed and a store write was issued
    Applied(PendingWrite),
    /// Nothing changed
    Rejected(Rejection),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            MutationOutcome::Applied(_) => None,
            MutationOutcome::Rejected(rejection) => Some(rejection),
        }
    }

    /// Wait for the store write; false when rejected or the write failed
    pub async fn settled(self) -> bool {
        match self {
            MutationOutcome::Applied(write) => write.settled().await,
            MutationOutcome::Rejected(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
enum RemoteWrite {
    Create(Profile),
    Update(ProfileUpdate),
}

impl RemoteWrite {
    fn apply_to(&self, document: &mut Value) -> Result<(), serde_json::Error> {
        match self {
            RemoteWrite::Create(profile) => *document = encode_profile(profile)?,
            RemoteWrite::Update(update) => update.apply_to(document),
        }
        Ok(())
    }
}

/// Local write not yet reflected in an adopted snapshot
struct UnconfirmedWrite {
    id: u64,
    write: RemoteWrite,
    /// Set once the store has committed the write
    committed_at: Option<Revision>,
}

type UnconfirmedWrites = Arc<Mutex<Vec<UnconfirmedWrite>>>;

struct WriteJob {
    id: u64,
    write: RemoteWrite,
    done: oneshot::Sender<bool>,
}

pub struct ProfileController {
    uid: String,
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    state: RwLock<LoadState>,
    /// In mutation order
    unconfirmed: UnconfirmedWrites,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
    next_write_id: AtomicU64,
}

impl ProfileController {
    pub fn new(
        uid: impl Into<String>,
        store: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            uid: uid.into(),
            store,
            clock,
            config,
            state: RwLock::new(LoadState::Loading),
            unconfirmed: Arc::new(Mutex::new(Vec::new())),
            writer: Mutex::new(None),
            next_write_id: AtomicU64::new(0),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn load_state(&self) -> LoadState {
        self.read_state().clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.read_state(), LoadState::Loading)
    }

    /// Current profile, if one is loaded
    pub fn snapshot(&self) -> Option<Profile> {
        self.with_profile(Profile::clone)
    }

    /// Phrase that increments go to
    pub fn active_phrase(&self) -> Option<String> {
        let fallback = self.config.fallback_phrase();
        self.with_profile(|profile| profile.active_phrase_or(&fallback).to_string())
    }

    // ------------------------------------------------------------------
    // Store-confirmed state
    // ------------------------------------------------------------------

    /// Replace the local snapshot with the document as of `revision`.
    ///
    /// Local writes committed after `revision`, or not committed yet, are
    /// applied on top so an older echo never rolls back newer local changes.
    pub fn apply_remote_snapshot(&self, profile: Profile, revision: Revision) {
        let mut state = self.write_state();
        let mut unconfirmed = self.lock_unconfirmed();
        unconfirmed.retain(|w| w.committed_at.map_or(true, |at| at > revision));

        let adopted = if unconfirmed.is_empty() {
            tracing::debug!("Applying remote snapshot {} for {}", revision, self.uid);
            profile
        } else {
            tracing::debug!(
                "Applying remote snapshot {} for {} under {} local writes",
                revision,
                self.uid,
                unconfirmed.len()
            );
            match overlay(&profile, &unconfirmed) {
                Ok(merged) => merged,
                Err(e) => {
                    tracing::warn!("Could not replay local writes for {}: {}", self.uid, e);
                    profile
                }
            }
        };

        *state = LoadState::Ready(adopted);
    }

    /// Record a subscription failure. A loaded profile is kept.
    pub fn mark_subscription_failed(&self, error: &StoreError) {
        let mut state = self.write_state();
        let loaded = matches!(*state, LoadState::Ready(_));

        if loaded {
            tracing::error!(
                "Profile subscription for {} failed, keeping last snapshot: {}",
                self.uid,
                error
            );
        } else {
            tracing::error!(
                "Profile subscription for {} failed before loading: {}",
                self.uid,
                error
            );
            *state = LoadState::Unavailable;
        }
    }

    /// Adopt a fresh default profile and write it as a full document
    pub fn create_default_profile(&self) -> PendingWrite {
        let profile = Profile::new_default(&self.config, self.clock.today());
        tracing::info!("Creating profile for {}", self.uid);

        let mut state = self.write_state();
        *state = LoadState::Ready(profile.clone());
        self.persist(RemoteWrite::Create(profile))
    }

    // ------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------

    /// Add `amount` (possibly negative) to today's count for the active
    /// phrase. Positive amounts advance the streak.
    pub fn adjust_count(&self, amount: i64) -> MutationOutcome {
        let today = self.clock.today();
        let fallback = self.config.fallback_phrase();

        self.mutate("adjust_count", |current| {
            let phrase = current.active_phrase_or(&fallback).to_string();
            let today_key = date_key(today);
            let record = current.history.get(&today_key);

            let current_value = upgrade_for_write(record, &phrase)
                .get(&phrase)
                .copied()
                .unwrap_or(0);
            let new_value = match apply_amount(current_value, amount) {
                Some(value) => value,
                None if amount < 0 => {
                    return Err(Rejection::NegativeCount {
                        phrase,
                        current: current_value,
                        amount,
                    })
                }
                None => return Err(Rejection::CountOverflow { phrase }),
            };

            let day = write_day_value(record, &phrase, new_value);
            let mut next = current.clone();
            next.history.insert(today_key.clone(), day.clone());

            if amount > 0 {
                let state = StreakState::from_profile(&next);
                let update = streak::advance(&state, &next.history, today);
                tracing::debug!(
                    "Streak {:?}: {} -> {} (max {})",
                    update.transition,
                    next.streak,
                    update.state.streak,
                    update.state.max_streak
                );
                update.state.apply_to(&mut next);
            }

            let update = ProfileUpdate::new()
                .set(FieldPath::History(today_key), json!(day))
                .set(FieldPath::Streak, json!(next.streak))
                .set(FieldPath::MaxStreak, json!(next.max_streak))
                .set(FieldPath::LastActiveDate, json!(next.last_active_date));

            Ok((next, update))
        })
    }

    pub fn set_active_phrase(&self, phrase: &str) -> MutationOutcome {
        self.mutate("set_active_phrase", |current| {
            if phrase.is_empty() {
                return Err(Rejection::EmptyPhrase);
            }

            let mut next = current.clone();
            next.active_phrase = phrase.to_string();
            let update = ProfileUpdate::new().set(FieldPath::ActivePhrase, json!(phrase));
            Ok((next, update))
        })
    }

    pub fn set_daily_goal(&self, goal: u32) -> MutationOutcome {
        self.mutate("set_daily_goal", |current| {
            if goal == 0 {
                return Err(Rejection::NonPositiveGoal);
            }

            let mut next = current.clone();
            next.daily_goal = goal;
            let update = ProfileUpdate::new().set(FieldPath::DailyGoal, json!(goal));
            Ok((next, update))
        })
    }

    /// Append a phrase. Duplicates are allowed; the name is stored as given.
    pub fn add_phrase(&self, name: &str) -> MutationOutcome {
        self.mutate("add_phrase", |current| {
            if name.trim().is_empty() {
                return Err(Rejection::EmptyPhrase);
            }

            let mut next = current.clone();
            next.phrases.push(name.to_string());
            let update = ProfileUpdate::new().set(FieldPath::Phrases, json!(next.phrases));
            Ok((next, update))
        })
    }

    // ------------------------------------------------------------------
    // Read-only statistics
    // ------------------------------------------------------------------

    pub fn dashboard(&self) -> Option<DashboardSummary> {
        let today = self.clock.today();
        let fallback = self.config.fallback_phrase();
        self.with_profile(|profile| {
            DashboardSummary::from_profile(profile, profile.active_phrase_or(&fallback), today)
        })
    }

    /// Stats for the active phrase over an arbitrary range
    pub fn period_stats(&self, start: NaiveDate, end: NaiveDate) -> Option<PeriodStats> {
        let fallback = self.config.fallback_phrase();
        self.with_profile(|profile| {
            trends::aggregate(&profile.history, profile.active_phrase_or(&fallback), start, end)
        })
    }

    /// Week chart for the active phrase, for the week containing `anchor`
    pub fn weekly_stats(&self, anchor: NaiveDate) -> Option<PeriodStats> {
        let fallback = self.config.fallback_phrase();
        let starts_on = self.config.week_starts_on;
        self.with_profile(|profile| {
            weekly::weekly_stats(
                &profile.history,
                profile.active_phrase_or(&fallback),
                anchor,
                starts_on,
            )
        })
    }

    /// Month chart for the active phrase, for the month containing `anchor`
    pub fn monthly_stats(&self, anchor: NaiveDate) -> Option<PeriodStats> {
        let fallback = self.config.fallback_phrase();
        self.with_profile(|profile| {
            monthly::monthly_stats(&profile.history, profile.active_phrase_or(&fallback), anchor)
        })
    }

    /// Activity strip for the current week
    pub fn week_activity(&self) -> Option<Vec<DayActivity>> {
        let today = self.clock.today();
        let starts_on = self.config.week_starts_on;
        self.with_profile(|profile| {
            weekly_activity_flags(
                &profile.history,
                week_start(today, starts_on),
                week_end(today, starts_on),
                today,
            )
        })
    }

    pub fn month_calendar(&self, anchor: NaiveDate) -> Option<Vec<CalendarDay>> {
        self.with_profile(|profile| {
            monthly::month_calendar(&profile.history, anchor, profile.effective_goal())
        })
    }

    pub fn highest_day_total(&self) -> Option<u64> {
        self.with_profile(|profile| highest_day_total(&profile.history))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read_state(&self) -> RwLockReadGuard<'_, LoadState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LoadState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn with_profile<T>(&self, f: impl FnOnce(&Profile) -> T) -> Option<T> {
        match &*self.read_state() {
            LoadState::Ready(profile) => Some(f(profile)),
            _ => None,
        }
    }

    fn lock_unconfirmed(&self) -> MutexGuard<'_, Vec<UnconfirmedWrite>> {
        self.unconfirmed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Compute the next snapshot under the write lock, swap it in and queue
    /// the store write before the lock is released
    fn mutate<F>(&self, operation: &str, f: F) -> MutationOutcome
    where
        F: FnOnce(&Profile) -> Result<(Profile, ProfileUpdate), Rejection>,
    {
        let mut state = self.write_state();
        let LoadState::Ready(current) = &*state else {
            tracing::debug!("{} ignored: no profile loaded for {}", operation, self.uid);
            return MutationOutcome::Rejected(Rejection::NoProfile);
        };

        match f(current) {
            Ok((next, update)) => {
                *state = LoadState::Ready(next);
                tracing::debug!("{} persisting {}", operation, update.paths().join(", "));
                MutationOutcome::Applied(self.persist(RemoteWrite::Update(update)))
            }
            Err(rejection) => {
                tracing::debug!("{} rejected: {}", operation, rejection);
                MutationOutcome::Rejected(rejection)
            }
        }
    }

    /// Queue a store write behind earlier ones. Failures are logged; the
    /// local snapshot stays as it is. Callers hold the state lock.
    fn persist(&self, write: RemoteWrite) -> PendingWrite {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, change for {} kept locally only", self.uid);
            return PendingWrite::local_only();
        };

        let id = self.next_write_id.fetch_add(1, Ordering::SeqCst);
        let (done, settled) = oneshot::channel();
        self.lock_unconfirmed().push(UnconfirmedWrite {
            id,
            write: write.clone(),
            committed_at: None,
        });

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut job = WriteJob { id, write, done };
        if let Some(jobs) = writer.as_ref() {
            match jobs.send(job) {
                Ok(()) => return PendingWrite::queued(settled),
                // Writer task is gone, start a new one
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let (jobs, queue) = mpsc::unbounded_channel();
        runtime.spawn(run_writer(
            self.uid.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.unconfirmed),
            queue,
        ));
        if jobs.send(job).is_err() {
            tracing::warn!("Store writer for {} did not start, change kept locally", self.uid);
            self.lock_unconfirmed().retain(|w| w.id != id);
            return PendingWrite::local_only();
        }
        *writer = Some(jobs);
        PendingWrite::queued(settled)
    }
}

/// Send queued writes to the store one at a time, in queue order
async fn run_writer(
    uid: String,
    store: Arc<dyn ProfileStore>,
    unconfirmed: UnconfirmedWrites,
    mut queue: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = queue.recv().await {
        let result = match job.write {
            RemoteWrite::Create(profile) => store.create(&uid, &profile).await,
            RemoteWrite::Update(update) => store.update(&uid, update).await,
        };

        let mut pending = unconfirmed.lock().unwrap_or_else(|e| e.into_inner());
        let accepted = match result {
            Ok(revision) => {
                if let Some(write) = pending.iter_mut().find(|w| w.id == job.id) {
                    write.committed_at = Some(revision);
                }
                true
            }
            Err(e) => {
                tracing::warn!("Saving locally, store write for {} failed: {}", uid, e);
                pending.retain(|w| w.id != job.id);
                false
            }
        };
        drop(pending);

        // Nobody waiting is fine
        let _ = job.done.send(accepted);
    }
}

/// `remote` with `writes` applied in order
fn overlay(remote: &Profile, writes: &[UnconfirmedWrite]) -> Result<Profile, serde_json::Error> {
    let mut document = encode_profile(remote)?;
    for unconfirmed in writes {
        unconfirmed.write.apply_to(&mut document)?;
    }
    decode_profile(document)
}

fn apply_amount(current: u64, amount: i64) -> Option<u64> {
    if amount >= 0 {
        current.checked_add(amount.unsigned_abs())
    } else {
        current.checked_sub(amount.unsigned_abs())
    }
}
