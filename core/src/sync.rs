//! Reconciliation between the local nutrition document and the remote store.
//!
//! The engine is an explicit state object: `Idle` until authenticated,
//! `Syncing` while a fetch/merge is in flight, then `Synced` or
//! `SyncedWithError`. At most one sync runs at a time; a tick that arrives
//! mid-sync is skipped, never queued. Failures are recorded for display and
//! retried on the next tick; the last known good local state is always
//! retained.
//!
//! Merge policy is last-write-wins per date bucket: the `updated_at`
//! timestamps decide whether local or remote wins, and the newer bucket
//! replaces the older wholesale. There is no field-level merge.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DailyLog, Goals};
use crate::state::NutritionState;

/// Wire envelope shared by the remote nutrition API and its server.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default = "none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Day buckets and goals where the local copy won the merge, to be uploaded.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncPush {
    #[serde(default)]
    pub days: BTreeMap<NaiveDate, DailyLog>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goals: Option<Goals>,
}

impl SyncPush {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.goals.is_none()
    }
}

/// Transport seam to the remote nutrition store. The CLI implements this
/// with reqwest; tests use in-memory mocks.
pub trait NutritionApi: Send + Sync {
    /// Fetch the authoritative document, or `None` when the server has no
    /// state for this user yet.
    fn fetch(&self) -> Result<Option<NutritionState>>;
    fn push(&self, push: &SyncPush) -> Result<()>;
}

/// Merge a remote document into the local one, bucket by bucket.
///
/// Remote-only buckets are inserted; where both sides have a bucket the
/// newer `updated_at` wins. Returns the buckets (and goals) where local won
/// or the remote side is missing them; the caller uploads those.
pub fn merge_remote(local: &mut NutritionState, remote: NutritionState) -> SyncPush {
    let mut push = SyncPush::default();

    let mut remote_days = remote.days;
    let mut remote_wins: Vec<(NaiveDate, DailyLog)> = Vec::new();
    for (date, local_bucket) in &local.days {
        match remote_days.remove(date) {
            Some(remote_bucket) => {
                if remote_bucket.updated_at > local_bucket.updated_at {
                    remote_wins.push((*date, remote_bucket));
                } else if local_bucket.updated_at > remote_bucket.updated_at {
                    push.days.insert(*date, local_bucket.clone());
                }
            }
            None => {
                push.days.insert(*date, local_bucket.clone());
            }
        }
    }

    for (date, bucket) in remote_wins {
        local.days.insert(date, bucket);
    }
    // Buckets only the remote has
    for (date, bucket) in remote_days {
        local.days.insert(date, bucket);
    }

    // Goals follow the same per-document LWW
    match (&local.goals, remote.goals) {
        (Some(l), Some(r)) => {
            if r.updated_at > l.updated_at {
                local.goals = Some(r);
            } else if l.updated_at > r.updated_at {
                push.goals = local.goals.clone();
            }
        }
        (Some(_), None) => push.goals = local.goals.clone(),
        (None, Some(r)) => local.goals = Some(r),
        (None, None) => {}
    }

    push
}

/// Server-side half of the merge: fold an uploaded [`SyncPush`] into the
/// authoritative document under the same LWW rules. Stale uploads (bucket
/// timestamps at or behind the server's) are ignored.
pub fn apply_push(state: &mut NutritionState, push: SyncPush) -> usize {
    let mut applied = 0;
    for (date, bucket) in push.days {
        let server_newer = state
            .days
            .get(&date)
            .is_some_and(|existing| existing.updated_at >= bucket.updated_at);
        if !server_newer {
            state.days.insert(date, bucket);
            applied += 1;
        }
    }
    if let Some(goals) = push.goals {
        let server_newer = state
            .goals
            .as_ref()
            .is_some_and(|g| g.updated_at >= goals.updated_at);
        if !server_newer {
            state.goals = Some(goals);
        }
    }
    applied
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Not authenticated; the loop is gated off.
    Idle,
    /// A fetch/merge is in flight.
    Syncing,
    /// Last sync succeeded; awaiting the next interval or trigger.
    Synced,
    /// Last sync failed; local state retained, error recorded for display.
    SyncedWithError,
}

/// Point-in-time view of the engine for UI display.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct SyncEngine {
    phase: SyncPhase,
    authenticated: bool,
    last_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            authenticated: false,
            last_synced_at: None,
            last_error: None,
        }
    }

    /// Gate the loop on auth status. Returns `true` when authentication was
    /// just gained, which callers treat as an immediate sync trigger.
    /// Logout cancels back to `Idle` from any state.
    pub fn set_authenticated(&mut self, authenticated: bool) -> bool {
        let gained = authenticated && !self.authenticated;
        self.authenticated = authenticated;
        if !authenticated {
            self.phase = SyncPhase::Idle;
            self.last_error = None;
        }
        gained
    }

    /// Claim the single in-flight slot. Returns `false` (the tick is a
    /// skip) when unauthenticated or a sync is already running.
    pub fn try_begin(&mut self) -> bool {
        if !self.authenticated || self.phase == SyncPhase::Syncing {
            return false;
        }
        self.phase = SyncPhase::Syncing;
        true
    }

    /// Record the outcome of the in-flight sync. A completion arriving after
    /// logout (phase already back to `Idle`) is dropped.
    pub fn complete(&mut self, result: Result<(), String>, now: DateTime<Utc>) {
        if self.phase != SyncPhase::Syncing {
            return;
        }
        match result {
            Ok(()) => {
                self.phase = SyncPhase::Synced;
                self.last_synced_at = Some(now);
                self.last_error = None;
            }
            Err(message) => {
                self.phase = SyncPhase::SyncedWithError;
                self.last_error = Some(message);
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.phase,
            last_synced_at: self.last_synced_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// What a single sync attempt did.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Unauthenticated or already syncing; nothing happened.
    Skipped,
    /// Fetch, merge, and upload all succeeded.
    Completed { pulled_days: usize, pushed_days: usize },
    /// Transport or server failure; local state untouched beyond what had
    /// already merged. The message is also recorded on the engine.
    Failed(String),
}

/// One sync attempt: claim the in-flight slot, fetch, merge LWW, upload
/// local winners, release the slot. Errors degrade to
/// [`SyncOutcome::Failed`]; nothing here panics or bubbles a hard error.
pub fn run_sync(
    engine: &mut SyncEngine,
    api: &dyn NutritionApi,
    state: &mut NutritionState,
    now: DateTime<Utc>,
) -> SyncOutcome {
    if !engine.try_begin() {
        return SyncOutcome::Skipped;
    }

    let outcome = attempt(api, state);
    match outcome {
        Ok((pulled_days, pushed_days)) => {
            engine.complete(Ok(()), now);
            tracing::debug!("sync complete: pulled {pulled_days} day(s), pushed {pushed_days}");
            SyncOutcome::Completed {
                pulled_days,
                pushed_days,
            }
        }
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!("sync failed: {message}");
            engine.complete(Err(message.clone()), now);
            SyncOutcome::Failed(message)
        }
    }
}

fn attempt(api: &dyn NutritionApi, state: &mut NutritionState) -> Result<(usize, usize)> {
    let remote = api.fetch()?;
    let (pulled, push) = match remote {
        Some(remote) => {
            let before: BTreeMap<NaiveDate, DateTime<Utc>> = state
                .days
                .iter()
                .map(|(d, b)| (*d, b.updated_at))
                .collect();
            let push = merge_remote(state, remote);
            let pulled = state
                .days
                .iter()
                .filter(|(d, b)| before.get(d) != Some(&b.updated_at))
                .count();
            (pulled, push)
        }
        None => {
            // Fresh server: everything local goes up
            let push = SyncPush {
                days: state.days.clone(),
                goals: state.goals.clone(),
            };
            (0, push)
        }
    };

    let pushed = push.days.len();
    if !push.is_empty() {
        api.push(&push)?;
    }
    Ok((pulled, pushed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodCategory, FoodItem, MealType};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        "2024-01-01T12:00:00Z".parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn food() -> FoodItem {
        FoodItem {
            name: "Rice".to_string(),
            calories: 130.0,
            protein: 2.7,
            carbs: 28.0,
            fat: 0.3,
            serving: "100 g".to_string(),
            category: FoodCategory::Grain,
            brand: None,
            barcode: None,
            source: "manual".to_string(),
        }
    }

    fn state_with_day(d: &str, at: DateTime<Utc>) -> NutritionState {
        let mut state = NutritionState::default();
        state
            .add_meal(date(d), MealType::Lunch, food(), 1.0, at)
            .unwrap();
        state
    }

    struct MockApi {
        remote: Option<NutritionState>,
        fetches: Mutex<usize>,
        pushes: Mutex<Vec<SyncPush>>,
        fail: bool,
    }

    impl MockApi {
        fn new(remote: Option<NutritionState>) -> Self {
            Self {
                remote,
                fetches: Mutex::new(0),
                pushes: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            let mut api = Self::new(None);
            api.fail = true;
            api
        }

        fn fetch_count(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    impl NutritionApi for MockApi {
        fn fetch(&self) -> Result<Option<NutritionState>> {
            *self.fetches.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.remote.clone())
        }

        fn push(&self, push: &SyncPush) -> Result<()> {
            self.pushes.lock().unwrap().push(SyncPush {
                days: push.days.clone(),
                goals: push.goals.clone(),
            });
            Ok(())
        }
    }

    // --- Engine state machine ---

    #[test]
    fn test_engine_gated_until_authenticated() {
        let mut engine = SyncEngine::new();
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(!engine.try_begin());

        assert!(engine.set_authenticated(true));
        assert!(engine.try_begin());
        assert_eq!(engine.phase(), SyncPhase::Syncing);
    }

    #[test]
    fn test_auth_gain_triggers_once() {
        let mut engine = SyncEngine::new();
        assert!(engine.set_authenticated(true));
        assert!(!engine.set_authenticated(true));
    }

    #[test]
    fn test_tick_while_syncing_is_skip_not_queue() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);

        assert!(engine.try_begin());
        // Second tick while the first has not resolved
        assert!(!engine.try_begin());

        engine.complete(Ok(()), now());
        assert_eq!(engine.phase(), SyncPhase::Synced);
        assert!(engine.try_begin());
    }

    #[test]
    fn test_failure_records_error_and_allows_retry() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);

        assert!(engine.try_begin());
        engine.complete(Err("timeout".to_string()), now());
        assert_eq!(engine.phase(), SyncPhase::SyncedWithError);
        assert_eq!(engine.status().last_error.as_deref(), Some("timeout"));

        // Next tick retries
        assert!(engine.try_begin());
        engine.complete(Ok(()), now());
        assert_eq!(engine.phase(), SyncPhase::Synced);
        assert!(engine.status().last_error.is_none());
    }

    #[test]
    fn test_logout_cancels_from_any_state() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);
        engine.try_begin();

        engine.set_authenticated(false);
        assert_eq!(engine.phase(), SyncPhase::Idle);

        // A completion landing after logout is dropped
        engine.complete(Ok(()), now());
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(engine.status().last_synced_at.is_none());
    }

    // --- run_sync ---

    #[test]
    fn test_two_ticks_one_fetch() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);
        let api = MockApi::new(None);
        let mut state = NutritionState::default();

        // Simulate the first tick's sync still being in flight
        assert!(engine.try_begin());
        let outcome = run_sync(&mut engine, &api, &mut state, now());
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(api.fetch_count(), 0);

        engine.complete(Ok(()), now());
        let outcome = run_sync(&mut engine, &api, &mut state, now());
        assert!(matches!(outcome, SyncOutcome::Completed { .. }));
        assert_eq!(api.fetch_count(), 1);
    }

    #[test]
    fn test_fetch_failure_retains_local_state() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);
        let api = MockApi::failing();
        let mut state = state_with_day("2024-01-01", now());
        let before = state.days.len();

        let outcome = run_sync(&mut engine, &api, &mut state, now());
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(state.days.len(), before);
        assert_eq!(engine.phase(), SyncPhase::SyncedWithError);
    }

    #[test]
    fn test_fresh_server_pushes_everything() {
        let mut engine = SyncEngine::new();
        engine.set_authenticated(true);
        let api = MockApi::new(None);
        let mut state = state_with_day("2024-01-01", now());

        let outcome = run_sync(&mut engine, &api, &mut state, now());
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                pulled_days: 0,
                pushed_days: 1
            }
        );
        let pushes = api.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].days.contains_key(&date("2024-01-01")));
    }

    #[test]
    fn test_unauthenticated_run_is_skipped() {
        let mut engine = SyncEngine::new();
        let api = MockApi::new(None);
        let mut state = NutritionState::default();

        assert_eq!(run_sync(&mut engine, &api, &mut state, now()), SyncOutcome::Skipped);
        assert_eq!(api.fetch_count(), 0);
    }

    // --- Merge policy ---

    #[test]
    fn test_merge_remote_only_bucket_inserted() {
        let mut local = NutritionState::default();
        let remote = state_with_day("2024-01-05", now());

        let push = merge_remote(&mut local, remote);
        assert!(local.days.contains_key(&date("2024-01-05")));
        assert!(push.is_empty());
    }

    #[test]
    fn test_merge_local_only_bucket_pushed() {
        let mut local = state_with_day("2024-01-05", now());
        let remote = NutritionState::default();

        let push = merge_remote(&mut local, remote);
        assert!(push.days.contains_key(&date("2024-01-05")));
        assert_eq!(local.days.len(), 1);
    }

    #[test]
    fn test_merge_newer_remote_wins_wholesale() {
        let older = now();
        let newer = now() + chrono::Duration::hours(1);

        let mut local = state_with_day("2024-01-05", older);
        let mut remote = state_with_day("2024-01-05", newer);
        // Remote bucket carries extra fields the local one lacks
        remote.log_weight(date("2024-01-05"), 80.0, newer).unwrap();

        let push = merge_remote(&mut local, remote);
        assert!(push.is_empty());
        let bucket = &local.days[&date("2024-01-05")];
        assert_eq!(bucket.weight_kg, Some(80.0));
        assert_eq!(bucket.updated_at, newer);
    }

    #[test]
    fn test_merge_newer_local_wins_and_uploads() {
        let older = now();
        let newer = now() + chrono::Duration::hours(1);

        let mut local = state_with_day("2024-01-05", newer);
        let remote = state_with_day("2024-01-05", older);
        let local_updated = local.days[&date("2024-01-05")].updated_at;

        let push = merge_remote(&mut local, remote);
        assert_eq!(local.days[&date("2024-01-05")].updated_at, local_updated);
        assert!(push.days.contains_key(&date("2024-01-05")));
    }

    #[test]
    fn test_merge_equal_timestamps_keeps_local_quiet() {
        let mut local = state_with_day("2024-01-05", now());
        let mut remote = NutritionState::default();
        remote
            .days
            .insert(date("2024-01-05"), local.days[&date("2024-01-05")].clone());

        let push = merge_remote(&mut local, remote);
        assert!(push.is_empty());
    }

    #[test]
    fn test_merge_goals_lww() {
        let older = now();
        let newer = now() + chrono::Duration::hours(1);
        let goals = |cal: f64, at: DateTime<Utc>| Goals {
            calories: cal,
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            water_ml: 2000,
            weight_kg: None,
            updated_at: at,
        };

        // Remote newer
        let mut local = NutritionState {
            goals: Some(goals(1800.0, older)),
            ..NutritionState::default()
        };
        let remote = NutritionState {
            goals: Some(goals(2200.0, newer)),
            ..NutritionState::default()
        };
        let push = merge_remote(&mut local, remote);
        assert!((local.goals.as_ref().unwrap().calories - 2200.0).abs() < f64::EPSILON);
        assert!(push.goals.is_none());

        // Local newer
        let mut local = NutritionState {
            goals: Some(goals(1800.0, newer)),
            ..NutritionState::default()
        };
        let remote = NutritionState {
            goals: Some(goals(2200.0, older)),
            ..NutritionState::default()
        };
        let push = merge_remote(&mut local, remote);
        assert!((local.goals.as_ref().unwrap().calories - 1800.0).abs() < f64::EPSILON);
        assert!((push.goals.unwrap().calories - 1800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_never_replaces_map_wholesale() {
        // Local has two days, remote has a newer copy of one; the other
        // local day must survive untouched.
        let mut local = state_with_day("2024-01-01", now());
        local
            .add_meal(date("2024-01-02"), MealType::Dinner, food(), 1.0, now())
            .unwrap();

        let remote = state_with_day("2024-01-01", now() + chrono::Duration::hours(1));
        merge_remote(&mut local, remote);

        assert_eq!(local.days.len(), 2);
        assert_eq!(local.days[&date("2024-01-02")].meals.len(), 1);
    }

    #[test]
    fn test_apply_push_lww_on_server() {
        let older = now();
        let newer = now() + chrono::Duration::hours(1);

        let mut server = state_with_day("2024-01-01", newer);
        let stale = state_with_day("2024-01-01", older);
        let fresh = state_with_day("2024-01-02", older);

        // Stale bucket ignored
        let push = SyncPush {
            days: stale.days,
            goals: None,
        };
        assert_eq!(apply_push(&mut server, push), 0);
        assert_eq!(server.days[&date("2024-01-01")].updated_at, newer);

        // New bucket applied
        let push = SyncPush {
            days: fresh.days,
            goals: None,
        };
        assert_eq!(apply_push(&mut server, push), 1);
        assert!(server.days.contains_key(&date("2024-01-02")));
    }

    #[test]
    fn test_envelope_serde() {
        let ok: Envelope<i32> = Envelope::ok(5);
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, "{\"success\":true,\"data\":5}");

        let err: Envelope<i32> = serde_json::from_str(
            "{\"success\":false,\"error\":\"nope\"}",
        )
        .unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
        assert!(err.data.is_none());
    }
}
