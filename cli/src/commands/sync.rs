use std::sync::mpsc;

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::api::RemoteClient;
use nosh_core::notify::{Notifier, Toast, ToastKind};
use nosh_core::service::NoshService;
use nosh_core::sync::{NutritionApi, SyncEngine, SyncOutcome, SyncStatus};

pub(crate) const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// How long sync toasts stay on screen.
const TOAST_SECONDS: i64 = 5;

pub(crate) fn cmd_sync_now(
    svc: &mut NoshService,
    client: &RemoteClient,
    json: bool,
) -> Result<()> {
    let mut engine = SyncEngine::new();
    engine.set_authenticated(true);

    let outcome = svc.sync(&mut engine, client, Utc::now());
    report_outcome(&outcome, json);

    if matches!(outcome, SyncOutcome::Failed(_)) {
        std::process::exit(1);
    }
    Ok(())
}

pub(crate) fn cmd_sync_status(client: &RemoteClient, server_url: &str, json: bool) -> Result<()> {
    let (reachable, remote_days, error) = match client.fetch() {
        Ok(Some(state)) => (true, Some(state.days.len()), None),
        Ok(None) => (true, Some(0), None),
        Err(e) => (false, None, Some(format!("{e:#}"))),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "server_url": server_url,
                "reachable": reachable,
                "remote_days": remote_days,
                "error": error,
            })
        );
    } else {
        println!("Server: {server_url}");
        match (reachable, remote_days, error) {
            (true, Some(days), _) => println!("Status: reachable ({days} day(s) stored)"),
            (_, _, Some(e)) => println!("Status: unreachable ({e})"),
            _ => println!("Status: unknown"),
        }
    }

    Ok(())
}

enum RunnerEvent {
    /// Interval timer fired.
    Tick,
    /// Out-of-band trigger (user pressed Enter); sync immediately
    /// regardless of timer phase.
    SyncNow,
    Stop,
}

/// Foreground sync loop: an immediate sync, then one attempt per interval
/// until Ctrl-C. Pressing Enter forces a sync without waiting for the timer.
/// A trigger landing while a sync is in flight is skipped by the engine,
/// never queued.
pub(crate) fn cmd_sync_watch(
    svc: &mut NoshService,
    client: &RemoteClient,
    interval_secs: u64,
) -> Result<()> {
    let mut engine = SyncEngine::new();
    let mut notifier = Notifier::default();

    let (tx, rx) = mpsc::channel::<RunnerEvent>();

    let tick_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        interval.tick().await; // first tick is immediate; the auth trigger covers it
        loop {
            interval.tick().await;
            if tick_tx.send(RunnerEvent::Tick).is_err() {
                break;
            }
        }
    });

    // Reading stdin blocks, so it gets a plain thread rather than a task
    let stdin_tx = tx.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if line.is_err() || stdin_tx.send(RunnerEvent::SyncNow).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(RunnerEvent::Stop);
        }
    });

    eprintln!("Syncing every {interval_secs}s (Enter to sync now, Ctrl-C to stop)");

    // Gaining authentication triggers the first sync right away
    if engine.set_authenticated(true) {
        run_once(svc, &mut engine, client, &mut notifier);
    }

    while let Ok(event) = rx.recv() {
        if !handle_event(&event, svc, &mut engine, client, &mut notifier) {
            break;
        }
    }

    let status = engine.status();
    engine.set_authenticated(false);
    eprintln!("Stopped ({})", status_line(&status));
    Ok(())
}

/// Dispatch one runner event. Returns `false` when the loop should stop.
fn handle_event(
    event: &RunnerEvent,
    svc: &mut NoshService,
    engine: &mut SyncEngine,
    api: &dyn NutritionApi,
    notifier: &mut Notifier,
) -> bool {
    match event {
        RunnerEvent::Tick => {
            notifier.tick(Utc::now());
            run_once(svc, engine, api, notifier);
            true
        }
        RunnerEvent::SyncNow => {
            run_once(svc, engine, api, notifier);
            true
        }
        RunnerEvent::Stop => false,
    }
}

fn run_once(
    svc: &mut NoshService,
    engine: &mut SyncEngine,
    api: &dyn NutritionApi,
    notifier: &mut Notifier,
) {
    let now = Utc::now();
    let outcome = svc.sync(engine, api, now);
    match outcome {
        SyncOutcome::Completed {
            pulled_days,
            pushed_days,
        } => {
            notifier.push(
                "Synced",
                Some(format!("pulled {pulled_days} day(s), pushed {pushed_days}")),
                ToastKind::Success,
                Some(Duration::seconds(TOAST_SECONDS)),
                now,
            );
        }
        SyncOutcome::Failed(message) => {
            notifier.push(
                "Sync failed",
                Some(message),
                ToastKind::Error,
                Some(Duration::seconds(TOAST_SECONDS)),
                now,
            );
        }
        SyncOutcome::Skipped => return,
    }
    for toast in notifier.visible() {
        print_toast(toast);
    }
}

fn status_line(status: &SyncStatus) -> String {
    match (&status.last_error, status.last_synced_at) {
        (Some(error), _) => format!("last sync failed: {error}"),
        (None, Some(at)) => format!("last synced at {}", at.to_rfc3339()),
        (None, None) => "never synced".to_string(),
    }
}

fn print_toast(toast: &Toast) {
    let marker = match toast.kind {
        ToastKind::Info => "i",
        ToastKind::Success => "+",
        ToastKind::Error => "!",
    };
    let title = &toast.title;
    match toast.body {
        Some(ref body) => eprintln!("[{marker}] {title}: {body}"),
        None => eprintln!("[{marker}] {title}"),
    }
}

fn report_outcome(outcome: &SyncOutcome, json: bool) {
    match outcome {
        SyncOutcome::Completed {
            pulled_days,
            pushed_days,
        } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "completed",
                        "pulled_days": pulled_days,
                        "pushed_days": pushed_days,
                    })
                );
            } else {
                println!("Synced: pulled {pulled_days} day(s), pushed {pushed_days}");
            }
        }
        SyncOutcome::Failed(message) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "failed", "error": message })
                );
            } else {
                eprintln!("Sync failed: {message}");
            }
        }
        SyncOutcome::Skipped => {
            if json {
                println!("{}", serde_json::json!({ "status": "skipped" }));
            } else {
                eprintln!("Sync skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use nosh_core::state::NutritionState;
    use nosh_core::sync::{SyncPhase, SyncPush};
    use std::sync::Mutex;

    struct CountingApi {
        fetches: Mutex<usize>,
    }

    impl CountingApi {
        fn new() -> Self {
            Self {
                fetches: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    impl NutritionApi for CountingApi {
        fn fetch(&self) -> Result<Option<NutritionState>> {
            *self.fetches.lock().unwrap() += 1;
            Ok(None)
        }

        fn push(&self, _push: &SyncPush) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_manual_trigger_syncs_without_waiting_for_tick() {
        let mut svc = NoshService::open_in_memory().unwrap();
        let mut engine = SyncEngine::new();
        let mut notifier = Notifier::default();
        let api = CountingApi::new();

        engine.set_authenticated(true);
        // First sync already done; the timer has not fired again yet
        svc.sync(&mut engine, &api, Utc::now());
        assert_eq!(api.fetch_count(), 1);

        assert!(handle_event(
            &RunnerEvent::SyncNow,
            &mut svc,
            &mut engine,
            &api,
            &mut notifier,
        ));
        assert_eq!(api.fetch_count(), 2);
        assert_eq!(engine.phase(), SyncPhase::Synced);
    }

    #[test]
    fn test_tick_and_stop_events() {
        let mut svc = NoshService::open_in_memory().unwrap();
        let mut engine = SyncEngine::new();
        let mut notifier = Notifier::default();
        let api = CountingApi::new();
        engine.set_authenticated(true);

        assert!(handle_event(
            &RunnerEvent::Tick,
            &mut svc,
            &mut engine,
            &api,
            &mut notifier,
        ));
        assert_eq!(api.fetch_count(), 1);

        assert!(!handle_event(
            &RunnerEvent::Stop,
            &mut svc,
            &mut engine,
            &api,
            &mut notifier,
        ));
        assert_eq!(api.fetch_count(), 1);
    }

    #[test]
    fn test_status_line_variants() {
        let mut engine = SyncEngine::new();
        assert_eq!(status_line(&engine.status()), "never synced");

        engine.set_authenticated(true);
        engine.try_begin();
        engine.complete(Ok(()), "2024-01-01T12:00:00Z".parse().unwrap());
        assert!(status_line(&engine.status()).starts_with("last synced at 2024-01-01"));

        engine.try_begin();
        engine.complete(Err("connection refused".to_string()), Utc::now());
        assert_eq!(
            status_line(&engine.status()),
            "last sync failed: connection refused"
        );
    }
}
