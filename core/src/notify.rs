//! Transient notification (toast) queue.
//!
//! Display capacity is 1: pushing a toast dismisses everything currently
//! open so only the newest shows. Removal is two-phase: a dismissed toast
//! is first marked closed (leaving a window for an exit animation), then
//! physically evicted by [`Notifier::tick`] once the removal delay elapses.
//!
//! The notifier is an explicitly constructed store injected into whatever
//! drives the UI; there is no ambient singleton. All timing flows through
//! explicit `now` values so tests drive the clock deterministically.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub kind: ToastKind,
    pub open: bool,
}

#[derive(Debug)]
struct Slot {
    toast: Toast,
    /// None means sticky: auto-dismiss disabled.
    expires_at: Option<DateTime<Utc>>,
    /// Set once dismissed; eviction happens `removal_delay` later.
    closed_at: Option<DateTime<Utc>>,
}

/// Handle returned by [`Notifier::push`]. Operations on a handle whose toast
/// has already been evicted are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastHandle(u64);

pub const DEFAULT_REMOVAL_DELAY_MS: i64 = 1_000;

#[derive(Debug)]
pub struct Notifier {
    slots: Vec<Slot>,
    removal_delay: Duration,
    next_id: u64,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_REMOVAL_DELAY_MS))
    }
}

impl Notifier {
    #[must_use]
    pub fn new(removal_delay: Duration) -> Self {
        Self {
            slots: Vec::new(),
            removal_delay,
            next_id: 1,
        }
    }

    /// Enqueue a toast. Every currently open toast is dismissed first, so at
    /// most one toast is ever visible. `duration` of `None` disables
    /// auto-dismiss.
    pub fn push(
        &mut self,
        title: impl Into<String>,
        body: Option<String>,
        kind: ToastKind,
        duration: Option<Duration>,
        now: DateTime<Utc>,
    ) -> ToastHandle {
        let open_ids: Vec<u64> = self
            .slots
            .iter()
            .filter(|s| s.toast.open)
            .map(|s| s.toast.id)
            .collect();
        for id in open_ids {
            self.dismiss(ToastHandle(id), now);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.slots.push(Slot {
            toast: Toast {
                id,
                title: title.into(),
                body,
                kind,
                open: true,
            },
            expires_at: duration.map(|d| now + d),
            closed_at: None,
        });
        ToastHandle(id)
    }

    /// Idempotent: dismissing an already-closed or evicted toast does
    /// nothing.
    pub fn dismiss(&mut self, handle: ToastHandle, now: DateTime<Utc>) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.toast.id == handle.0) {
            if slot.toast.open {
                slot.toast.open = false;
                slot.closed_at = Some(now);
            }
        }
    }

    /// Edit display fields in place. No-op on a closed or evicted toast.
    pub fn update(&mut self, handle: ToastHandle, title: impl Into<String>, body: Option<String>) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.toast.id == handle.0) {
            if slot.toast.open {
                slot.toast.title = title.into();
                slot.toast.body = body;
            }
        }
    }

    /// Drive all timers: auto-dismiss expired toasts, then evict toasts whose
    /// removal delay has passed.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let expired: Vec<u64> = self
            .slots
            .iter()
            .filter(|s| {
                s.toast.open && s.expires_at.is_some_and(|at| now >= at)
            })
            .map(|s| s.toast.id)
            .collect();
        for id in expired {
            self.dismiss(ToastHandle(id), now);
        }

        let delay = self.removal_delay;
        self.slots
            .retain(|s| !s.closed_at.is_some_and(|at| now >= at + delay));
    }

    /// Currently open toasts (at most one, given the capacity-1 policy).
    #[must_use]
    pub fn visible(&self) -> Vec<&Toast> {
        self.slots
            .iter()
            .filter(|s| s.toast.open)
            .map(|s| &s.toast)
            .collect()
    }

    /// All toasts still in the store, including closed ones awaiting
    /// eviction.
    #[must_use]
    pub fn active(&self) -> Vec<&Toast> {
        self.slots.iter().map(|s| &s.toast).collect()
    }
}
