//! Cancellable one-shot and periodic timers that report back through a
//! command queue.
//!
//! A timer never calls into its owner directly. When it fires it enqueues a
//! `Fired` command, so firings are ordered with every other command the
//! owner receives. Cancellation aborts the sleeping task; a firing that was
//! already queued is recognized as stale by `Scheduler::accept`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Delivered through the owner's queue when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    /// The timer that fired.
    pub token: TimerToken,
    /// What the owner asked to be told.
    pub kind: K,
}

#[derive(Debug)]
struct Pending {
    handle: AbortHandle,
    periodic: bool,
}

/// Owns the timers of one command queue.
///
/// Holds only a weak sender, so pending timers never keep the owner's queue
/// alive. Dropping the scheduler aborts every timer it still owns.
#[derive(Debug)]
pub struct Scheduler<C> {
    commands: mpsc::WeakSender<C>,
    pending: HashMap<TimerToken, Pending>,
    next: u64,
}

impl<C: Send + 'static> Scheduler<C> {
    /// Creates a scheduler that feeds `commands`.
    #[must_use]
    pub fn new(commands: &mpsc::Sender<C>) -> Self {
        Self {
            commands: commands.downgrade(),
            pending: HashMap::new(),
            next: 0,
        }
    }

    /// Fires `kind` once after `delay`.
    pub fn after<K>(&mut self, delay: Duration, kind: K) -> TimerToken
    where
        K: Send + 'static,
        C: From<Fired<K>>,
    {
        let token = self.next_token();
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sender) = commands.upgrade() {
                let _ = sender.send(C::from(Fired { token, kind })).await;
            }
        });
        self.pending.insert(
            token,
            Pending {
                handle: task.abort_handle(),
                periodic: false,
            },
        );
        token
    }

    /// Fires `kind` every `period`, first after one full period.
    pub fn every<K>(&mut self, period: Duration, kind: K) -> TimerToken
    where
        K: Clone + Send + 'static,
        C: From<Fired<K>>,
    {
        let token = self.next_token();
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(sender) = commands.upgrade() else {
                    break;
                };
                let fired = Fired {
                    token,
                    kind: kind.clone(),
                };
                if sender.send(C::from(fired)).await.is_err() {
                    break;
                }
            }
        });
        self.pending.insert(
            token,
            Pending {
                handle: task.abort_handle(),
                periodic: true,
            },
        );
        token
    }

    /// Cancels a timer. Unknown or spent tokens are ignored.
    pub fn cancel(&mut self, token: TimerToken) {
        if let Some(pending) = self.pending.remove(&token) {
            pending.handle.abort();
        }
    }

    /// Cancels every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Checks a firing taken off the queue. Returns `false` for timers that
    /// were cancelled after the firing was queued. One-shot timers are spent
    /// once accepted.
    pub fn accept(&mut self, token: TimerToken) -> bool {
        match self.pending.get(&token) {
            Some(pending) if pending.periodic => true,
            Some(_) => {
                self.pending.remove(&token);
                true
            }
            None => false,
        }
    }

    /// Whether `token` is still live.
    #[must_use]
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.contains_key(&token)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn next_token(&mut self) -> TimerToken {
        self.next += 1;
        TimerToken(self.next)
    }
}

impl<C> Drop for Scheduler<C> {
    fn drop(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }
}
