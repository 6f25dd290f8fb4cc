//! Hover broadcast and pointer throttling.
//!
//! The hovered genomic location is published on an explicit channel rather
//! than through the view's update cycle, so linked readouts can redraw at
//! pointer rate. Subscribers hold a [`Subscription`]; dropping it
//! unsubscribes.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoveredLocation {
    /// Genome-wide coordinate under the pointer, `None` on pointer-out
    pub coordinate: Option<f64>,
    pub panel: usize,
}

type Listener = Box<dyn FnMut(&HoveredLocation)>;

#[derive(Default)]
struct ChannelInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    dispatching: bool,
    removed_during_dispatch: Vec<u64>,
    /// Locations published by a listener while a dispatch is running
    queued: VecDeque<HoveredLocation>,
    latest: Option<HoveredLocation>,
}

/// Single-threaded publish/subscribe channel for the hovered location.
#[derive(Clone, Default)]
pub struct HoverChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

impl std::fmt::Debug for HoverChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoverChannel")
            .field("subscribers", &self.subscriber_count())
            .field("latest", &self.latest())
            .finish()
    }
}

impl HoverChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(&HoveredLocation) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        Subscription {
            id,
            channel: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver to every current subscriber. Listeners may subscribe,
    /// unsubscribe or publish while being called; a nested publish is
    /// delivered after the current one completes.
    pub fn publish(&self, location: HoveredLocation) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.latest = Some(location);
            if inner.dispatching {
                inner.queued.push_back(location);
                return;
            }
            inner.dispatching = true;
        }

        let mut next = Some(location);
        while let Some(location) = next {
            self.dispatch(&location);
            next = self.inner.borrow_mut().queued.pop_front();
        }
        self.inner.borrow_mut().dispatching = false;
    }

    fn dispatch(&self, location: &HoveredLocation) {
        let mut listeners = std::mem::take(&mut self.inner.borrow_mut().listeners);

        for (id, listener) in listeners.iter_mut() {
            if self.inner.borrow().removed_during_dispatch.contains(id) {
                continue;
            }
            listener(location);
        }

        let mut inner = self.inner.borrow_mut();
        let removed = std::mem::take(&mut inner.removed_during_dispatch);
        listeners.retain(|(id, _)| !removed.contains(id));
        // keep subscription order: survivors first, then listeners added mid-dispatch
        let added = std::mem::take(&mut inner.listeners);
        listeners.extend(added);
        inner.listeners = listeners;
    }

    pub fn latest(&self) -> Option<HoveredLocation> {
        self.inner.borrow().latest
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Disposable handle returned by [`HoverChannel::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    channel: Weak<RefCell<ChannelInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(channel) = self.channel.upgrade() else {
            return;
        };
        let Ok(mut inner) = channel.try_borrow_mut() else {
            log::warn!("Hover subscription {} dropped while channel was borrowed", self.id);
            return;
        };
        if inner.dispatching {
            inner.removed_during_dispatch.push(self.id);
        }
        let id = self.id;
        inner.listeners.retain(|(lid, _)| *lid != id);
    }
}

/// Leading-edge rate limiter for pointer-driven work.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` when at least `interval` passed since the last accepted call.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
