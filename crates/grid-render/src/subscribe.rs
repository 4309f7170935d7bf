//! Viewport-change subscriptions.
//!
//! Listeners fire on layout changes only — axis sizes, freeze counts,
//! resize, zoom — never on scroll. Each subscription chooses its own
//! delivery: immediate, coalesced to the next frame, or debounced by a
//! quiet period. Deferred deliveries are pumped by the renderer (frame pass
//! and clock ticks); a subscription that re-arms during its quiet period
//! pushes its deadline out.

use grid_axis::ViewportState;

pub type ViewportListener = Box<dyn Fn(&ViewportState)>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubscribeOptions {
    /// Deliver on the next frame instead of synchronously.
    pub animation_frame: bool,
    /// Deliver after this many ms of layout quiet. Takes precedence over
    /// `animation_frame`.
    pub debounce_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportSubscriptionId(u64);

struct Subscription {
    id: ViewportSubscriptionId,
    listener: ViewportListener,
    options: SubscribeOptions,
    /// Armed by a layout change; cleared on delivery.
    pending: bool,
    /// Debounce deadline in clock ms.
    due_at_ms: Option<f64>,
}

#[derive(Default)]
pub struct ViewportSubscriptions {
    subs: Vec<Subscription>,
    next_id: u64,
}

impl ViewportSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        listener: ViewportListener,
        options: SubscribeOptions,
    ) -> ViewportSubscriptionId {
        let id = ViewportSubscriptionId(self.next_id);
        self.next_id += 1;
        self.subs.push(Subscription {
            id,
            listener,
            options,
            pending: false,
            due_at_ms: None,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: ViewportSubscriptionId) -> bool {
        let before = self.subs.len();
        self.subs.retain(|s| s.id != id);
        self.subs.len() != before
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn clear(&mut self) {
        self.subs.clear();
    }

    /// Record a layout change. Immediate listeners fire now; the rest arm.
    pub fn notify_layout_changed(&mut self, state: &ViewportState, now_ms: f64) {
        for sub in &mut self.subs {
            if let Some(ms) = sub.options.debounce_ms {
                sub.pending = true;
                sub.due_at_ms = Some(now_ms + ms);
            } else if sub.options.animation_frame {
                sub.pending = true;
            } else {
                (sub.listener)(state);
            }
        }
    }

    /// Deliver armed subscriptions: frame-coalesced ones when `in_frame`,
    /// debounced ones whose deadline has passed.
    pub fn pump(&mut self, state: &ViewportState, now_ms: f64, in_frame: bool) {
        for sub in &mut self.subs {
            if !sub.pending {
                continue;
            }
            let deliver = match sub.options.debounce_ms {
                Some(_) => sub.due_at_ms.is_some_and(|due| now_ms >= due),
                None => in_frame && sub.options.animation_frame,
            };
            if deliver {
                sub.pending = false;
                sub.due_at_ms = None;
                (sub.listener)(state);
            }
        }
    }

    /// True when some armed subscription still awaits delivery.
    pub fn has_pending(&self) -> bool {
        self.subs.iter().any(|s| s.pending)
    }
}
