//! Checkout state.
//!
//! A [`CheckoutContext`] belongs to one open cart view. It starts `Idle`,
//! becomes `CheckedOut` after a successful checkout, and returns to `Idle`
//! when the view closes or that user's cart is changed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

use bukka_core::{Price, UserId};

/// Whether the cart view has just been checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    CheckedOut,
}

/// Checkout flag scoped to one cart view.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    state: Arc<watch::Sender<CheckoutState>>,
}

impl CheckoutContext {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        *self.state.borrow()
    }

    /// Observe state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    /// The cart view closed.
    pub fn close(&self) {
        set(&self.state, CheckoutState::Idle);
    }

    pub(crate) fn mark_checked_out(&self) {
        set(&self.state, CheckoutState::CheckedOut);
    }

    fn downgrade(&self) -> Weak<watch::Sender<CheckoutState>> {
        Arc::downgrade(&self.state)
    }
}

impl Default for CheckoutContext {
    fn default() -> Self {
        Self::new()
    }
}

fn set(state: &watch::Sender<CheckoutState>, value: CheckoutState) {
    state.send_if_modified(|current| {
        let changed = *current != value;
        *current = value;
        changed
    });
}

type WeakState = Weak<watch::Sender<CheckoutState>>;

/// Open checkout contexts per user, held weakly so that a closed view is
/// simply dropped.
#[derive(Debug, Default)]
pub(crate) struct ContextRegistry {
    contexts: Mutex<HashMap<UserId, Vec<WeakState>>>,
}

impl ContextRegistry {
    pub(crate) fn register(&self, user: &UserId, context: &CheckoutContext) {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        contexts.retain(|_, views| {
            views.retain(|c| c.strong_count() > 0);
            !views.is_empty()
        });
        contexts
            .entry(user.clone())
            .or_default()
            .push(context.downgrade());
    }

    /// The user's cart changed: their open contexts go back to `Idle`.
    pub(crate) fn reset(&self, user: &UserId) {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(views) = contexts.get_mut(user) else {
            return;
        };
        views.retain(|c| match c.upgrade() {
            Some(state) => {
                set(&state, CheckoutState::Idle);
                true
            }
            None => false,
        });
        if views.is_empty() {
            contexts.remove(user);
        }
    }
}

/// What a completed checkout cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    /// Lines deleted.
    pub cleared: usize,
    /// Cart total at checkout.
    pub total: Price,
}

/// Result of a checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Completed(CheckoutReceipt),
    /// The view was already checked out; nothing was done.
    AlreadyCheckedOut,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let context = CheckoutContext::new();
        assert_eq!(context.state(), CheckoutState::Idle);

        context.mark_checked_out();
        assert_eq!(context.state(), CheckoutState::CheckedOut);

        context.close();
        assert_eq!(context.state(), CheckoutState::Idle);
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[test]
    fn test_registry_resets_open_contexts() {
        let registry = ContextRegistry::default();
        let ada = user("ada");
        let open = CheckoutContext::new();
        registry.register(&ada, &open);
        {
            let closed = CheckoutContext::new();
            registry.register(&ada, &closed);
        }

        open.mark_checked_out();
        registry.reset(&ada);
        assert_eq!(open.state(), CheckoutState::Idle);
        assert_eq!(registry.contexts.lock().unwrap()[&ada].len(), 1);
    }

    #[test]
    fn test_reset_leaves_other_users_alone() {
        let registry = ContextRegistry::default();
        let (ada, chidi) = (user("ada"), user("chidi"));
        let ada_view = CheckoutContext::new();
        let chidi_view = CheckoutContext::new();
        registry.register(&ada, &ada_view);
        registry.register(&chidi, &chidi_view);

        ada_view.mark_checked_out();
        chidi_view.mark_checked_out();
        registry.reset(&chidi);

        assert_eq!(ada_view.state(), CheckoutState::CheckedOut);
        assert_eq!(chidi_view.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_watch_sees_checkout() {
        let context = CheckoutContext::new();
        let mut watch = context.watch();
        context.mark_checked_out();
        watch.changed().await.unwrap();
        assert_eq!(*watch.borrow(), CheckoutState::CheckedOut);
    }
}
