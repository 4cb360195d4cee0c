//! Live cart views.
//!
//! [`CartFeed`] decodes one user's cart subscription. [`LiveCart`] follows the
//! auth state: it tears the feed down when the user signs out or changes, and
//! opens a new one scoped to the new user.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bukka_core::UserId;

use super::cart_collection;
use crate::models::CartLine;
use crate::platform::{AuthUser, Document, DocumentStore, PlatformError, Subscription};

/// One user's cart as a stream of full line sets.
#[derive(Debug)]
pub struct CartFeed {
    subscription: Subscription,
}

impl CartFeed {
    pub(crate) const fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Next full line set. `None` once the subscription has stopped.
    pub async fn next(&mut self) -> Option<Result<Vec<CartLine>, PlatformError>> {
        self.subscription
            .next()
            .await
            .map(|snapshot| snapshot.map(|docs| decode_lines(&docs)))
    }

    /// Stop listening.
    pub fn cancel(self) {
        self.subscription.cancel();
    }
}

/// Decode cart documents, skipping lines that don't decode.
pub(crate) fn decode_lines(docs: &[Document]) -> Vec<CartLine> {
    docs.iter()
        .filter_map(|doc| match CartLine::from_document(doc) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(item_id = %doc.id, error = %e, "Skipping malformed cart line");
                None
            }
        })
        .collect()
}

/// The signed-in user's cart, following sign-in, sign-out and user changes.
///
/// Yields an empty set while nobody is signed in. Dropping it stops the
/// background listener and the feed it holds.
pub struct LiveCart {
    receiver: mpsc::Receiver<Vec<CartLine>>,
    task: Option<JoinHandle<()>>,
}

impl LiveCart {
    pub(crate) fn spawn(
        documents: Arc<dyn DocumentStore>,
        auth_state: watch::Receiver<Option<AuthUser>>,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(16);
        let task = tokio::spawn(follow(documents, auth_state, tx));
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Next full line set. `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Vec<CartLine>> {
        self.receiver.recv().await
    }

    /// Stop listening.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for LiveCart {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Stream for LiveCart {
    type Item = Vec<CartLine>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for LiveCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCart")
            .field("active", &self.task.as_ref().is_some_and(|t| !t.is_finished()))
            .finish()
    }
}

fn user_id(state: &watch::Receiver<Option<AuthUser>>) -> Option<UserId> {
    state.borrow().as_ref().map(|u| u.id.clone())
}

/// Wait until the signed-in user id differs from `current`.
///
/// Returns `false` if the auth provider went away.
async fn user_changed(
    auth_state: &mut watch::Receiver<Option<AuthUser>>,
    current: Option<&UserId>,
) -> bool {
    loop {
        if auth_state.changed().await.is_err() {
            return false;
        }
        if user_id(auth_state).as_ref() != current {
            return true;
        }
    }
}

async fn follow(
    documents: Arc<dyn DocumentStore>,
    mut auth_state: watch::Receiver<Option<AuthUser>>,
    tx: mpsc::Sender<Vec<CartLine>>,
) {
    loop {
        let current = auth_state.borrow_and_update().as_ref().map(|u| u.id.clone());

        let Some(user) = current else {
            if tx.send(Vec::new()).await.is_err() || !user_changed(&mut auth_state, None).await {
                return;
            }
            continue;
        };

        debug!(user_id = %user, "Opening live cart");
        let mut feed = CartFeed::new(documents.subscribe(&cart_collection(&user)));
        loop {
            tokio::select! {
                changed = user_changed(&mut auth_state, Some(&user)) => {
                    if !changed {
                        return;
                    }
                    break;
                }
                update = feed.next() => match update {
                    Some(Ok(lines)) => {
                        if tx.send(lines).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => warn!(user_id = %user, error = %e, "Live cart update failed"),
                    None => {
                        if !user_changed(&mut auth_state, Some(&user)).await {
                            return;
                        }
                        break;
                    }
                },
            }
        }
        debug!(user_id = %user, "Closing live cart");
        feed.cancel();
    }
}
