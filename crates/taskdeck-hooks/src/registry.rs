//! Routes job events to subscribers by kind.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::events::{JobEvent, JobEventKind};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Async callback invoked with a copy of each matching event.
pub type JobEventHandler = Arc<dyn Fn(JobEvent) -> BoxFuture + Send + Sync>;

/// Wrap an async closure as a [`JobEventHandler`].
pub fn handler<F, Fut>(f: F) -> JobEventHandler
where
    F: Fn(JobEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event: JobEvent| -> BoxFuture { Box::pin(f(event)) })
}

#[derive(Default)]
struct Subscriptions {
    by_kind: HashMap<JobEventKind, Vec<JobEventHandler>>,
    any: Vec<JobEventHandler>,
}

/// Job event subscriptions.
///
/// Handlers run on spawned tasks; `emit` never waits for them.
#[derive(Default)]
pub struct HookRegistry {
    subscriptions: RwLock<Subscriptions>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub async fn on(&self, kind: JobEventKind, handler: JobEventHandler) {
        let mut subs = self.subscriptions.write().await;
        subs.by_kind.entry(kind).or_default().push(handler);
    }

    /// Subscribe to every event.
    pub async fn on_any(&self, handler: JobEventHandler) {
        self.subscriptions.write().await.any.push(handler);
    }

    /// Dispatch `event` to its kind's subscribers, then to catch-all ones.
    /// Returns how many handlers were started.
    pub async fn emit(&self, event: JobEvent) -> usize {
        let kind = event.kind();
        let subs = self.subscriptions.read().await;
        let targeted = subs.by_kind.get(&kind).into_iter().flatten();

        let mut started = 0;
        for handler in targeted.chain(&subs.any) {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move { handler(event).await });
            started += 1;
        }
        tracing::trace!(event = kind.as_str(), handlers = started, "Job event dispatched");
        started
    }
}
