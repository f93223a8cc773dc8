//! Worker-capped fan-out from a merged stream of events to per-type
//! handlers. Dispatch does not wait for handler completion.
//!
//! Grounded on `event/dispatcher/dispatcher.go`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::types::{Event, EventType};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: Event);
}

/// Implement this to register every handler a component owns in one call
/// via [`Dispatcher::register`].
pub trait Listener {
    fn event_handlers(&self) -> HashMap<EventType, Vec<Arc<dyn Handler>>>;
}

pub struct Dispatcher {
    handlers: Mutex<HashMap<EventType, Vec<Arc<dyn Handler>>>>,
    limiter: Arc<Semaphore>,
    events_tx: mpsc::Sender<Event>,
    events_rx: Mutex<Option<mpsc::Receiver<Event>>>,
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(max_workers.max(1) * 4);
        Self {
            handlers: Mutex::new(HashMap::new()),
            limiter: Arc::new(Semaphore::new(max_workers.max(1))),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Merges `source` into the dispatcher's input stream; the source
    /// closing does not close the dispatcher, which may have other
    /// providers feeding it. Mirrors `AddEventProviders`/`mergeChans`.
    pub fn add_event_provider(&self, mut source: mpsc::Receiver<Event>) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = source.recv().await {
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    pub async fn subscribe(&self, event_type: EventType, handler: Arc<dyn Handler>) {
        self.handlers.lock().await.entry(event_type).or_default().push(handler);
    }

    pub async fn register(&self, listener: &dyn Listener) {
        for (event_type, handlers) in listener.event_handlers() {
            let mut guard = self.handlers.lock().await;
            guard.entry(event_type).or_default().extend(handlers);
        }
    }

    /// Drains the merged event stream, fanning each event out to its
    /// registered handlers without waiting for them to finish. Returns when
    /// `cancel` fires or the input stream closes.
    pub async fn run(&self, cancel: CancellationToken) {
        let Some(mut events) = self.events_rx.lock().await.take() else {
            return;
        };

        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
                _ = cancel.cancelled() => return,
            };

            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: Event) {
        let handlers = {
            let guard = self.handlers.lock().await;
            guard.get(&event.event_type).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            warn!(event_type = %event.event_type, "no handlers registered for event type");
            return;
        }

        for handler in handlers {
            let event = event.clone();
            let limiter = self.limiter.clone();
            tokio::spawn(async move {
                let _permit = limiter.acquire_owned().await;
                handler.handle(event).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _event: Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dispatches_to_subscribed_handler() {
        let dispatcher = Arc::new(Dispatcher::new(4));
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe(EventType::from("user-created"), Arc::new(CountingHandler(count.clone()))).await;

        let (tx, rx) = mpsc::channel(1);
        dispatcher.add_event_provider(rx);
        let cancel = CancellationToken::new();

        let run_cancel = cancel.clone();
        let dispatcher_clone = dispatcher.clone();
        let handle = tokio::spawn(async move { dispatcher_clone.run(run_cancel).await });

        tx.send(Event::new(
            crate::event::types::AggregateId::from("user-1"),
            EventType::from("user-created"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        drop(tx);
        let _ = handle.await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn event_with_no_handlers_is_dropped_without_panicking() {
        let dispatcher = Dispatcher::new(2);
        dispatcher
            .dispatch(Event::new(
                crate::event::types::AggregateId::from("x"),
                EventType::from("nobody-listening"),
                serde_json::json!({}),
            ))
            .await;
    }
}
