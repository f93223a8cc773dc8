//! Bounded in-memory FIFO of outbound messages awaiting (re-)publish.
//!
//! `enqueue` never blocks: a full queue returns [`ClientError::QueueFull`]
//! immediately, pushing the back-pressure decision (retry? drop?) to the
//! caller. Grounded on `Enqueue`/`ErrFullQueue` in
//! `original_source/rabbitmq/pipeline.go`.

use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::message::Message;

pub struct PublishQueue {
    sender: mpsc::Sender<Message>,
    receiver: tokio::sync::Mutex<Option<mpsc::Receiver<Message>>>,
}

impl PublishQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self { sender, receiver: tokio::sync::Mutex::new(Some(receiver)) }
    }

    /// Appends `msg` to the tail of the queue, failing immediately with
    /// [`ClientError::QueueFull`] rather than waiting for room.
    pub fn enqueue(&self, msg: Message) -> Result<(), ClientError> {
        self.sender.try_send(msg).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ClientError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ClientError::Cancelled,
        })
    }

    /// Current number of messages waiting to be published.
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Takes ownership of the receiving half. Only the pipeline that drains
    /// this queue should call this, and only once.
    pub async fn take_receiver(&self) -> Option<mpsc::Receiver<Message>> {
        self.receiver.lock().await.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentType, Route};
    use proptest::prelude::*;

    fn msg() -> Message {
        Message::new(Route::topic("test", "test.event.ping"), vec![1, 2, 3], ContentType::Json)
    }

    #[test]
    fn depth_tracks_enqueued_count() {
        let queue = PublishQueue::new(4);
        assert_eq!(queue.depth(), 0);
        queue.enqueue(msg()).unwrap();
        queue.enqueue(msg()).unwrap();
        assert_eq!(queue.depth(), 2);
    }

    #[test]
    fn enqueue_fails_immediately_when_full() {
        let queue = PublishQueue::new(2);
        queue.enqueue(msg()).unwrap();
        queue.enqueue(msg()).unwrap();
        assert!(matches!(queue.enqueue(msg()), Err(ClientError::QueueFull)));
        assert_eq!(queue.depth(), 2);
    }

    #[test]
    fn depth_never_exceeds_capacity() {
        let queue = PublishQueue::new(3);
        for _ in 0..10 {
            let _ = queue.enqueue(msg());
        }
        assert!(queue.depth() <= queue.capacity());
        assert_eq!(queue.depth(), 3);
    }

    #[tokio::test]
    async fn take_receiver_returns_none_on_second_call() {
        let queue = PublishQueue::new(1);
        assert!(queue.take_receiver().await.is_some());
        assert!(queue.take_receiver().await.is_none());
    }

    proptest::proptest! {
        #[test]
        fn depth_equals_successful_enqueues_up_to_capacity(ops in proptest::collection::vec(proptest::bool::ANY, 0..200)) {
            let capacity = 16usize;
            let queue = PublishQueue::new(capacity);
            let mut successes = 0usize;
            for _ in ops {
                if queue.enqueue(msg()).is_ok() {
                    successes += 1;
                }
            }
            let expected = successes.min(capacity);
            prop_assert_eq!(queue.depth(), expected);
            prop_assert!(queue.depth() <= capacity);
        }
    }
}
