//! Domain event plumbing layered on top of the raw messaging client: a
//! typed `Event` wire format, route derivation from `{noun}-{action}` event
//! type strings, a broker facade, and a worker-capped fan-out dispatcher.
//!
//! Grounded on `event/event.go`, `event/broker/broker.go`, and
//! `event/dispatcher/dispatcher.go`.

pub mod broker;
pub mod dispatcher;
pub mod types;

pub use broker::{make_event, EventBroker};
pub use dispatcher::{Dispatcher, Handler, Listener};
pub use types::{AggregateId, Event, EventType};
