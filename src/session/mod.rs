//! Session coordination: state machine, hub, tickers, pipeline wiring.

pub mod hub;
pub mod runtime;
pub mod state;
pub mod subscriber;
pub mod tickers;

pub use hub::{Hub, HubHandle};
pub use runtime::{Session, SessionConfig};
pub use state::RecordingState;
pub use subscriber::{SubscriberBuffer, SubscriberId};
