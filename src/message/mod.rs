pub use message::{Message, MessageId, MessageType};
pub use queue::MessageQueue;
#[allow(clippy::module_inception)]
mod message;
mod queue;
