//! Domain model (ids, prompt, task record, status, inbound messages, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod prompt;
pub mod state;
pub mod task;

pub use self::errors::{BridgeError, ErrorKind};
pub use self::ids::TaskId;
pub use self::message::{Attachment, InboundMessage};
pub use self::prompt::Prompt;
pub use self::state::TaskStatus;
pub use self::task::{TaskRecord, Transition};
