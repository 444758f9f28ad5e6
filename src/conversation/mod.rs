//! Conversation state machine.
//!
//! One [`Session`] per chat identity, held by the [`SessionStore`]; the
//! [`ConversationEngine`] turns each inbound message into a reply and the
//! session's next [`ConversationState`].

pub mod engine;
pub mod prompts;
pub mod session;
pub mod state;

pub use engine::{ConversationEngine, RESET_TOKEN};
pub use session::{Clock, ManualClock, Session, SessionHandle, SessionStore, SystemClock};
pub use state::{ConversationState, EditTarget, LineTarget, Resume};
