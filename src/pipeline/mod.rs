//! Response orchestration: one utterance in, an ordered stream of spoken
//! audio out, with speculative search and prompt cancellation.

pub mod coordinator;
pub mod decision;
pub mod events;
pub mod generation;
pub mod messages;
pub mod segmenter;
pub mod speculative;
pub mod synthesis;

pub use coordinator::{TurnCoordinator, TurnOutcome};
pub use events::EventSink;
