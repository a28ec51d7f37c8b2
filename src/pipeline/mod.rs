//! Speculative response pipeline
//!
//! Each partial transcript starts a run. A run speaks a short filler while
//! it retrieves and reranks context, then speaks a grounded answer once the
//! filler has finished. A newer transcript cancels the current run; a
//! cancelled run leaves history and metrics untouched.

mod coordinator;
mod history;
pub mod prompt;
mod run;

pub use coordinator::Coordinator;
pub use history::ConversationHistory;
pub use run::{RunHandle, RunState};
