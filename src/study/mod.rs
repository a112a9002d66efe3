pub mod case;
pub mod db;
pub mod delay;
pub mod error;
pub mod generate;
pub mod lifecycle;
pub mod personalize;
pub mod prompt;
pub mod session;
pub mod transcript;

pub use case::{Case, CaseAssigner};
pub use delay::DelayPolicy;
pub use error::StudyError;
pub use generate::{Backend, Reply, generate};
pub use lifecycle::{TurnOutcome, load_session, open_session, take_turn};
pub use prompt::{PromptSource, PromptStore, UploadedDocument};
pub use session::{LogIdentifier, Participant, Role, SessionState, Turn};
pub use transcript::TranscriptSink;
