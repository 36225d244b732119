pub mod completion;
pub mod notes;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod transcription;
