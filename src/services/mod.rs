// Services module
// Business logic separated by domain area

pub mod audio; // Audio acquisition (resolve, download, validate, persist)
pub mod export; // Anki export record building and CSV serialization
pub mod sentence; // Example sentence generation and reply parsing
