// Snowbot: keyword search, engagement ranking, and follow-up actions
//
// This is the library root. Each module is one stage: configuration,
// the search API layer, scoring, storage, posting, and the pipelines that
// tie them together.

pub mod actions;
pub mod config;
pub mod credentials;
pub mod db;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod search;
pub mod status;
