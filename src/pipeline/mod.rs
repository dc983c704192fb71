// Pipelines: search results flowing into an action.

pub mod quote;
pub mod top_tweets;
