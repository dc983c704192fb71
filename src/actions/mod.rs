// Actions taken on behalf of the bot account.

pub mod oauth1;
pub mod poster;
