pub mod config;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod moderation;
pub mod notify;
pub mod payout;
pub mod pipeline;
pub mod scoring;
pub mod source;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
