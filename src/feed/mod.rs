pub mod jpeg;
pub mod player;

pub use player::{FeedFault, FeedPlayer};
