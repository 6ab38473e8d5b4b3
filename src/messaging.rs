//! Chat platform access: the Discord session and the channel it serves.

pub mod discord;
pub mod traits;

pub use discord::{DiscordChannel, DiscordSession};
pub use traits::{Messaging, MessagingDyn};
