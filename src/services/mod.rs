//! Core services: change classification, notification routing, delivery

pub mod classifier;
pub mod router;
pub mod telegram;

pub use classifier::{ChangeSet, LanguageUpdate, classify};
pub use router::{DigestEntry, NotificationRouter, relevant_entries, render_digest};
pub use telegram::{Messenger, SendOptions, TelegramMessenger};
