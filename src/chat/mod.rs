pub mod hub;
pub mod service;
pub mod subscription;

pub use hub::ChatHub;
pub use service::{ChatService, ChatUser};
pub use subscription::{ConversationSubscription, FeedUpdate};
