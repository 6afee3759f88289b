pub mod ai;
pub mod conversations;
pub mod media;
pub mod messaging;
pub mod push;
pub mod translation;
pub mod users;
