pub mod message;
pub mod notification;
pub mod room;
pub mod user;
