pub mod gateway;
pub mod health_service;
pub mod message_service;
pub mod notification_service;
pub mod room_service;
