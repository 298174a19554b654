pub mod hub;
pub mod init;
pub mod notifications;
pub mod scheduler;
