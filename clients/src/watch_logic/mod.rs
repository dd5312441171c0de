pub mod bridge;
pub mod config;
pub mod console_router;
pub mod consumers;
pub mod logger;
pub mod presentation;
