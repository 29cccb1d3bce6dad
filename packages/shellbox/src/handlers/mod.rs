pub mod health;
pub mod sessions;
pub mod terminal;

// Re-export all handlers for easy route registration
pub use health::{container_health_handler, health_handler, metrics_handler};
pub use sessions::create_session;
pub use terminal::{open_terminal, terminal_route_middleware};
