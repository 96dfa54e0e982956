pub mod dispatch;
pub mod gateway;
pub mod http_client;
pub mod pending;
pub mod relay;
pub mod session;
pub mod sweep;
