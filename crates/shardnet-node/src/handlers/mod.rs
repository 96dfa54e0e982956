pub mod central;
pub mod client;
pub mod downstream;
pub mod gateway;
pub mod health;
pub mod relay;
pub mod upstream;
