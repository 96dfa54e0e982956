//! Library surface behind the `shardnet-node` binary: per-role handlers,
//! router builders, and the config-to-runtime wiring in [`role`]. Exposed as
//! a library (rather than folded into `main.rs`) so a test process can stand
//! up several nodes, of any mix of roles, on distinct listeners.

pub mod handlers;
pub mod role;
pub mod router;
