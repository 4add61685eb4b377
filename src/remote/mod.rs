//! Network control plane: an HTTP listener that only ever touches the pending command queue.

pub mod queue;
pub mod server;
pub mod wire;
