//! TLS listener and accept loop.
//!
//! - **`listener`**: binds, wires the router and spawns a task per connection
//! - **`tls`**: loads certificate material and accepts any client certificate
//! - **`deadline`**: read and write deadlines for accepted sockets

pub mod deadline;
pub mod listener;
pub mod tls;
