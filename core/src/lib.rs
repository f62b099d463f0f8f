//! # Rampart Core
//!
//! Compiles a [`NetworkDefinition`](rampart_common::network::definition::NetworkDefinition)
//! into per-machine plans of idempotent units and converges machines onto them.
//!
//! ## Layers
//! * **[`machine`]** / **[`model`]**: the graph of machines, their interfaces and facts.
//! * **[`firewall`]** / **[`policy`]**: per-machine chains and the default-deny policy
//!   derived from the graph.
//! * **[`unit`]**: the idempotent action taxonomy.
//! * **[`profile`]** / **[`compiler`]**: how feature modules contribute units.
//! * **[`engine`]**: dependency validation, ordering and execution.
//! * **[`transport`]**: the boundary to the machines themselves.

pub mod compiler;
pub mod engine;
pub mod firewall;
pub mod machine;
pub mod model;
pub mod policy;
pub mod profile;
pub mod transport;
pub mod unit;
