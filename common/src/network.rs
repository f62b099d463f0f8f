//! # Network Definition & Addressing
//!
//! * **[`definition`]**: the declarative input, parsed from TOML.
//! * **[`block`]**: the four-address block handed to every interface.
//! * **[`allocator`]**: deterministic, collision-free block assignment.
//! * **[`mac`]**: MAC address parsing and vendor lookups.

pub mod allocator;
pub mod block;
pub mod definition;
pub mod mac;
