//! The client: connects over TCP, encrypts every path and body that
//! crosses the wire, and decrypts everything coming back.

pub mod commands;

pub use commands::Client;
