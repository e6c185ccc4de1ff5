//! minecraft-mcp exposes a single Minecraft bot to MCP clients.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration, the error vocabulary, and the session
//!   engine: connection lifecycle, the chat buffer, feedback waiters, command
//!   classification, and timed movement controls.
//! - [`game`] defines the boundary to the protocol client (connector, client
//!   and capability traits) and the TCP bridge that implements it.
//! - [`mcp`] serves JSON-RPC over stdio and maps tool calls onto session
//!   operations.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod game;
pub mod mcp;
pub mod utils;
