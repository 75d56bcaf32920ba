//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the external API routing: the `/sse` JSON-RPC endpoint plus health and discovery.

pub mod handlers;
