//! Tool dispatch, resource views and argument validation
//!
//! Provides the request-dispatch contract exposed over the MCP protocol.

pub mod resources;
pub mod tools;
pub mod utils;
pub mod validation;
