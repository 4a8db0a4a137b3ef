//! Natural-language lookup over the character store.

mod agent;
mod tools;

pub use agent::{QueryAgent, QueryConfig, QueryError};
pub use tools::{execute_tool_call, QueryTools};
