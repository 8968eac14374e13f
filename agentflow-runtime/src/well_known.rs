//! Names of the two tools the Tool Executor registers lazily.

/// Progressive-disclosure tool fetching a large result previously stored
/// via the Large-Object Store.
pub const QUERY_TOOL_RESULT_NAME: &str = "query_tool_result";

/// Progressive-disclosure tool fetching the full detail behind a stored
/// tool error.
pub const GET_ERROR_DETAILS_NAME: &str = "get_error_details";
