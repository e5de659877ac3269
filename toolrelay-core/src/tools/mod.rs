//! Tool data model
//!
//! Descriptors are the catalog entries shared by both execution lanes;
//! requests, contexts and results are the transient records of one
//! `process_tool_calls` batch.

mod call;
mod descriptor;

pub use call::{
    generate_call_id, ExecutionContext, ExecutionStatus, ToolCallRequest, ToolExecutionResult,
};
pub use descriptor::{
    normalize_parameters, ExecutionMode, ListenerInfo, ServerInfo, ToolDescriptor, ToolOrigin,
    ToolSummary, ToolType,
};
