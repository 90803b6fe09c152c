//! In-memory host for message functions.
//!
//! [`LocalRuntime`] implements the host side of [`function_api::FunctionContext`]:
//! ring-buffer topics, asynchronous publish with completion callbacks, ack
//! bookkeeping and a tracing-backed function logger. Used by tests and by
//! `function-runner`.

pub mod error;
pub mod logger;
pub mod runtime;
pub mod topic;

pub use error::LocalError;
pub use logger::{LocalLogger, LogLevel, LogLine};
pub use runtime::{
    AckRecord, InvocationContext, LocalRuntime, LocalRuntimeConfig, user_config_from_value,
};
pub use topic::{LocalTopic, PublishedMessage};
