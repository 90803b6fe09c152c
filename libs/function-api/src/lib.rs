//! Host capability surface for message functions.
//!
//! A function receives one inbound payload at a time together with a
//! [`FunctionContext`] that exposes user config, the current message's
//! metadata, publishing, logging and acknowledgment.

pub mod context;
pub mod error;
pub mod ffi;
pub mod message;

pub use context::{Function, FunctionContext, FunctionLogger, PublishCallback};
pub use error::{ErrorKind, FunctionError};
pub use ffi::{
    AbiVersionFn, CreateFunctionFn, DestroyFunctionFn, FUNCTION_ABI_VERSION, PluginCreateResult,
    plugin_ok,
};
pub use message::{Disposition, InboundMessage, MessageConf, MessageId, SendResult};
