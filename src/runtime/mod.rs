//! Script runtime: sessions, interpreters and the suspension bridge
//!
//! A [`Session`] owns the state every interpreter of one run shares and
//! steps its interpreters cooperatively, one instruction per frame. Command
//! handlers that need a platform round-trip park their interpreter through
//! [`CommandContext::bind`]; the interpreter resumes on the first frame after
//! the call settles.

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod registry;
pub mod script;
pub mod session;
pub mod value;

// Re-export commonly used types
pub use bridge::{AsyncCall, PendingCall};
pub use command::{CommandArgs, CommandContext};
pub use config::{RuntimeConfig, load_config, write_config};
pub use error::{
    ApiError, ApiErrorCode, ApiResult, CallFailure, CommandError, CommandResult, ScriptError, ScriptResult,
};
pub use interpreter::{Interpreter, StepEvent};
pub use registry::{CommandCatalog, CommandHandler, CommandRegistry};
pub use script::{Script, ScriptCommand, ScriptLocation};
pub use session::{FrameStatus, Session, SessionBuilder, SessionState};
pub use value::{Value, VariableId, Variables};
