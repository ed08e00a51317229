//! Agent orchestration: tool registry, stream reassembly, per-user
//! generation locks, and the two-pass turn driver that bridges a streamed
//! completion to an output channel.

pub mod agents;
pub mod assembler;
pub mod lock;
pub mod tool;
pub mod tools;
pub mod turn;

pub use agents::{AgentDefinition, AgentKind};
pub use assembler::ToolCallAssembler;
pub use lock::{GenerationLocks, LockGuard};
pub use tool::{AgentTool, CallStyle, ToolRegistry, ToolReply};
pub use turn::{spawn_turn, TurnChunk, TurnContext};
