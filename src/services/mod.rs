//! Collaborators the installer talks to: application identity, the flow
//! programming backend, and the switch control channel.

mod app_registry;
mod command;
mod flow_backend;
mod switch_channel;

pub use app_registry::{AppId, AppRegistry, LocalAppRegistry};
pub use command::{CommandTemplate, DEFAULT_SUFFIX_COMMAND_TEMPLATE};
pub use flow_backend::{FlowProgrammer, InMemoryFlowTable};
pub use switch_channel::{DryRunSwitchChannel, LocalSwitchChannel, SshSwitchChannel, SwitchChannel};
