//! Agent execution modules.

pub mod agent_loop;
pub mod tool_executor;

use gale_core::{AgentEvent, RunOutcome};

use crate::channel::EventChannel;

/// Channel carrying one run's events and its final outcome.
pub type AgentChannel = EventChannel<AgentEvent, RunOutcome>;

/// A fresh run channel that stops accepting events after `agent.end`.
pub fn agent_channel() -> AgentChannel {
    EventChannel::with_terminal(AgentEvent::is_agent_end)
}
