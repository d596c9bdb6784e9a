//! Teammate broadcast
//!
//! Delivery is synchronous, so every recipient has the message before the
//! next phase begins.

use crate::agent::AgentRoster;
use commons_types::{AgentId, TeamMessage};
use tracing::{debug, warn};

/// Deliver `message` to every recipient except `sender`.
///
/// Returns the number of agents the message reached.
pub fn broadcast_to_team(
    agents: &mut AgentRoster,
    recipients: &[AgentId],
    sender: Option<&AgentId>,
    message: &TeamMessage,
) -> usize {
    let mut delivered = 0;
    for recipient in recipients {
        if Some(recipient) == sender {
            continue;
        }
        match agents.get_mut(recipient) {
            Some(agent) => {
                agent.receive(message);
                delivered += 1;
            }
            None => warn!(agent = %recipient, "Broadcast recipient not found"),
        }
    }
    debug!(delivered = delivered, message = ?message, "Team broadcast");
    delivered
}
