//! Inbound commands to the connection core.
//!
//! These represent requests from the outside world (application code,
//! a console, a button handler) that the
//! [`ConnectionOrchestrator`](super::service::ConnectionOrchestrator)
//! interprets and acts upon.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use log::warn;

use crate::credentials::Ssid;

/// Commands that external adapters can send into the connection core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Enable or disable the stored-network search after a link drop.
    /// Takes effect at the next link loss.
    SetAutoReconnect(bool),

    /// Remove one remembered network and persist.
    Forget(Ssid),

    /// Remove every remembered network and persist.
    ForgetAll,

    /// Abandon the current state and search stored networks again.
    Restart,
}

// ───────────────────────────────────────────────────────────────
// Command queue
// ───────────────────────────────────────────────────────────────

/// Maximum number of pending commands.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

type CommandChannel = Channel<CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_DEPTH>;

/// Single-consumer intake for [`AppCommand`]s, drained by the orchestrator
/// loop alongside the [`EventBus`](crate::events::EventBus).
pub struct CommandQueue {
    channel: CommandChannel,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Producer handle for application tasks, consoles or button handlers.
    pub fn sender(&self) -> CommandSender<'_> {
        CommandSender {
            sender: self.channel.sender(),
        }
    }

    pub fn try_next(&self) -> Option<AppCommand> {
        self.channel.try_receive().ok()
    }

    pub async fn next(&self) -> AppCommand {
        self.channel.receive().await
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the [`CommandQueue`].
#[derive(Clone, Copy)]
pub struct CommandSender<'a> {
    sender: Sender<'a, CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_DEPTH>,
}

impl CommandSender<'_> {
    /// Enqueue without blocking.  Returns `false` if the queue was full.
    pub fn send(&self, cmd: AppCommand) -> bool {
        match self.sender.try_send(cmd) {
            Ok(()) => true,
            Err(_) => {
                warn!("CommandQueue: queue full, command dropped");
                false
            }
        }
    }
}
