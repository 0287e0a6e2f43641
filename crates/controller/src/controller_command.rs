//! Commands sent to the controller actor.

use tokio::sync::oneshot;

use crate::transition::{CommandRejected, Input};

pub type CommandReply = oneshot::Sender<Result<(), CommandRejected>>;

pub enum ControllerCommand {
    // -- Operator commands (admission result via oneshot) --
    /// `input` is one of `Start`, `Stop` or `Refresh`
    Operator { input: Input, reply: CommandReply },

    // -- Internal inputs (fire-and-forget) --
    /// Gateway completions and countdown ticks
    Apply { input: Input },
}
