// Cross-process skull propagation (router → worker)
//
// Frames travel over an injected MessageChannel; the NATS implementation
// is the one wired up by the binary.

mod channel;
pub mod frame;
mod messenger;
mod receiver;

pub use channel::{MessageChannel, NatsChannel, NatsConfig};
pub use frame::{Frame, FrameError, Instruction, GIVE_SKULL};
pub use messenger::CrossProcessMessenger;
pub use receiver::{Delivery, PlayerDirectory, SkullReceiver};

/// Named channel carrying skull frames between router and workers.
pub const CHANNEL: &str = "sr:messagechannel";
