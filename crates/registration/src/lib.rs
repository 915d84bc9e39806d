// Engine
pub mod core;
pub mod orchestrator;
pub mod session;

// Building blocks
pub mod captcha;
pub mod clock;
pub mod display;
pub mod queue;
pub mod random;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use self::core::*;
pub use orchestrator::*;
pub use session::*;
pub use captcha::{CaptchaChallenge, CaptchaPad};
pub use clock::{ClockPhase, ClockReader, ClockStatus, ClockTiming, EndCallback, EndReason, VirtualClock};
pub use display::{surface_pair, ChannelLauncher, ClockSubscriber, ClockSurface, SurfaceLauncher};
pub use queue::QueueState;
pub use random::{BoxedRandom, RandomSource, SeededRandom};
