//! Time subsystem.
//!
//! - one `FrameClock` per window, ticked once per presented frame
//! - one `MonotonicClock` per runtime, feeding `revive_core` timestamps and
//!   turning recovery deadlines back into wake-up instants

mod frame_clock;
mod monotonic;

pub use frame_clock::{FrameClock, FrameTime};
pub use monotonic::MonotonicClock;
