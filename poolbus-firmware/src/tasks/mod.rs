//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels.

pub mod bus;
pub mod rx;

pub use bus::bus_task;
pub use rx::rx_task;
