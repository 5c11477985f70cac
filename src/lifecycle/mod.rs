//! Process lifecycle: termination handling

mod shutdown;

pub use shutdown::ShutdownSignal;
