pub mod context;
pub mod format;
pub mod logging;
pub mod monitor;
pub mod queue;
pub mod record;
pub mod watch;

pub use context::Ctx;
pub use queue::EventQueue;
pub use record::DeviceRecord;
pub use watch::DeviceWatcher;
