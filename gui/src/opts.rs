pub use clap::Parser;

use usbmon_core::logging::DEFAULT_LOG_FILE;

#[derive(Parser)]
#[clap(name = "usb-monitor")]
pub struct Opts {
    /// Path of the rotating log file
    #[clap(short, long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: String,

    /// Device poll timeout, in milliseconds
    #[clap(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// Display refresh interval, in milliseconds
    #[clap(long, default_value_t = 100)]
    pub tick_ms: u64,
}
