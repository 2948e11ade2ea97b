use std::ffi::c_int;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use log::{debug, error, info};
use rusb::constants::*;
use rusb::ffi::libusb_set_option;
use rusb::{Context, UsbContext};

/// Creates a libusb context. On Windows this probes for the UsbDk backend
/// first, falling back to WinUSB when the driver is not installed.
pub(crate) fn new_ctx() -> Result<Context> {
    let v = rusb::version();
    info!(
        "libusb v{}.{}.{}.{}{}",
        v.major(), v.minor(), v.micro(), v.nano(), v.rc().unwrap_or("")
    );
    debug!("- LIBUSB_CAP_HAS_HOTPLUG = {}", rusb::has_hotplug());

    let ctx = Context::new()?;
    if cfg!(windows) {
        // SAFETY: C API call on a valid context
        match check(unsafe { libusb_set_option(ctx.as_raw(), LIBUSB_OPTION_USE_USBDK) }) {
            Ok(()) => info!("Using UsbDk backend"),
            Err(rusb::Error::NotFound) => info!("Using WinUSB backend"),
            Err(e) => return Err(e.into()),
        }
    }
    // SAFETY: C API call on a valid context
    check(unsafe {
        libusb_set_option(ctx.as_raw(), LIBUSB_OPTION_LOG_LEVEL, LIBUSB_LOG_LEVEL_WARNING)
    })?;
    Ok(ctx)
}

fn check(rc: c_int) -> rusb::Result<()> {
    match rc {
        LIBUSB_SUCCESS => Ok(()),
        LIBUSB_ERROR_NOT_FOUND => Err(rusb::Error::NotFound),
        LIBUSB_ERROR_INVALID_PARAM => Err(rusb::Error::InvalidParam),
        LIBUSB_ERROR_NOT_SUPPORTED => Err(rusb::Error::NotSupported),
        _ => Err(rusb::Error::Other),
    }
}

/// Dedicated thread driving libusb events; hotplug callbacks fire on it.
/// Stopping interrupts the current `handle_events` call and joins.
pub(crate) struct EventPump {
    ctx: Context,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EventPump {
    pub fn start(ctx: Context) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let (ctx, run) = (ctx.clone(), Arc::clone(&running));
            Some(thread::spawn(move || Self::event_thread(ctx, run)))
        };
        Self { ctx, running, thread }
    }

    fn event_thread(ctx: Context, run: Arc<AtomicBool>) {
        debug!("USB event thread start");
        while run.load(Ordering::Acquire) {
            if let Err(e) = ctx.handle_events(None) {
                error!("USB event thread error: {e}");
                break;
            }
        }
        debug!("USB event thread finish");
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.ctx.interrupt_handle_events();
        self.thread.take().map(thread::JoinHandle::join);
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}
