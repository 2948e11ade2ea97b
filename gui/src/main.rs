mod opts;
mod panic;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::*;
use core::result::Result::Ok;
use gtk::prelude::*;
use log::*;

use usbmon_core::context::Ctx;
use usbmon_core::logging::RotatingFileLogger;
use usbmon_core::monitor;
use usbmon_usb::UsbWatcher;

use crate::opts::{Opts, Parser};
use crate::panic::wire_panic_logging;

const WINDOW_TITLE: &str = "USB Device Monitor";

type MonitorHandle = Arc<Mutex<Option<thread::JoinHandle<()>>>>;

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(e) = &result {
        // no-op when the failure happened before the logger was installed;
        // the propagated error still reaches stderr and sets the exit code
        error!("Critical error in main: {e:#}");
    }
    result
}

async fn run() -> Result<()> {
    let opts = Opts::parse();

    RotatingFileLogger::new(&opts.log_file)?.install()?;
    wire_panic_logging();

    info!("Starting {}", WINDOW_TITLE);

    gtk::init().with_context(|| "Failed to initialize GTK")?;

    let ctx = Ctx::new();
    let poll_timeout = Duration::from_millis(opts.poll_ms);
    let monitor_handle: MonitorHandle = Arc::new(Mutex::new(Some(
        monitor::spawn(ctx.clone(), poll_timeout, UsbWatcher::new)?,
    )));

    build_ui(&ctx, opts.tick_ms, monitor_handle);

    debug!("starting gtk main loop");
    gtk::main();
    debug!("end of gtk main loop");

    Ok(())
}

fn build_ui(ctx: &Ctx, tick_ms: u64, monitor_handle: MonitorHandle) {
    let window = gtk::Window::new(gtk::WindowType::Toplevel);
    window.set_title(WINDOW_TITLE);
    window.set_default_size(800, 600);

    let vbox = gtk::Box::new(gtk::Orientation::Vertical, 5);
    vbox.set_margin_top(10);
    vbox.set_margin_bottom(10);
    vbox.set_margin_start(10);
    vbox.set_margin_end(10);

    let text_view = gtk::TextView::new();
    text_view.set_editable(false);
    text_view.set_cursor_visible(false);
    text_view.set_monospace(true);

    let scroll = gtk::ScrolledWindow::new(None::<&gtk::Adjustment>, None::<&gtk::Adjustment>);
    scroll.add(&text_view);
    vbox.pack_start(&scroll, true, true, 0);

    let button_box = gtk::Box::new(gtk::Orientation::Horizontal, 5);
    let clear_button = gtk::Button::with_label("Clear Log");
    let exit_button = gtk::Button::with_label("Exit");
    button_box.pack_start(&clear_button, false, false, 5);
    button_box.pack_end(&exit_button, false, false, 5);
    vbox.pack_start(&button_box, false, false, 5);

    window.add(&vbox);

    let buffer = text_view.buffer().unwrap();

    clear_button.connect_clicked({
        let buffer = buffer.clone();
        move |_| clear_visible_log(&buffer)
    });

    // quits the GTK main loop once the monitor thread is down
    let (quit_tx, quit_rx) = glib::MainContext::channel::<()>(glib::Priority::DEFAULT);
    quit_rx.attach(None, |_| {
        info!("Quitting...");
        gtk::main_quit();
        glib::ControlFlow::Break
    });

    let request_shutdown = {
        let ctx = ctx.clone();
        move || {
            let Some(handle) = monitor_handle.lock().unwrap().take() else {
                // shutdown already in progress
                return;
            };
            info!("Shutting down USB Monitor");
            ctx.shutdown();
            let quit_tx = quit_tx.clone();
            tokio::task::spawn_blocking(move || {
                let _ = handle.join();
                let _ = quit_tx.send(());
            });
        }
    };

    exit_button.connect_clicked({
        let request_shutdown = request_shutdown.clone();
        move |_| request_shutdown()
    });
    window.connect_delete_event(move |_, _| {
        request_shutdown();
        glib::Propagation::Stop
    });

    // display tick: drain whatever is queued, never block on the producer
    glib::timeout_add_local(Duration::from_millis(tick_ms), {
        let ctx = ctx.clone();
        let text_view = text_view.clone();
        let buffer = buffer.clone();
        move || {
            let messages = ctx.events.drain();
            if !messages.is_empty() {
                for message in messages {
                    let mut end = buffer.end_iter();
                    buffer.insert(&mut end, &format!("{message}\n"));
                }
                // keep the newest entry visible
                let mark = buffer.create_mark(None, &buffer.end_iter(), false).unwrap();
                text_view.scroll_to_mark(&mark, 0.0, false, 0.0, 1.0);
                buffer.delete_mark(&mark);
            }
            glib::ControlFlow::Continue
        }
    });

    window.show_all();
}

/// Clears the on-screen log only; the log file keeps everything.
fn clear_visible_log(buffer: &gtk::TextBuffer) {
    buffer.set_text("");
}
