use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result};
use log::{error, info};

use crate::context::Ctx;
use crate::format::{format_event, DeviceEventKind, ENUMERATION_BANNER};
use crate::watch::DeviceWatcher;

pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Spawns the monitor thread. The watcher is constructed by `make_watcher`
/// on the new thread, so any per-thread OS resources it acquires are scoped
/// to that thread's lifetime; a construction failure is reported to the
/// queue and the thread exits.
pub fn spawn<W, F>(ctx: Ctx, poll_timeout: Duration, make_watcher: F)
    -> Result<thread::JoinHandle<()>>
where
    W: DeviceWatcher,
    F: FnOnce() -> Result<W> + Send + 'static,
{
    thread::Builder::new()
        .name("usb-monitor".into())
        .spawn(move || {
            info!("Monitor thread start");
            match make_watcher() {
                Ok(mut watcher) => run(&ctx, &mut watcher, poll_timeout),
                Err(e) => {
                    error!("Error initializing device monitoring: {e}");
                    ctx.events.push(format!("Error initializing device monitoring: {e}"));
                }
            }
            info!("Monitor thread finish");
        })
        .context("Failed to spawn monitor thread")
}

/// The monitor loop: report everything currently attached once, then poll
/// for connects and disconnects until the running flag is cleared. The flag
/// is checked every iteration, so shutdown latency is bounded by one poll
/// cycle.
pub fn run(ctx: &Ctx, watcher: &mut impl DeviceWatcher, poll_timeout: Duration) {
    enumerate(ctx, watcher);
    while ctx.is_running() {
        poll(ctx, watcher, poll_timeout);
    }
}

fn enumerate(ctx: &Ctx, watcher: &impl DeviceWatcher) {
    ctx.events.push(ENUMERATION_BANNER);
    match watcher.list_current() {
        Ok(devices) => {
            info!("Found {} USB devices", devices.len());
            for record in &devices {
                ctx.events.push(format_event(DeviceEventKind::Present, record));
            }
        }
        Err(e) => {
            error!("Error enumerating devices: {e}");
            ctx.events.push(format!("Error monitoring devices: {e}"));
        }
    }
}

fn poll(ctx: &Ctx, watcher: &mut impl DeviceWatcher, timeout: Duration) {
    match watcher.wait_for_creation(timeout) {
        Ok(Some(record)) => {
            info!("New device connected: {}", record.name);
            ctx.events.push(format_event(DeviceEventKind::Connected, &record));
        }
        // timeout, retried on the next iteration
        Ok(None) => {}
        Err(e) => {
            error!("Error in device monitoring: {e}");
            ctx.events.push(format!("Error monitoring devices: {e}"));
        }
    }

    match watcher.wait_for_deletion(timeout) {
        Ok(Some(record)) => {
            info!("Device disconnected: {}", record.name);
            ctx.events.push(format_event(DeviceEventKind::Disconnected, &record));
        }
        Ok(None) => {}
        Err(e) => {
            error!("Error in device monitoring: {e}");
            ctx.events.push(format!("Error monitoring devices: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Instant;

    use anyhow::anyhow;
    use crate::record::DeviceRecord;

    /// Scripted watcher: hands out queued events, then times out forever.
    #[derive(Default)]
    struct ScriptedWatcher {
        current: Vec<DeviceRecord>,
        created: VecDeque<DeviceRecord>,
        removed: VecDeque<DeviceRecord>,
        fail_listing: bool,
    }

    impl DeviceWatcher for ScriptedWatcher {
        fn list_current(&self) -> Result<Vec<DeviceRecord>> {
            if self.fail_listing {
                return Err(anyhow!("enumeration failed"));
            }
            Ok(self.current.clone())
        }

        fn wait_for_creation(&mut self, _timeout: Duration) -> Result<Option<DeviceRecord>> {
            Ok(self.created.pop_front())
        }

        fn wait_for_deletion(&mut self, _timeout: Duration) -> Result<Option<DeviceRecord>> {
            Ok(self.removed.pop_front())
        }
    }

    /// Watcher that actually blocks for the requested timeout, to measure
    /// shutdown latency.
    struct SleepingWatcher;

    impl DeviceWatcher for SleepingWatcher {
        fn list_current(&self) -> Result<Vec<DeviceRecord>> {
            Ok(vec![])
        }

        fn wait_for_creation(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>> {
            thread::sleep(timeout);
            Ok(None)
        }

        fn wait_for_deletion(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>> {
            thread::sleep(timeout);
            Ok(None)
        }
    }

    fn test_device() -> DeviceRecord {
        DeviceRecord::new(
            Some("Test Device".into()),
            Some(r"USB\VID_ABCD&PID_0001"),
            Some("OK".into()),
        )
    }

    #[test]
    fn empty_enumeration_queues_only_the_banner() {
        let ctx = Ctx::new();
        ctx.shutdown();
        run(&ctx, &mut ScriptedWatcher::default(), POLL_TIMEOUT);
        assert_eq!(ctx.events.drain(), vec![ENUMERATION_BANNER.to_string()]);
    }

    #[test]
    fn current_devices_are_reported_after_the_banner() {
        let ctx = Ctx::new();
        ctx.shutdown();
        let mut watcher = ScriptedWatcher {
            current: vec![test_device()],
            ..Default::default()
        };
        run(&ctx, &mut watcher, POLL_TIMEOUT);

        let messages = ctx.events.drain();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ENUMERATION_BANNER);
        assert!(messages[1].starts_with("Device Found:"));
        assert!(messages[1].contains("Name: Test Device"));
    }

    #[test]
    fn creation_event_message_carries_device_details() {
        let ctx = Ctx::new();
        let mut watcher = ScriptedWatcher::default();
        watcher.created.push_back(test_device());

        poll(&ctx, &mut watcher, POLL_TIMEOUT);

        let messages = ctx.events.drain();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Name: Test Device"));
        assert!(messages[0].contains("Vendor ID: ABCD"));
        assert!(messages[0].contains("Status: OK"));
    }

    #[test]
    fn deletion_event_message_omits_status() {
        let ctx = Ctx::new();
        let mut watcher = ScriptedWatcher::default();
        watcher.removed.push_back(test_device());

        poll(&ctx, &mut watcher, POLL_TIMEOUT);

        let messages = ctx.events.drain();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Device Disconnected:"));
        assert!(!messages[0].contains("Status:"));
    }

    #[test]
    fn enumeration_failure_is_reported_and_does_not_panic() {
        let ctx = Ctx::new();
        ctx.shutdown();
        let mut watcher = ScriptedWatcher {
            fail_listing: true,
            ..Default::default()
        };
        run(&ctx, &mut watcher, POLL_TIMEOUT);

        let messages = ctx.events.drain();
        assert_eq!(messages[0], ENUMERATION_BANNER);
        assert!(messages[1].contains("Error monitoring devices"));
    }

    #[test]
    fn watcher_construction_failure_is_queued_and_thread_exits() {
        let ctx = Ctx::new();
        let handle = spawn::<ScriptedWatcher, _>(ctx.clone(), POLL_TIMEOUT, || {
            Err(anyhow!("no hotplug support"))
        })
        .unwrap();
        handle.join().unwrap();

        let messages = ctx.events.drain();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Error initializing device monitoring"));
        assert!(messages[0].contains("no hotplug support"));
    }

    #[test]
    fn shutdown_is_observed_within_one_poll_cycle() {
        let ctx = Ctx::new();
        let timeout = Duration::from_millis(100);
        let handle = spawn(ctx.clone(), timeout, || Ok(SleepingWatcher)).unwrap();

        // let the loop get into its blocking waits
        thread::sleep(Duration::from_millis(50));
        ctx.shutdown();
        let start = Instant::now();
        handle.join().unwrap();

        // one creation-wait plus one deletion-wait, with slack
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
