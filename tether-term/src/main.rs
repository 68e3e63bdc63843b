//! Tether - auto-reconnecting serial terminal
//!
//! A thin front end over the link watchdog: takes a port name, prints
//! whatever the device sends, and keeps printing across unplug/replug
//! cycles. All reconnection logic lives in `tether-link`; this binary only
//! drains the watchdog's channels on a fixed cadence.

use std::io::{self, Write};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use tether_detect::PortScanner;
use tether_link::{LinkConfig, LinkWatchdog, Severity};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the terminal drains the watchdog's channels
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "tether_term=info,tether_link=info,tether_detect=info".into()
        }))
        .with_writer(io::stderr)
        .init();

    let Some(port) = std::env::args().nth(1) else {
        eprintln!("Usage: tether COM5   or   tether /dev/ttyUSB0");
        return ExitCode::FAILURE;
    };

    info!("Starting tether on {}", port);

    // List what is visible at startup so a typo'd port name is easy to spot
    if let Err(e) = PortScanner::new().enumerate_ports() {
        warn!("Port enumeration failed: {}", e);
    }

    let watchdog = LinkWatchdog::spawn(LinkConfig::new(port));
    let mut stdout = io::stdout();
    let mut last_status: Option<String> = None;

    loop {
        for chunk in watchdog.poll_data() {
            if stdout
                .write_all(&chunk)
                .and_then(|_| stdout.flush())
                .is_err()
            {
                return ExitCode::FAILURE;
            }
        }

        for event in watchdog.poll_status() {
            // The watchdog re-emits its status every retry cycle; only
            // transitions are worth a log line
            if last_status.as_deref() == Some(event.message.as_str()) {
                continue;
            }
            match event.severity {
                Severity::Info => info!("{}", event.message),
                Severity::Error => warn!("{}", event.message),
            }
            last_status = Some(event.message);
        }

        thread::sleep(DRAIN_INTERVAL);
    }
}
