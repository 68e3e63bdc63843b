//! Integration tests for the link watchdog
//!
//! These tests drive the watchdog against a simulated device and verify:
//! - Connection lifecycle across unplug/replug cycles
//! - Enable/disable handling, including request coalescing
//! - In-order data delivery through the outward channel
//! - Open-failure retry behavior
//! - Best-effort semantics of the write path

use std::thread;
use std::time::Duration;

use tether_link::{LinkConfig, LinkWatchdog};
use tether_sim::SimTransport;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;
    use std::time::Instant;

    const STEP: Duration = Duration::from_millis(5);
    const DEADLINE: Duration = Duration::from_secs(2);

    /// Watchdog config with short timings so tests settle quickly
    pub fn fast_config() -> LinkConfig {
        LinkConfig {
            read_timeout: Duration::from_millis(10),
            retry_interval: Duration::from_millis(20),
            ..LinkConfig::new("sim0")
        }
    }

    /// A plugged-in simulated device with a watchdog already connected to it
    pub fn connected_pair() -> (SimTransport, LinkWatchdog) {
        let sim = SimTransport::new();
        sim.set_present(true);
        let watchdog = LinkWatchdog::spawn_with_transport(fast_config(), sim.clone());
        assert!(wait_until(|| sim.currently_open() == 1));
        (sim, watchdog)
    }

    /// Poll until `cond` holds or a deadline passes
    pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + DEADLINE;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(STEP);
        }
        false
    }

    /// Drain data chunks until `expected` bytes arrive or a deadline passes
    pub fn drain_bytes(watchdog: &LinkWatchdog, expected: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let deadline = Instant::now() + DEADLINE;
        while out.len() < expected && Instant::now() < deadline {
            for chunk in watchdog.poll_data() {
                out.extend(chunk);
            }
            thread::sleep(STEP);
        }
        out
    }

    /// Drain status events into an accumulator, returning messages only
    pub fn drain_status(watchdog: &LinkWatchdog, into: &mut Vec<String>) {
        into.extend(watchdog.poll_status().into_iter().map(|e| e.message));
    }
}

// ============================================================================
// Connection Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn connects_once_device_appears() {
        let sim = SimTransport::new();
        let watchdog = LinkWatchdog::spawn_with_transport(helpers::fast_config(), sim.clone());

        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Offline")
        }));
        assert_eq!(sim.open_count(), 0);

        sim.set_present(true);
        assert!(helpers::wait_until(|| sim.currently_open() == 1));
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Online")
        }));

        // Offline was reported before Online, in channel order
        let offline = messages.iter().position(|m| m == "Offline");
        let online = messages.iter().position(|m| m == "Online");
        assert!(offline < online);
    }

    #[test]
    fn reconnects_after_unplug() {
        let (sim, watchdog) = helpers::connected_pair();

        sim.set_present(false);
        assert!(helpers::wait_until(|| sim.currently_open() == 0));
        assert_eq!(sim.close_count(), 1);

        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Offline")
        }));

        sim.set_present(true);
        assert!(helpers::wait_until(|| sim.open_count() == 2));
        assert_eq!(sim.max_concurrent_opens(), 1);
    }

    #[test]
    fn reopens_after_read_error() {
        let (sim, watchdog) = helpers::connected_pair();

        sim.fail_next_read();

        assert!(helpers::wait_until(|| sim.open_count() == 2));
        assert_eq!(sim.max_concurrent_opens(), 1);
        assert!(sim.close_count() >= 1);

        // The replacement link still delivers data
        sim.feed(b"back");
        assert_eq!(helpers::drain_bytes(&watchdog, 4), b"back");
    }

    #[test]
    fn dropping_the_watchdog_closes_the_link() {
        let (sim, watchdog) = helpers::connected_pair();

        drop(watchdog);

        assert!(helpers::wait_until(|| sim.currently_open() == 0));
        assert_eq!(sim.close_count(), sim.open_count());
    }
}

// ============================================================================
// Enable/Disable Tests
// ============================================================================

mod enable_tests {
    use super::*;

    #[test]
    fn disable_closes_link_and_stops_data() {
        let (sim, watchdog) = helpers::connected_pair();

        watchdog.set_enabled(false);
        assert!(helpers::wait_until(|| sim.currently_open() == 0));

        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Disabled")
        }));

        // Nothing reads from the device while disabled
        let _ = watchdog.poll_data();
        sim.feed(b"late");
        thread::sleep(Duration::from_millis(100));
        assert!(watchdog.poll_data().is_empty());
        assert_eq!(sim.open_count(), 1);
    }

    #[test]
    fn reenable_reconnects() {
        let (sim, watchdog) = helpers::connected_pair();

        watchdog.set_enabled(false);
        assert!(helpers::wait_until(|| sim.currently_open() == 0));

        watchdog.set_enabled(true);
        assert!(helpers::wait_until(|| sim.open_count() == 2));

        sim.feed(b"again");
        assert_eq!(helpers::drain_bytes(&watchdog, 5), b"again");
    }

    #[test]
    fn starts_disabled_when_configured() {
        let sim = SimTransport::new();
        sim.set_present(true);
        let config = LinkConfig {
            enabled: false,
            ..helpers::fast_config()
        };
        let watchdog = LinkWatchdog::spawn_with_transport(config, sim.clone());

        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Disabled")
        }));
        assert_eq!(sim.open_count(), 0);

        watchdog.set_enabled(true);
        assert!(helpers::wait_until(|| sim.currently_open() == 1));
    }

    #[test]
    fn rapid_toggles_coalesce_to_last_value() {
        let (sim, watchdog) = helpers::connected_pair();

        // A burst ending in "enabled" leaves the link up once observed
        for _ in 0..3 {
            watchdog.set_enabled(false);
            watchdog.set_enabled(true);
        }
        thread::sleep(Duration::from_millis(150));
        assert!(helpers::wait_until(|| sim.currently_open() == 1));

        // And a burst ending in "disabled" takes it down
        for _ in 0..3 {
            watchdog.set_enabled(true);
            watchdog.set_enabled(false);
        }
        assert!(helpers::wait_until(|| sim.currently_open() == 0));
    }
}

// ============================================================================
// Data Delivery Tests
// ============================================================================

mod data_tests {
    use super::*;

    #[test]
    fn bytes_arrive_in_order() {
        let (sim, watchdog) = helpers::connected_pair();

        sim.feed(b"b1");
        sim.feed(b"b2");
        sim.feed(b"b3");

        assert_eq!(helpers::drain_bytes(&watchdog, 6), b"b1b2b3");
    }

    #[test]
    fn single_byte_feeds_reassemble() {
        let (sim, watchdog) = helpers::connected_pair();

        for byte in b"stream" {
            sim.feed(&[*byte]);
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(helpers::drain_bytes(&watchdog, 6), b"stream");
    }

    #[test]
    fn zero_length_read_is_not_a_disconnection() {
        let (sim, watchdog) = helpers::connected_pair();

        sim.zero_next_read();
        thread::sleep(Duration::from_millis(50));

        // Same link, still delivering
        sim.feed(b"after");
        assert_eq!(helpers::drain_bytes(&watchdog, 5), b"after");
        assert_eq!(sim.open_count(), 1);
        assert_eq!(sim.close_count(), 0);
    }
}

// ============================================================================
// Open Failure Tests
// ============================================================================

mod open_failure_tests {
    use super::*;

    #[test]
    fn refused_open_retries_until_admitted() {
        let sim = SimTransport::new();
        sim.set_present(true);
        sim.set_accept_opens(false);
        let watchdog = LinkWatchdog::spawn_with_transport(helpers::fast_config(), sim.clone());

        // Open failures surface as status events at the retry cadence
        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages
                .iter()
                .filter(|m| m.starts_with("Cannot open port"))
                .count()
                >= 2
        }));
        assert_eq!(sim.open_count(), 0);

        sim.set_accept_opens(true);
        assert!(helpers::wait_until(|| sim.currently_open() == 1));
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Online")
        }));
    }
}

// ============================================================================
// Write Path Tests
// ============================================================================

mod write_tests {
    use super::*;

    #[test]
    fn send_without_link_is_a_noop() {
        let sim = SimTransport::new();
        let watchdog = LinkWatchdog::spawn_with_transport(helpers::fast_config(), sim.clone());

        watchdog.send(b"ping");
        thread::sleep(Duration::from_millis(50));

        assert!(sim.written().is_empty());
    }

    #[test]
    fn send_reaches_an_open_link() {
        let (sim, watchdog) = helpers::connected_pair();

        // Wait for the Online event: the writer is installed before it
        let mut messages = Vec::new();
        assert!(helpers::wait_until(|| {
            helpers::drain_status(&watchdog, &mut messages);
            messages.iter().any(|m| m == "Online")
        }));

        watchdog.send(b"ping");

        assert_eq!(sim.written(), b"ping");
    }

    #[test]
    fn send_after_disable_is_dropped() {
        let (sim, watchdog) = helpers::connected_pair();

        watchdog.set_enabled(false);
        assert!(helpers::wait_until(|| sim.currently_open() == 0));

        watchdog.send(b"ping");
        thread::sleep(Duration::from_millis(50));

        assert!(sim.written().is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    /// One scripted action against the simulated device
    #[derive(Debug, Clone)]
    enum Action {
        Feed(Vec<u8>),
        Unplug,
        Replug,
        Disable,
        Enable,
        FailRead,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 1..8).prop_map(Action::Feed),
            Just(Action::Unplug),
            Just(Action::Replug),
            Just(Action::Disable),
            Just(Action::Enable),
            Just(Action::FailRead),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 8,
            ..ProptestConfig::default()
        })]

        #[test]
        fn never_more_than_one_link_open(
            actions in proptest::collection::vec(action(), 1..12)
        ) {
            let sim = SimTransport::new();
            sim.set_present(true);
            let watchdog =
                LinkWatchdog::spawn_with_transport(helpers::fast_config(), sim.clone());

            for action in actions {
                match action {
                    Action::Feed(bytes) => sim.feed(&bytes),
                    Action::Unplug => sim.set_present(false),
                    Action::Replug => sim.set_present(true),
                    Action::Disable => watchdog.set_enabled(false),
                    Action::Enable => watchdog.set_enabled(true),
                    Action::FailRead => sim.fail_next_read(),
                }
                thread::sleep(Duration::from_millis(15));
                prop_assert!(sim.max_concurrent_opens() <= 1);
            }

            // Once the driver goes away, every open ends in exactly one close
            drop(watchdog);
            let settled = helpers::wait_until(|| {
                sim.currently_open() == 0 && sim.close_count() == sim.open_count()
            });
            prop_assert!(settled);
        }
    }
}
