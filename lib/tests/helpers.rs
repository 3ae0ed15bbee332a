#![allow(unused)]

use std::{str::FromStr, time::Duration};

use log::LevelFilter;
use simplelog::SimpleLogger;

use rki::{inject::BOOTSTRAP_FILES, DeviceHandle};
use rki_sim::{Sim, SimChannel};

/// Short response timeout for dropped response tests
pub const TEST_TIMEOUT: Duration = Duration::from_millis(50);

/// Setup logging from the `LOG_LEVEL` environment variable
pub fn setup_logging() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Info,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Setup a simulated terminal and in-process handle
pub fn setup() -> (Sim, DeviceHandle<SimChannel>) {
    setup_logging();

    let sim = Sim::new();
    let d = DeviceHandle::from(sim.channel()).with_request_timeout(TEST_TIMEOUT);

    (sim, d)
}

/// Setup a simulated terminal seeded with bootstrap files
pub fn setup_bootstrap() -> (Sim, DeviceHandle<SimChannel>) {
    let (sim, d) = setup();

    for (f, v) in BOOTSTRAP_FILES.iter().zip(bootstrap_values()) {
        sim.put_file(f, v.as_bytes());
    }

    (sim, d)
}

/// Bootstrap file contents, in [BOOTSTRAP_FILES] order
pub fn bootstrap_values() -> [&'static str; 4] {
    [
        "-----BEGIN CERTIFICATE-----\nPROD\n-----END CERTIFICATE-----\n",
        "-----BEGIN CERTIFICATE-----\nTERMINAL\n-----END CERTIFICATE-----\n",
        "-----BEGIN CERTIFICATE-----\nTEMPLOAD\n-----END CERTIFICATE-----\n",
        "FFFF9876543210E00000",
    ]
}

/// Generate `n` bytes of test data
pub fn test_data(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i * 7 + 3) as u8).collect()
}
