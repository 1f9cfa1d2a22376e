//! Fuzz harness for configuration files (roundlog.yaml / roundlog.json)
//!
//! Parsing and validation must reject bad input without panicking.
//! Target: `roundlog_config::RoundlogConfig`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roundlog_config::RoundlogConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = serde_yaml::from_str::<RoundlogConfig>(input) {
        let _ = config.validate();
    }
    if let Ok(config) = serde_json::from_str::<RoundlogConfig>(input) {
        let _ = config.validate();
    }
});
