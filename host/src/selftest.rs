//! Link self-test against a connected bridge.
//!
//! Exercises single registers and small and large bursts, reading every
//! burst back. Large bursts span several chunks in both directions.

use colored::Colorize;

use crate::session::BridgeSession;
use crate::transport::Transport;

/// Larger than any chunk, in both directions
const LARGE_BURST: usize = 2500;
const SMALL_BURST: usize = 16;

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: Some(message.to_string()),
        }
    }
}

/// Run a test function and print results as it happens.
fn run_test<T, F>(name: &str, session: &BridgeSession<T>, test_fn: F) -> TestResult
where
    T: Transport,
    F: FnOnce(&BridgeSession<T>) -> TestResult,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let mut result = test_fn(session);
    result.name = name.to_string();

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    result
}

/// Run all tests and return results.
pub fn run_all_tests<T: Transport>(session: &BridgeSession<T>) -> Vec<TestResult> {
    vec![
        run_test("Firmware check returns unique id", session, test_firmware),
        run_test("Single register write then read", session, test_register),
        run_test("Small burst read-back", session, |s| test_burst(s, 0x55, SMALL_BURST)),
        run_test("Large burst read-back", session, |s| test_burst(s, 0x5A, LARGE_BURST)),
        run_test("Final register read", session, test_final_read),
    ]
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            if let Some(msg) = &result.message {
                println!("         {}", msg.red());
            }
            failed += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

/// ASCII digits `0`..`9` repeating
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| 0x30 + (i % 10) as u8).collect()
}

// --- Individual Tests ---

fn test_firmware<T: Transport>(session: &BridgeSession<T>) -> TestResult {
    match session.unique_id() {
        Ok(id) => {
            print!("({}) ", id.iter().map(|b| format!("{:02x}", b)).collect::<String>());
            TestResult::pass("test")
        }
        Err(e) => TestResult::fail("test", &format!("Error: {}", e)),
    }
}

fn test_register<T: Transport>(session: &BridgeSession<T>) -> TestResult {
    if let Err(e) = session.write_register(0x2A, 0x96) {
        return TestResult::fail("test", &format!("Write error: {}", e));
    }
    match session.read_register(0x2A) {
        Ok(0x96) => TestResult::pass("test"),
        Ok(value) => TestResult::fail("test", &format!("Expected 0x96, read {:#04x}", value)),
        Err(e) => TestResult::fail("test", &format!("Read error: {}", e)),
    }
}

fn test_burst<T: Transport>(session: &BridgeSession<T>, address: u8, len: usize) -> TestResult {
    let data = pattern(len);
    if let Err(e) = session.write_burst(address, &data) {
        return TestResult::fail("test", &format!("Write error: {}", e));
    }

    // Garbage, to be overwritten by the read
    let mut read = vec![0x23; len];
    if let Err(e) = session.read_burst(address, &mut read) {
        return TestResult::fail("test", &format!("Read error: {}", e));
    }

    match data.iter().zip(&read).position(|(a, b)| a != b) {
        None => TestResult::pass("test"),
        Some(i) => TestResult::fail(
            "test",
            &format!("Mismatch at byte {}: wrote {:#04x}, read {:#04x}", i, data[i], read[i]),
        ),
    }
}

fn test_final_read<T: Transport>(session: &BridgeSession<T>) -> TestResult {
    match session.read_register(0x55) {
        Ok(value) => {
            print!("({:#04x}) ", value);
            TestResult::pass("test")
        }
        Err(e) => TestResult::fail("test", &format!("Error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{fast_config, LoopbackDevice};
    use lgw_bridge::dispatcher::DispatcherConfig;

    #[test]
    fn test_selftest_passes_on_loopback() {
        let session = BridgeSession::new(LoopbackDevice::new(DispatcherConfig::default()), fast_config());

        let results = run_all_tests(&session);
        assert_eq!(results.len(), 5);
        for result in &results {
            assert!(result.passed, "{}: {:?}", result.name, result.message);
        }
    }

    #[test]
    fn test_pattern_is_ascii_digits() {
        assert_eq!(pattern(12), b"012345678901".to_vec());
    }
}
