//! `fakeclient demo` — the classic write / seek / read / oversized-write run.

use std::sync::Arc;

use anyhow::{Context, Result};
use fakefile_core::{FakeFile, SessionStats, Whence};
use serde::Serialize;
use tracing::info;

pub const DEFAULT_MESSAGE: &str = "This a test.";

/// Size of the deliberately oversized write.
pub const BAD_SIZE: usize = 5000;

/// Slack read past the written message, to show the zeroed tail.
const READ_SLACK: usize = 2;

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub device: String,
    pub major: u32,
    pub minor: u32,
    pub input: String,
    pub wrote: usize,
    pub read: usize,
    pub output: String,
    pub bad_size: usize,
    pub bad_wrote: usize,
    pub stats: SessionStats,
}

pub fn run(device: &Arc<FakeFile>, message: &str, bad_size: usize, json: bool) -> Result<()> {
    let report = exercise(device, message, bad_size)?;

    if json {
        return super::print_json(&report);
    }

    println!("Input is: {}", report.input);
    println!("Wrote {} bytes.", report.wrote);
    println!("Read {} bytes.", report.read);
    println!("Output is: {}", report.output);
    println!("Attempting to write {} bytes...", report.bad_size);
    println!("Wrote {} bytes.", report.bad_wrote);
    Ok(())
}

fn exercise(device: &Arc<FakeFile>, message: &str, bad_size: usize) -> Result<DemoReport> {
    let handle = device
        .open()
        .with_context(|| format!("failed to open `{}` device", device.name()))?;

    // Written with its NUL terminator, as a C string would be.
    let mut input = message.as_bytes().to_vec();
    input.push(0);
    let wrote = handle
        .write(&input, input.len())
        .context("write failed")?;

    handle.seek(0, Whence::Start).context("seek failed")?;

    let output_len = input.len() + READ_SLACK;
    let mut output = vec![0u8; output_len];
    let read = handle
        .read(&mut output, output_len)
        .context("read failed")?;
    info!(wrote, read, "round trip complete");

    let bad_input = vec![0xffu8; bad_size];
    handle.seek(0, Whence::Start).context("seek failed")?;
    let bad_wrote = handle
        .write(&bad_input, bad_input.len())
        .context("oversized write failed")?;
    info!(requested = bad_size, written = bad_wrote, "oversized write");

    handle.close().context("close failed")?;

    Ok(DemoReport {
        device: device.node_path(),
        major: device.major(),
        minor: device.minor(),
        input: message.to_string(),
        wrote,
        read,
        output: c_string(&output),
        bad_size,
        bad_wrote,
        stats: device.stats(),
    })
}

/// Text up to the first NUL byte.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
