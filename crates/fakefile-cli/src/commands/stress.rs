//! `fakeclient stress` — hammer open/close from many threads.

use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use fakefile_core::{FakeFile, SessionStats, Whence};
use serde::Serialize;
use tracing::debug;

/// Bytes each worker writes and reads back per round.
const CHUNK: usize = 16;

#[derive(Debug, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub rounds: usize,
    pub bytes_written: usize,
    pub bytes_read: usize,
    pub stats: SessionStats,
}

pub fn run(device: &Arc<FakeFile>, threads: usize, rounds: usize, json: bool) -> Result<()> {
    let report = exercise(device, threads, rounds)?;

    if json {
        return super::print_json(&report);
    }

    println!(
        "{} threads x {} rounds: wrote {} bytes, read {} bytes",
        report.threads, report.rounds, report.bytes_written, report.bytes_read
    );
    println!(
        "buffer allocated {} times, freed {} times",
        report.stats.allocations, report.stats.releases
    );
    Ok(())
}

fn exercise(device: &Arc<FakeFile>, threads: usize, rounds: usize) -> Result<StressReport> {
    let capacity = device.capacity();

    let workers: Vec<_> = (0..threads)
        .map(|id| {
            let device = Arc::clone(device);
            thread::spawn(move || -> Result<(usize, usize)> {
                let mut written = 0;
                let mut read = 0;
                let mut scratch = [0u8; CHUNK];
                for round in 0..rounds {
                    let handle = device.open()?;
                    // The cursor is shared, so counts depend on interleaving.
                    let offset = ((id + round) % capacity) as i64;
                    handle.seek(offset, Whence::Start)?;
                    written += handle.write(&[id as u8; CHUNK], CHUNK)?;
                    handle.seek(offset, Whence::Start)?;
                    read += handle.read(&mut scratch, CHUNK)?;
                    handle.close()?;
                }
                debug!(thread = id, written, read, "worker finished");
                Ok((written, read))
            })
        })
        .collect();

    let mut bytes_written = 0;
    let mut bytes_read = 0;
    for worker in workers {
        let (w, r) = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?
            .context("worker failed")?;
        bytes_written += w;
        bytes_read += r;
    }

    let stats = device.stats();
    if stats.open_count != 0 || stats.allocated {
        bail!(
            "device left open after stress run: {} session(s), allocated = {}",
            stats.open_count,
            stats.allocated
        );
    }
    if stats.allocations != stats.releases {
        bail!(
            "allocation mismatch: {} allocations, {} releases",
            stats.allocations,
            stats.releases
        );
    }

    Ok(StressReport {
        threads,
        rounds,
        bytes_written,
        bytes_read,
        stats,
    })
}
