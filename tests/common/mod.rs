#![allow(dead_code)]

use assert_cmd::cargo_bin;
use cashledger::application::pipeline::{Pipeline, PipelineSettings};
use cashledger::infrastructure::clock::ManualClock;
use cashledger::infrastructure::in_memory::{InMemoryIdempotencyStore, InMemoryLedgerStore};
use std::io::{Error, Write};
use std::path::Path;
use std::process::Command;

/// In-memory pipeline on a manual clock: no real waiting between transitions.
pub fn memory_pipeline() -> Pipeline {
    Pipeline::new(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(InMemoryIdempotencyStore::new()),
        Box::new(ManualClock::default()),
        PipelineSettings::default(),
    )
}

/// Writes a transfers CSV with the `from,to,amount,key` header.
pub fn write_transfers(path: &Path, rows: &[[&str; 4]]) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "from,to,amount,key")?;
    for row in rows {
        writeln!(file, "{}", row.join(","))?;
    }
    Ok(())
}

/// The binary with a zero step delay and the given data directory.
pub fn ledger_cmd(data_dir: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("cashledger"));
    cmd.arg("--data-dir")
        .arg(data_dir)
        .arg("--step-delay-ms")
        .arg("0");
    cmd
}
