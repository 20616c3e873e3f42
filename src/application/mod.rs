//! Application layer containing the processing pipeline.
//!
//! `Pipeline` is the entry point for creating and settling transfers. It wires the
//! idempotency store, the state machine, the ledger and the risk policy together.

pub mod pipeline;
