//! Outer surfaces used by the CLI. They read requests and render results; they
//! never touch the stores directly.

pub mod csv;
