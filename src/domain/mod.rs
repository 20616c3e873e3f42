//! Domain layer: value objects, the transaction state machine, ledger records,
//! balance derivation and the ports implemented by infrastructure.

pub mod account;
pub mod balances;
pub mod ledger;
pub mod ports;
pub mod risk;
pub mod state;
pub mod transaction;
