//! `elec-cli` subcommands.

pub mod checkout;
pub mod migrate;
pub mod webhook;
