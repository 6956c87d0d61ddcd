//! Command line arguments for each binary.

pub mod ctl;
pub mod kvstore;
pub mod master;
pub mod worker;
