//! Domain-level building blocks for the job watchdog: the chain data model,
//! the work detector, the collaborator interfaces the scan engine drives and
//! the environment contract shared by binaries.

pub mod config;
pub mod detector;
pub mod model;
pub mod ports;
pub mod services;

pub use detector::WorkDetector;
pub use model::{Address, Block, Detection, Selector, Transaction, Whitelist};
