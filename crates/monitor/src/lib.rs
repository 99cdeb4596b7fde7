//! Library entrypoint for embedding the job monitor inside other binaries.
//! The `job_watch_monitor` binary wires the JSON-RPC adapters and webhook
//! sinks from the environment; embedders can drive [`ScanEngine`] with their
//! own collaborators and scheduler.

pub mod client;
pub mod engine;
pub mod notifiers;
pub mod rpc;
pub mod worker;

pub use client::JsonRpcClient;
pub use engine::{BlockRange, CycleReport, CyclePhase, DeliveryFailure, ScanEngine, ScanError};
pub use notifiers::{ConsoleNotifier, DiscordNotifier, SlackNotifier};
pub use rpc::{RpcChainReader, SequencerWhitelist};
pub use worker::{
    build_rpc_engine, build_sinks, run_monitor, run_until, MonitorError, RpcScanEngine, Schedule,
};
