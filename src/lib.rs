pub mod broker;
pub mod cli;
pub mod client;
pub mod clip;
pub mod ipc;
pub mod store;
