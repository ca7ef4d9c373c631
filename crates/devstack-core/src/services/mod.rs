pub mod catalog;
pub mod config_loader;
pub mod docker;
pub mod entrypoint;
pub mod env_file;
pub mod hooks;
pub mod image;
pub mod lifecycle;
pub mod network;
pub mod orchestrator;
pub mod prerequisites;
pub mod probe;
pub mod process;
pub mod retry;
pub mod security;
