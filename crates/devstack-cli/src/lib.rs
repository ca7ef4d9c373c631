pub mod cli;
pub mod commands;
pub mod console;
pub mod render;
