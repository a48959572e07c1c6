pub mod command;
pub mod exit;
pub mod func;
pub mod logging;
pub mod output;
