pub mod bedrock;
pub mod command;
pub mod constants;
pub mod prompt;
pub mod runner;
pub mod settings;
pub mod system_info;
pub mod usage;

pub use command::{AiCli, CliArgs};
pub use settings::Settings;
