//! 命令模块

pub mod run;
pub mod validate;

pub use run::RunCommand;
pub use validate::ValidateCommand;
