//! Command Validator (C1): classifies a shell command as dangerous via a
//! fixed regex set plus a user denylist.

mod dangerous_commands;
mod interactive_commands;
mod validator;

pub use validator::CommandValidator;
