//! Declarative command engine.
//!
//! A [`Command`] owns an ordered list of [`Param`]s whose regex fragments are
//! joined into one grammar. The [`CommandRegistry`] maps typed names to
//! commands and mirrors the database-backed static commands. Handlers write
//! their replies into a [`ResponseContext`].

mod command;
mod help;
mod param;
mod registry;
mod response;

pub use command::{Command, CommandBuilder, CommandHandler, Requirements};
pub use help::{command_info, help_desc};
pub use param::{
    ExampleContext, Examples, Extract, Param, ParamValue, ALPHA, ALPHANUM, COMMAND, COMMAND_PARAM,
    NUM, QUOTED, SIGNED, TEXT, USER_ID,
};
pub use registry::{CommandRegistry, SharedRegistry, STATIC_ARGS_PARAM};
pub use response::{split_message, Output, ResponseContext, MAX_MESSAGE_LEN};
