//! Command registry and palette search for wasmpress.
//!
//! Holds the flat list of invocable actions behind the command palette,
//! scores them against a query with the palette's ranking algorithm, and
//! tracks execution history and favorites.

pub mod command;
pub mod history;
pub mod palette;
pub mod score;

pub use command::{Command, CommandAction};
pub use history::{CommandUsage, FAVORITES_KEY, HISTORY_KEY};
pub use palette::CommandRegistry;
pub use score::score_command;
