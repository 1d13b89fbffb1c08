pub mod actions;
pub mod config;
pub mod connection;
pub mod diff_preview;
pub mod path_safety;
pub mod poll_state;
pub mod proposal;
pub mod records;
pub mod reducer;
pub mod risk;
pub mod state;
pub mod timeformat;
pub mod tree;

pub use actions::*;
pub use reducer::*;
pub use state::*;
