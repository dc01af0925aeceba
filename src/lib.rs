// YallWall: an ephemeral local community wall.
//
// This is the library root. Posts live for 24 hours; neighbours like,
// reply and tip each other YallPoints. Each module is one layer of the
// client core; the CLI in main.rs drives them.

pub mod config;
pub mod db;
pub mod demo;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod identity;
pub mod output;
pub mod prefs;
pub mod retry;
pub mod status;

#[cfg(feature = "hosted")]
pub mod hosted;
