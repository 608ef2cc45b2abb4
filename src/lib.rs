//! # imessage-transcript-export
//!
//! A CLI tool that exports one conversation from the macOS Messages database
//! (`~/Library/Messages/chat.db`) to a single HTML transcript.
//!
//! ## What it does
//!
//! Given one or more phone numbers or email addresses, the tool finds the
//! matching handles, lets you pick a conversation when more than one includes
//! them, and writes every message in timestamp order to `./output.html`. Each
//! day starts with a heading, your messages sit on the left and everyone else's
//! on the right, and attachments are copied to `./attachments/` as `0.jpg`,
//! `1.mov`, ... and linked from the transcript. Attachments that no longer
//! exist on disk are marked as missing instead of failing the export.
//!
//! The database is opened **read-only** and, by default, through a temporary
//! snapshot, so the Messages app can keep running.
//!
//! ## Usage
//!
//! ```sh
//! # Fully interactive
//! imessage-transcript-export
//!
//! # Nothing left to ask
//! imessage-transcript-export --id +15554443333 --all-time --utc-offset -5 --my-name Me
//! ```
//!
//! Display names for correspondents can be kept in
//! `~/.config/imessage-transcript-export/config.toml` under `[names]`.
//!
//! Existing output is never overwritten: the run stops if `output.html` or
//! `attachments/` is already there.

pub mod database;
pub mod error;
pub mod export;
pub mod prompt;
pub mod renderer;
pub mod resolver;
pub mod retriever;
pub mod selector;
pub mod timeline;
pub mod utils;
