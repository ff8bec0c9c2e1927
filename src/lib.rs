//! # Ai Dojo
//!
//! Evaluation of game-playing AI agents through repeated four-player matches.
//!
//! It provides:
//! - Agent discovery and versioning from the file names of a working directory (`Registry`)
//! - Descriptors selecting agents by name and version range (`Descriptor`)
//! - Single matches and parallel tournaments against an external game executable
//! - Aggregated standings: Elo ratings, placements, score statistics (`TournamentReport`)
//!
//! Agents are `AI<Name>[_<Version>[_<Description>]]` sources (`.cc`) or prebuilt objects (`.o`).
//! The game is an external program run once per match with the four player names; it reports
//! every final score on its diagnostic output.
//!
//! # Documentation Overview
//!
//! - For the entry point and its operations, see the [`dojo`] module.
//! - For selecting agents, see [`Descriptor`](crate::descriptor::Descriptor) and
//!   [`Registry`](crate::agent::Registry).
//! - For how matches are played, see the [`MatchExecutor`](crate::executor::MatchExecutor) trait.
//! - For configuring workers, compilation and files, see
//!   [`Configuration`](crate::configuration::Configuration).
//!
//! # Usage Example
//!
//! ```no_run
//! use ai_dojo::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new().with_verbose(true).with_workers(8);
//!     let dojo = Dojo::new("path_to_game_directory", config);
//!
//!     // Every agent, latest versions first
//!     for agent in dojo.list(&[])? {
//!         println!("{agent}");
//!     }
//!
//!     // A new version of the latest Albert
//!     let created = dojo.new_version("Albert", "faster_search")?;
//!     println!("created {}", created.path.display());
//!
//!     // Evaluate it against the dummies and the two previous Alberts
//!     let against = vec!["Dummy".to_owned(), "Albert:..-1".to_owned()];
//!     let report = dojo.evaluate("Albert", 500, &against, |_| {})?;
//!     print!("{report}");
//!
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod agent;
pub mod configuration;
pub mod descriptor;
pub mod dojo;
pub mod error;
pub mod executor;
mod logger;
pub mod match_result;
pub mod rating;
pub mod single_match;
pub mod stats;
pub mod tournament;
pub mod versioning;

pub use error::{DojoError, Result};

/// Commonly used types for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use ai_dojo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, Registry};
    pub use crate::configuration::Configuration;
    pub use crate::descriptor::Descriptor;
    pub use crate::dojo::Dojo;
    pub use crate::error::DojoError;
    pub use crate::executor::{GameExecutable, MatchExecutor, MatchFiles, Seed};
    pub use crate::match_result::MatchResult;
    pub use crate::rating::{AgentReport, TournamentReport};
    pub use crate::tournament::CancellationToken;
}
