//! Deriving a new agent version from an existing source file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::{info, instrument};

use crate::agent::{Agent, Registry, AI_PREFIX, SOURCE_EXTENSION};
use crate::error::{DojoError, Result};

/// Declaration inside an agent source that names the player.
pub const PLAYER_NAME_DECLARATION: &str = "#define PLAYER_NAME ";

/// Outcome of [`derive_next_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    /// Agent the new source was copied from.
    pub base: Agent,
    /// Version number given to the copy.
    pub version: u32,
    /// Path of the written source file.
    pub path: PathBuf,
}

/// Copies the source of `base` into `dir` as the next version of its family.
///
/// The new version is one past the family's last version. The copied source gets its
/// `PLAYER_NAME` declaration rewritten to `Name_Version`. Running this twice creates two
/// versions.
#[instrument(skip(registry), fields(base = %base))]
pub fn derive_next_version(
    registry: &Registry,
    base: &Agent,
    description: &str,
    dir: &Path,
) -> Result<NewVersion> {
    if !base.has_source() {
        return Err(DojoError::MissingSource {
            agent: base.player_name(),
        });
    }

    let version = registry.family(base).last_version() + 1;
    let player_name = format!("{}_{version}", base.name);
    let file_stem = if description.is_empty() {
        player_name.clone()
    } else {
        format!("{player_name}_{description}")
    };
    let path = dir.join(format!("{AI_PREFIX}{file_stem}.{SOURCE_EXTENSION}"));

    let content = std::fs::read_to_string(dir.join(&base.source_file))?;
    std::fs::write(&path, rename_player(&content, &player_name))?;

    info!("created version {version} of {} at {}", base.name, path.display());
    Ok(NewVersion {
        base: base.clone(),
        version,
        path,
    })
}

static PLAYER_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{PLAYER_NAME_DECLARATION}[_0-9A-Za-z]+")).expect("valid player name pattern")
});

/// Replaces the identifier following every `#define PLAYER_NAME` with `player_name`.
pub fn rename_player(source: &str, player_name: &str) -> String {
    let declaration = format!("{PLAYER_NAME_DECLARATION}{player_name}");
    PLAYER_NAME_PATTERN
        .replace_all(source, NoExpand(&declaration))
        .into_owned()
}
