//! Agents, version families and the registry built from artifact file names.
//!
//! Agent artifacts follow the naming convention `AI<Name>[_<Version>[_<Description>]].<ext>`
//! where `<ext>` is either the source extension (`cc`) or the compiled one (`o`). Anything else
//! found in the working directory is ignored.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use tracing::{info, instrument, trace};

use crate::descriptor::Descriptor;
use crate::error::{DojoError, Result};

/// File name prefix shared by every agent artifact.
pub const AI_PREFIX: &str = "AI";
/// Extension of editable agent sources.
pub const SOURCE_EXTENSION: &str = "cc";
/// Extension of compiled agent objects.
pub const OBJECT_EXTENSION: &str = "o";

/// True if `file_name` follows the agent artifact convention.
pub fn is_ai_file(file_name: &str) -> bool {
    file_name.starts_with(AI_PREFIX)
        && (has_extension(file_name, SOURCE_EXTENSION) || has_extension(file_name, OBJECT_EXTENSION))
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext == extension)
}

/// Index of an agent inside its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(usize);

/// Index of a family inside its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyId(usize);

/// One versioned game-playing program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Family name.
    pub name: String,
    /// Version number, 0 for the unversioned first agent of the family.
    pub version: u32,
    /// Free-text description taken from the file name, possibly empty.
    pub description: String,
    /// Canonical artifact file name (the source form when one exists).
    pub source_file: String,
    family: FamilyId,
}

impl Agent {
    /// Identifier the game executable knows this agent by: `Name` for version 0, `Name_Version`
    /// otherwise.
    pub fn player_name(&self) -> String {
        if self.version == 0 {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.version)
        }
    }

    /// Descriptor selecting exactly this agent.
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::exact(&self.name, self.version)
    }

    /// Whether the canonical artifact is an editable source file.
    pub fn has_source(&self) -> bool {
        has_extension(&self.source_file, SOURCE_EXTENSION)
    }

    /// Family this agent belongs to.
    pub fn family_id(&self) -> FamilyId {
        self.family
    }
}

impl Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Every known version of one agent name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    name: String,
    members: Vec<AgentId>,
    last: Option<(AgentId, u32)>,
}

impl Family {
    /// Creates an empty family.
    pub fn new(name: &str) -> Family {
        Family {
            name: name.to_owned(),
            members: vec![],
            last: None,
        }
    }

    /// Adds a member, keeping track of the highest version seen so far.
    pub fn add(&mut self, id: AgentId, version: u32) {
        self.members.push(id);
        match self.last {
            Some((_, last)) if last >= version => {}
            _ => self.last = Some((id, version)),
        }
    }

    /// Family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in discovery order.
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// Highest version among the members (0 for an empty family).
    pub fn last_version(&self) -> u32 {
        self.last.map_or(0, |(_, version)| version)
    }

    /// Member holding the highest version.
    pub fn last_agent(&self) -> Option<AgentId> {
        self.last.map(|(id, _)| id)
    }
}

/// The universe of known agents, grouped into families.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    agents: Vec<Agent>,
    families: Vec<Family>,
    family_by_name: HashMap<String, FamilyId>,
    by_identity: HashMap<(String, u32), AgentId>,
}

impl Registry {
    /// Builds the registry from a list of file names. Names not following the artifact
    /// convention are skipped.
    ///
    /// When the same `(name, version)` shows up both as an object and as a source, the source
    /// file name is kept.
    pub fn from_file_names<I, S>(file_names: I) -> Registry
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Registry::default();
        for file_name in file_names {
            registry.insert_file(file_name.as_ref());
        }
        registry
    }

    /// Builds the registry from the entries of `dir`.
    #[instrument]
    pub fn scan(dir: &Path) -> Result<Registry> {
        let mut file_names = vec![];
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Ok(name) = entry.file_name().into_string() {
                file_names.push(name);
            }
        }
        let registry = Registry::from_file_names(file_names);
        info!(agents = registry.agents.len(), families = registry.families.len());
        Ok(registry)
    }

    fn insert_file(&mut self, file_name: &str) {
        if !is_ai_file(file_name) {
            return;
        }

        let stem = file_name.split('.').next().unwrap_or_default();
        let mut fields = stem[AI_PREFIX.len()..].splitn(3, '_');
        let name = fields.next().unwrap_or_default();
        if name.is_empty() {
            trace!("skipping nameless artifact {file_name}");
            return;
        }
        let version = fields.next().map_or(0, |v| v.parse().unwrap_or(0));
        let description = fields.next().unwrap_or_default();

        let identity = (name.to_owned(), version);
        if let Some(&AgentId(existing)) = self.by_identity.get(&identity) {
            if has_extension(file_name, SOURCE_EXTENSION) {
                self.agents[existing].source_file = file_name.to_owned();
            }
            return;
        }

        let family = match self.family_by_name.get(name) {
            Some(&family) => family,
            None => {
                let family = FamilyId(self.families.len());
                self.families.push(Family::new(name));
                self.family_by_name.insert(name.to_owned(), family);
                family
            }
        };

        let id = AgentId(self.agents.len());
        self.agents.push(Agent {
            name: name.to_owned(),
            version,
            description: description.to_owned(),
            source_file: file_name.to_owned(),
            family,
        });
        self.families[family.0].add(id, version);
        self.by_identity.insert(identity, id);
        trace!("found agent {name}:{version} in {file_name}");
    }

    /// Agents in discovery order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent by id.
    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.0]
    }

    /// Family of `agent`.
    pub fn family(&self, agent: &Agent) -> &Family {
        &self.families[agent.family.0]
    }

    /// Family called `name`, if any agent carries that name.
    pub fn family_named(&self, name: &str) -> Option<&Family> {
        self.family_by_name.get(name).map(|id| &self.families[id.0])
    }

    /// True if `agent` holds the highest version of its family.
    pub fn is_last_version(&self, agent: &Agent) -> bool {
        self.family(agent).last_version() == agent.version
    }

    /// Descriptor test, resolving relative bounds against the agent's family as it is now.
    pub fn matches(&self, agent: &Agent, descriptor: &Descriptor) -> bool {
        descriptor.matches(&agent.name, agent.version, self.family(agent).last_version())
    }

    /// True if any of `descriptors` selects `agent`.
    pub fn matches_any(&self, agent: &Agent, descriptors: &[Descriptor]) -> bool {
        descriptors.iter().any(|d| self.matches(agent, d))
    }

    /// Agents selected by any of `descriptors` (every agent when there are none), sorted by
    /// name ascending then version descending.
    pub fn list(&self, descriptors: &[Descriptor]) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self
            .agents
            .iter()
            .filter(|agent| descriptors.is_empty() || self.matches_any(agent, descriptors))
            .collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name).then(b.version.cmp(&a.version)));
        agents
    }

    /// First agent in presentation order matching any of `descriptors`.
    pub fn lookup_first(&self, descriptors: &[Descriptor]) -> Result<&Agent> {
        self.list(descriptors)
            .into_iter()
            .next()
            .ok_or_else(|| DojoError::NotFound {
                descriptor: descriptors
                    .iter()
                    .map(|d| d.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn albert_registry() -> Registry {
        Registry::from_file_names([
            "AIAlbert.cc",
            "AIAlbert_1.cc",
            "AIAlbert_2_avoid_enemy.cc",
            "AIAlbert_3.cc",
            "AIDemo.cc",
            "AIDummy.o",
        ])
    }

    fn find<'a>(registry: &'a Registry, name: &str, version: u32) -> &'a Agent {
        registry
            .agents()
            .iter()
            .find(|a| a.name == name && a.version == version)
            .unwrap()
    }

    #[test]
    fn recognizes_artifacts() {
        assert!(is_ai_file("AIDemo.cc"));
        assert!(is_ai_file("AIDemo_3_fast.o"));
        assert!(!is_ai_file("board.cc"));
        assert!(!is_ai_file("AIDemo.h"));
        assert!(!is_ai_file("api.pdf"));
    }

    #[test]
    fn builds_agents_from_file_names() {
        let registry = Registry::from_file_names([
            "api.pdf",
            "AICancellara.cc",
            "board.cc",
            "AIDemo_1.cc",
            "AICancellara_1.cc",
            "AIAlbert_3_description.cc",
        ]);

        let found: Vec<_> = registry
            .agents()
            .iter()
            .map(|a| {
                (
                    a.name.as_str(),
                    a.version,
                    a.description.as_str(),
                    a.source_file.as_str(),
                    registry.family(a).name(),
                    registry.family(a).last_version(),
                )
            })
            .collect();

        assert_eq!(
            found,
            vec![
                ("Cancellara", 0, "", "AICancellara.cc", "Cancellara", 1),
                ("Demo", 1, "", "AIDemo_1.cc", "Demo", 1),
                ("Cancellara", 1, "", "AICancellara_1.cc", "Cancellara", 1),
                ("Albert", 3, "description", "AIAlbert_3_description.cc", "Albert", 3),
            ]
        );
    }

    #[test]
    fn source_form_wins_on_duplicates() {
        for names in [["AIFoo.cc", "AIFoo.o"], ["AIFoo.o", "AIFoo.cc"]] {
            let registry = Registry::from_file_names(names);
            assert_eq!(registry.agents().len(), 1);
            let foo = &registry.agents()[0];
            assert_eq!((foo.name.as_str(), foo.version), ("Foo", 0));
            assert_eq!(foo.source_file, "AIFoo.cc");
            assert!(foo.has_source());
        }
    }

    #[test]
    fn description_keeps_underscores() {
        let registry = albert_registry();
        assert_eq!(find(&registry, "Albert", 2).description, "avoid_enemy");
    }

    #[test]
    fn family_tracks_last_version() {
        let mut family = Family::new("Albert");
        let mut max = 0;
        for (i, version) in [2, 0, 5, 3, 5, 1].into_iter().enumerate() {
            family.add(AgentId(i), version);
            max = max.max(version);
            assert_eq!(family.last_version(), max);
        }
        assert_eq!(family.last_agent(), Some(AgentId(2)));
        assert_eq!(family.members().len(), 6);
    }

    #[test]
    fn matches_descriptors() {
        let registry = albert_registry();
        let albert0 = find(&registry, "Albert", 0);
        let albert2 = find(&registry, "Albert", 2);
        let albert3 = find(&registry, "Albert", 3);
        let demo = find(&registry, "Demo", 0);

        let cases = [
            (albert0, "Albert", false),
            (albert0, "Albert:0", true),
            (albert0, "Albert:-4", true),
            (albert0, "Albert:", true),
            (albert0, "Albert:0..3", true),
            (albert0, "Albert:1..3", false),
            (albert0, "Albert:0..1", true),
            (albert0, "Albert:0..", true),
            (albert0, "Albert:..", true),
            (albert3, "Albert", true),
            (albert3, "Albert:-1", true),
            (albert2, "Albert", false),
            (albert2, "Albert:-2", true),
            (albert2, "Albert:..-2", true),
            (demo, "Demo:", true),
            (demo, "Demo", true),
            (demo, "Albert:", false),
        ];

        for (agent, descriptor, expected) in cases {
            assert_eq!(
                registry.matches_any(agent, &[Descriptor::parse(descriptor)]),
                expected,
                "{agent} against {descriptor}"
            );
        }
    }

    #[test]
    fn relative_bounds_resolve_per_family() {
        let registry = Registry::from_file_names(["AIA.cc", "AIA_1.cc", "AIB.cc", "AIB_1.cc", "AIB_2.cc"]);
        let previous = [Descriptor::parse("A:-2"), Descriptor::parse("B:-2")];
        let selected: Vec<_> = registry.list(&previous).iter().map(|a| a.to_string()).collect();
        assert_eq!(selected, vec!["A:0", "B:1"]);
    }

    #[test]
    fn lists_in_presentation_order() {
        let registry = albert_registry();
        let listed: Vec<_> = registry.list(&[]).iter().map(|a| a.to_string()).collect();
        assert_eq!(
            listed,
            vec!["Albert:3", "Albert:2", "Albert:1", "Albert:0", "Demo:0", "Dummy:0"]
        );
    }

    #[test]
    fn lookup_first_picks_latest() {
        let registry = albert_registry();
        let agent = registry.lookup_first(&[Descriptor::parse("Albert:")]).unwrap();
        assert_eq!(agent.player_name(), "Albert_3");
        assert!(registry.is_last_version(agent));
    }

    #[test]
    fn lookup_first_reports_missing_name() {
        let registry = albert_registry();
        let err = registry.lookup_first(&[Descriptor::parse("Ghost:2")]).unwrap_err();
        assert!(matches!(err, DojoError::NotFound { ref descriptor } if descriptor == "Ghost"));
    }

    #[test]
    fn player_names() {
        let registry = albert_registry();
        assert_eq!(find(&registry, "Albert", 0).player_name(), "Albert");
        assert_eq!(find(&registry, "Albert", 2).player_name(), "Albert_2");
        assert!(!find(&registry, "Dummy", 0).has_source());
    }
}
