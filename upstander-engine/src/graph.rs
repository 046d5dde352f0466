//! Scenario graph model and load-time validation.
//!
//! A scenario is described as plain data ([`ScenarioDescription`]) and turned
//! into an immutable [`ScenarioGraph`] by [`ScenarioGraph::load`]. Loading
//! validates the whole document up front so traversal never has to handle a
//! malformed graph lazily.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

/// Non-negative skill increments granted by a choice.
pub type SkillDeltas = BTreeMap<String, u32>;

/// Inline storage for a node's options; most nodes offer four or fewer.
pub type ChoiceList = SmallVec<[Choice; 4]>;

/// Semantic stage label attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Setup,
    Decision,
    Followup,
    Resolution,
    Reflection,
}

impl NodeKind {
    /// Decision and follow-up stages must always offer a way forward.
    #[must_use]
    pub const fn requires_options(self) -> bool {
        matches!(self, Self::Decision | Self::Followup)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Decision => "decision",
            Self::Followup => "followup",
            Self::Resolution => "resolution",
            Self::Reflection => "reflection",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An option offered at a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
    pub target: String,
    #[serde(default)]
    pub skills: SkillDeltas,
}

/// A validated node of the scenario graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub options: ChoiceList,
}

impl Node {
    /// Traversal stops at any node without options.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.options.is_empty()
    }

    /// Look up one of this node's options by id.
    #[must_use]
    pub fn option(&self, id: &str) -> Option<&Choice> {
        self.options.iter().find(|choice| choice.id == id)
    }

    /// Option ids in declared order.
    pub fn option_ids(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|choice| choice.id.as_str())
    }
}

/// Raw scenario document, as authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDescription {
    #[serde(default)]
    pub title: String,
    pub entries: Vec<String>,
    pub nodes: Vec<NodeDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDescription {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub options: Vec<ChoiceDescription>,
}

/// Authored option. Deltas are signed here so that a negative value can be
/// reported against the node and option that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceDescription {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub target: String,
    #[serde(default)]
    pub skills: BTreeMap<String, i64>,
}

impl ScenarioDescription {
    /// Parse a scenario document from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the scenario schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Errors raised while loading or querying a scenario graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("scenario document could not be parsed: {0}")]
    Parse(String),
    #[error("scenario declares no entry node")]
    NoEntry,
    #[error("entry `{entry}` does not name a node")]
    UnknownEntry { entry: String },
    #[error("node id `{node}` is declared more than once")]
    DuplicateNode { node: String },
    #[error("node `{node}` declares option `{option}` more than once")]
    DuplicateOption { node: String, option: String },
    #[error("option `{option}` on node `{node}` targets missing node `{target}`")]
    DanglingTarget {
        node: String,
        option: String,
        target: String,
    },
    #[error("{kind} node `{node}` has no options")]
    MissingOptions { node: String, kind: NodeKind },
    #[error("terminal node `{node}` declares {count} option(s)")]
    TerminalWithOptions { node: String, count: usize },
    #[error("option `{option}` on node `{node}` declares negative delta {delta} for skill `{skill}`")]
    NegativeDelta {
        node: String,
        option: String,
        skill: String,
        delta: i64,
    },
    #[error("option `{option}` on node `{node}` declares delta {delta} for skill `{skill}`, above the supported maximum")]
    DeltaOutOfRange {
        node: String,
        option: String,
        skill: String,
        delta: i64,
    },
    #[error("option `{option}` on node `{node}` names an empty skill")]
    EmptySkill { node: String, option: String },
    #[error("option `{option}` on node `{node}` closes a cycle")]
    Cycle { node: String, option: String },
    #[error("node `{node}` is unreachable from every entry")]
    Unreachable { node: String },
    #[error("node `{node}` not found")]
    NodeNotFound { node: String },
}

/// Immutable, validated narrative graph shared by every traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioGraph {
    title: String,
    entries: Vec<String>,
    order: Vec<String>,
    nodes: HashMap<String, Node>,
}

impl ScenarioGraph {
    /// Validate a description and build the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] found; every variant names the node
    /// (and option, where one is involved) responsible.
    pub fn load(description: ScenarioDescription) -> Result<Self, GraphError> {
        let ScenarioDescription {
            title,
            entries,
            nodes: raw_nodes,
        } = description;

        if entries.is_empty() {
            return Err(GraphError::NoEntry);
        }

        let declared: HashSet<&str> = raw_nodes.iter().map(|node| node.id.as_str()).collect();
        let mut order = Vec::with_capacity(raw_nodes.len());
        let mut nodes = HashMap::with_capacity(raw_nodes.len());

        for raw in &raw_nodes {
            if nodes.contains_key(&raw.id) {
                return Err(GraphError::DuplicateNode {
                    node: raw.id.clone(),
                });
            }
            let node = build_node(raw, &declared)?;
            order.push(node.id.clone());
            nodes.insert(node.id.clone(), node);
        }

        for entry in &entries {
            if !nodes.contains_key(entry) {
                return Err(GraphError::UnknownEntry {
                    entry: entry.clone(),
                });
            }
        }

        let graph = Self {
            title,
            entries,
            order,
            nodes,
        };
        graph.check_acyclic()?;
        graph.check_reachable()?;
        log::debug!(
            "loaded scenario `{}` with {} nodes and {} entries",
            graph.title,
            graph.len(),
            graph.entries.len()
        );
        Ok(graph)
    }

    /// Parse and validate a scenario document in one step.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Parse`] for malformed JSON and any validation
    /// error raised by [`ScenarioGraph::load`].
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let description =
            ScenarioDescription::from_json(json).map_err(|err| GraphError::Parse(err.to_string()))?;
        Self::load(description)
    }

    /// Look up a node by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] when the id is not part of the graph.
    pub fn get_node(&self, id: &str) -> Result<&Node, GraphError> {
        self.nodes.get(id).ok_or_else(|| GraphError::NodeNotFound {
            node: id.to_string(),
        })
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The default entry (first declared).
    #[must_use]
    pub fn entry(&self) -> &str {
        // `load` rejects descriptions without entries.
        self.entries.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Nodes in declared order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every skill name any option can grant.
    #[must_use]
    pub fn skills(&self) -> BTreeSet<&str> {
        self.nodes()
            .flat_map(|node| node.options.iter())
            .flat_map(|choice| choice.skills.keys().map(String::as_str))
            .collect()
    }

    fn check_acyclic(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.len());
        for root in &self.order {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            let mut stack: Vec<(&Node, usize)> = vec![(&self.nodes[root], 0)];
            marks.insert(root.as_str(), Mark::Open);

            while let Some((node, next)) = stack.last_mut() {
                let node: &Node = node;
                let Some(choice) = node.options.get(*next) else {
                    marks.insert(node.id.as_str(), Mark::Done);
                    stack.pop();
                    continue;
                };
                *next += 1;
                match marks.get(choice.target.as_str()) {
                    Some(Mark::Open) => {
                        return Err(GraphError::Cycle {
                            node: node.id.clone(),
                            option: choice.id.clone(),
                        });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        let target = &self.nodes[&choice.target];
                        marks.insert(target.id.as_str(), Mark::Open);
                        stack.push((target, 0));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_reachable(&self) -> Result<(), GraphError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.len());
        let mut queue: VecDeque<&str> = self.entries.iter().map(String::as_str).collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for choice in &self.nodes[id].options {
                queue.push_back(choice.target.as_str());
            }
        }

        match self.order.iter().find(|id| !seen.contains(id.as_str())) {
            Some(node) => Err(GraphError::Unreachable { node: node.clone() }),
            None => Ok(()),
        }
    }
}

fn build_node(raw: &NodeDescription, declared: &HashSet<&str>) -> Result<Node, GraphError> {
    let terminal = raw.terminal || raw.kind == NodeKind::Reflection;
    if terminal && !raw.options.is_empty() {
        return Err(GraphError::TerminalWithOptions {
            node: raw.id.clone(),
            count: raw.options.len(),
        });
    }
    if raw.kind.requires_options() && raw.options.is_empty() {
        return Err(GraphError::MissingOptions {
            node: raw.id.clone(),
            kind: raw.kind,
        });
    }

    let mut options = ChoiceList::new();
    for option in &raw.options {
        if options.iter().any(|existing: &Choice| existing.id == option.id) {
            return Err(GraphError::DuplicateOption {
                node: raw.id.clone(),
                option: option.id.clone(),
            });
        }
        if !declared.contains(option.target.as_str()) {
            return Err(GraphError::DanglingTarget {
                node: raw.id.clone(),
                option: option.id.clone(),
                target: option.target.clone(),
            });
        }
        options.push(Choice {
            id: option.id.clone(),
            label: option.label.clone(),
            target: option.target.clone(),
            skills: convert_deltas(&raw.id, option)?,
        });
    }

    Ok(Node {
        id: raw.id.clone(),
        kind: raw.kind,
        title: raw.title.clone(),
        terminal,
        options,
    })
}

fn convert_deltas(node: &str, option: &ChoiceDescription) -> Result<SkillDeltas, GraphError> {
    let mut deltas = SkillDeltas::new();
    for (skill, &delta) in &option.skills {
        if skill.trim().is_empty() {
            return Err(GraphError::EmptySkill {
                node: node.to_string(),
                option: option.id.clone(),
            });
        }
        if delta < 0 {
            return Err(GraphError::NegativeDelta {
                node: node.to_string(),
                option: option.id.clone(),
                skill: skill.clone(),
                delta,
            });
        }
        let value = u32::try_from(delta).map_err(|_| GraphError::DeltaOutOfRange {
            node: node.to_string(),
            option: option.id.clone(),
            skill: skill.clone(),
            delta,
        })?;
        deltas.insert(skill.clone(), value);
    }
    Ok(deltas)
}
