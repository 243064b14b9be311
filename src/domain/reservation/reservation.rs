use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::reservation::node::{Node, NodeId};
use crate::error::{Error, Result};

/// A completed, immutable set of allocated nodes.
///
/// Nodes are keyed by their id. When the input contains the same id more than
/// once the last node wins, but it keeps the position of the first
/// occurrence. Iteration and serialization follow that order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reservation {
    nodes: Vec<Node>,
    /// Index lookup from `NodeId` into `nodes`.
    id_index: HashMap<NodeId, usize>,
}

impl Reservation {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut reservation = Reservation::default();

        for node in nodes {
            match reservation.id_index.get(&node.node_id()) {
                Some(&position) => {
                    log::debug!("Node id {} appears more than once in reservation input, keeping the last one.", node.node_id());
                    reservation.nodes[position] = node;
                }
                None => {
                    reservation.id_index.insert(node.node_id(), reservation.nodes.len());
                    reservation.nodes.push(node);
                }
            }
        }

        reservation
    }

    /// Search for and return a node.
    ///
    /// Exactly one selector is expected. If `node_id` is set the lookup is
    /// keyed and O(1); otherwise `hostname` is compared against every node,
    /// O(n). If both are set, `node_id` takes precedence.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` if neither selector is set.
    /// - `Error::NotFound` if no node matches.
    pub fn get_node(&self, node_id: Option<NodeId>, hostname: Option<&str>) -> Result<&Node> {
        match (node_id, hostname) {
            (Some(node_id), _) => self.get_node_by_id(node_id),
            (None, Some(hostname)) if !hostname.is_empty() => self.get_node_by_hostname(hostname),
            _ => Err(Error::InvalidArgument("To get a node, please either set node_id or specify a hostname.".to_string())),
        }
    }

    pub fn get_node_by_id(&self, node_id: NodeId) -> Result<&Node> {
        self.id_index
            .get(&node_id)
            .map(|&position| &self.nodes[position])
            .ok_or_else(|| Error::NotFound(format!("Could not find node id {} in reservation. Available node ids: {:?}", node_id, self.node_ids())))
    }

    pub fn get_node_by_hostname(&self, hostname: &str) -> Result<&Node> {
        self.nodes.iter().find(|node| node.hostname() == hostname).ok_or_else(|| {
            let hostnames: Vec<&str> = self.nodes.iter().map(|node| node.hostname()).collect();
            Error::NotFound(format!("Could not find hostname {} in reservation. Available hostnames: {}", hostname, hostnames.join(", ")))
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.node_id()).collect()
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl FromStr for Reservation {
    type Err = Error;

    fn from_str(block: &str) -> Result<Self> {
        // Trailing blank lines carry no nodes; blank lines elsewhere are errors.
        let nodes = block
            .trim_end_matches(['\n', '\r'])
            .lines()
            .enumerate()
            .map(|(i, line)| {
                line.parse::<Node>().map_err(|e| match e {
                    Error::ParseError(msg) => Error::ParseError(format!("line {}: {}", i + 1, msg)),
                    other => other,
                })
            })
            .collect::<Result<Vec<Node>>>()?;

        Ok(Reservation::new(nodes))
    }
}

impl Serialize for Reservation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Reservation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let nodes = Vec::<Node>::deserialize(deserializer)?;
        Ok(Reservation::new(nodes))
    }
}

impl FromIterator<Node> for Reservation {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Reservation::new(iter)
    }
}
