use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type NodeId = u64;

/// Separator between the fields of a serialized node line.
pub const FIELD_SEPARATOR: char = '|';

/// Separator between key and value of an `extra_info` entry.
pub const EXTRA_INFO_SEPARATOR: char = '=';

pub const DEFAULT_PORT: u16 = 22;

/// Number of top-level fields of a node line. The last one holds the
/// flattened `extra_info` entries.
const NUM_OF_FIELDS: usize = 6;

/// A single allocated machine: its identity and how to connect to it.
///
/// Nodes are immutable once constructed. The text form is one line of
/// `node_id|hostname|ip_local|ip_public|port|key1=val1|key2=val2|...`.
/// Delimiters are not escaped, so string fields must not contain `|`, `=`
/// or a newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    node_id: NodeId,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    ip_local: String,
    #[serde(default)]
    ip_public: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    extra_info: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Node {
    pub fn new(node_id: NodeId, hostname: impl Into<String>) -> Self {
        Node {
            node_id,
            hostname: hostname.into(),
            ip_local: String::new(),
            ip_public: String::new(),
            port: DEFAULT_PORT,
            extra_info: BTreeMap::new(),
        }
    }

    pub fn with_all(
        node_id: NodeId,
        hostname: impl Into<String>,
        ip_local: impl Into<String>,
        ip_public: impl Into<String>,
        port: u16,
        extra_info: BTreeMap<String, String>,
    ) -> Self {
        Node { node_id, hostname: hostname.into(), ip_local: ip_local.into(), ip_public: ip_public.into(), port, extra_info }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ip_local(&self) -> &str {
        &self.ip_local
    }

    pub fn ip_public(&self) -> &str {
        &self.ip_public
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn extra_info(&self) -> &BTreeMap<String, String> {
        &self.extra_info
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{id}{sep}{host}{sep}{local}{sep}{public}{sep}{port}{sep}",
            id = self.node_id,
            host = self.hostname,
            local = self.ip_local,
            public = self.ip_public,
            port = self.port,
            sep = FIELD_SEPARATOR
        )?;

        // The sixth field is always present, empty when there is no extra info.
        let mut first = true;
        for (key, value) in &self.extra_info {
            if !first {
                write!(f, "{}", FIELD_SEPARATOR)?;
            }
            write!(f, "{}{}{}", key, EXTRA_INFO_SEPARATOR, value)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.splitn(NUM_OF_FIELDS, FIELD_SEPARATOR).collect();

        if fields.len() < NUM_OF_FIELDS {
            return Err(Error::ParseError(format!(
                "Expected {} '{}'-separated fields in node line, found {}: '{}'",
                NUM_OF_FIELDS,
                FIELD_SEPARATOR,
                fields.len(),
                line
            )));
        }

        let node_id = fields[0]
            .parse::<NodeId>()
            .map_err(|e| Error::ParseError(format!("Invalid node id '{}' in node line '{}': {}", fields[0], line, e)))?;
        let port = fields[4].parse::<u16>().map_err(|e| Error::ParseError(format!("Invalid port '{}' in node line '{}': {}", fields[4], line, e)))?;

        let mut extra_info = BTreeMap::new();
        if !fields[5].is_empty() {
            for segment in fields[5].split(FIELD_SEPARATOR) {
                let mut parts = segment.split(EXTRA_INFO_SEPARATOR);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => {
                        extra_info.insert(key.to_string(), value.to_string());
                    }
                    _ => {
                        return Err(Error::ParseError(format!(
                            "Extra info segment '{}' of node {} must be a single 'key{}value' pair",
                            segment, node_id, EXTRA_INFO_SEPARATOR
                        )));
                    }
                }
            }
        }

        Ok(Node::with_all(node_id, fields[1], fields[2], fields[3], port, extra_info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_node() -> Node {
        let mut extra_info = BTreeMap::new();
        extra_info.insert("rack".to_string(), "r12".to_string());
        extra_info.insert("gpu".to_string(), "a100".to_string());
        Node::with_all(7, "node007", "10.0.0.7", "192.168.1.7", 2222, extra_info)
    }

    #[test]
    fn test_display_orders_extra_info_by_key() {
        assert_eq!(full_node().to_string(), "7|node007|10.0.0.7|192.168.1.7|2222|gpu=a100|rack=r12");
    }

    #[test]
    fn test_display_keeps_empty_extra_info_field() {
        assert_eq!(Node::new(1, "h1").to_string(), "1|h1|||22|");
    }

    #[test]
    fn test_parse_inverts_display() {
        let node = full_node();
        assert_eq!(node.to_string().parse::<Node>().unwrap(), node);

        let bare = Node::new(3, "");
        assert_eq!(bare.to_string().parse::<Node>().unwrap(), bare);
    }

    #[test]
    fn test_parse_inverts_display_for_generated_nodes() {
        let ids = [0, 1, 42, NodeId::MAX];
        let ports = [0, 22, 8080, u16::MAX];
        let hostnames = ["", "node001", "gpu-node.cluster.local"];
        let extra_infos: Vec<BTreeMap<String, String>> = vec![
            BTreeMap::new(),
            BTreeMap::from([(String::new(), String::new())]),
            BTreeMap::from([(String::new(), "v".to_string()), ("k".to_string(), String::new())]),
            BTreeMap::from([("gpu".to_string(), "a100".to_string()), ("rack".to_string(), "r12".to_string()), ("zone".to_string(), "eu-west".to_string())]),
        ];

        let mut checked = 0;
        for &node_id in &ids {
            for &port in &ports {
                for (i, hostname) in hostnames.iter().enumerate() {
                    for extra_info in &extra_infos {
                        let ip_local = if i % 2 == 0 { "" } else { "10.0.0.1" };
                        let node = Node::with_all(node_id, *hostname, ip_local, "192.168.1.1", port, extra_info.clone());
                        let line = node.to_string();
                        assert_eq!(line.parse::<Node>().unwrap(), node, "line '{}'", line);
                        checked += 1;
                    }
                }
            }
        }
        assert_eq!(checked, ids.len() * ports.len() * hostnames.len() * extra_infos.len());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let err = "1|h1|10.0.0.1|1.2.3.4|22".parse::<Node>().unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_parse_rejects_bad_extra_info() {
        assert!(matches!("1|h1|||22|novalue".parse::<Node>(), Err(Error::ParseError(_))));
        assert!(matches!("1|h1|||22|a=b=c".parse::<Node>(), Err(Error::ParseError(_))));
        assert!(matches!("1|h1|||22|a=b|".parse::<Node>(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_rejects_non_numeric_id_and_port() {
        assert!(matches!("x|h1|||22|".parse::<Node>(), Err(Error::ParseError(_))));
        assert!(matches!("1|h1|||ssh|".parse::<Node>(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_serde_defaults() {
        let node: Node = serde_json::from_str(r#"{"nodeId": 4, "hostname": "h4"}"#).unwrap();
        assert_eq!(node, Node::new(4, "h4"));
    }
}
