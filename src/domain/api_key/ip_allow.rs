//! Per-key IP allow-list
//!
//! Entries are either a single IP literal or a CIDR block, both IPv4 and
//! IPv6. An empty allow-list means "allow any IP".

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing an allow-list rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpRuleParseError {
    #[error("IP rule cannot be empty")]
    Empty,

    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    #[error("'{0}' is not a valid CIDR prefix length")]
    InvalidPrefixLength(String),

    #[error("prefix length {len} is out of range for {family}")]
    PrefixLengthOutOfRange { len: u8, family: &'static str },
}

/// A single allow-list rule: IP literal or CIDR block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpRule {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix_len: u8 },
}

impl IpRule {
    /// Whether the rule covers the given address
    ///
    /// Address families never match across each other.
    pub fn matches(&self, ip: IpAddr) -> bool {
        match *self {
            Self::Exact(rule_ip) => rule_ip == ip,
            Self::Cidr {
                network,
                prefix_len,
            } => match (network, ip) {
                (IpAddr::V4(net), IpAddr::V4(addr)) => {
                    prefix_len == 0
                        || u32::from(net) >> (32 - prefix_len) == u32::from(addr) >> (32 - prefix_len)
                }
                (IpAddr::V6(net), IpAddr::V6(addr)) => {
                    prefix_len == 0
                        || u128::from(net) >> (128 - prefix_len)
                            == u128::from(addr) >> (128 - prefix_len)
                }
                _ => false,
            },
        }
    }
}

impl FromStr for IpRule {
    type Err = IpRuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(IpRuleParseError::Empty);
        }

        let Some((addr_part, len_part)) = s.split_once('/') else {
            let ip = s
                .parse::<IpAddr>()
                .map_err(|_| IpRuleParseError::InvalidAddress(s.to_string()))?;
            return Ok(Self::Exact(ip));
        };

        let network = addr_part
            .parse::<IpAddr>()
            .map_err(|_| IpRuleParseError::InvalidAddress(addr_part.to_string()))?;

        let prefix_len = len_part
            .parse::<u8>()
            .map_err(|_| IpRuleParseError::InvalidPrefixLength(len_part.to_string()))?;

        let max_len = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        if prefix_len > max_len {
            return Err(IpRuleParseError::PrefixLengthOutOfRange {
                len: prefix_len,
                family: if max_len == 32 { "IPv4" } else { "IPv6" },
            });
        }

        Ok(Self::Cidr {
            network,
            prefix_len,
        })
    }
}

impl std::fmt::Display for IpRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(ip) => write!(f, "{}", ip),
            Self::Cidr {
                network,
                prefix_len,
            } => write!(f, "{}/{}", network, prefix_len),
        }
    }
}

impl TryFrom<String> for IpRule {
    type Error = IpRuleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpRule> for String {
    fn from(rule: IpRule) -> Self {
        rule.to_string()
    }
}

/// An allow-list entry: rule plus an optional operator note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllowEntry {
    pub rule: IpRule,
    pub description: Option<String>,
}

impl IpAllowEntry {
    pub fn new(rule: IpRule) -> Self {
        Self {
            rule,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn matches(&self, ip: IpAddr) -> bool {
        self.rule.matches(ip)
    }
}

/// Whether an allow-list admits the address; an empty list admits any IP
pub fn ip_allowed(entries: &[IpAllowEntry], ip: IpAddr) -> bool {
    entries.is_empty() || entries.iter().any(|entry| entry.matches(ip))
}
