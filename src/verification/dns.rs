// src/verification/dns.rs

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::VerificationReport;
use crate::{
    constants::{DNS_IPV4_TARGETS, DNS_IPV6_TARGETS, IPV6_POLICY_PATH, IPV6_POLICY_VALUE},
    errors::ParseError,
    language::{Language, Message},
    utils::registry::PolicyStore,
};

/// Resolvers configured on one active adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdapterDns {
    #[serde(rename = "Name", deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "IPv4", deserialize_with = "lenient_list")]
    pub ipv4: Vec<String>,
    #[serde(rename = "IPv6", deserialize_with = "lenient_list")]
    pub ipv6: Vec<String>,
}

impl AdapterDns {
    pub fn has_target_ipv4(&self) -> bool {
        self.ipv4
            .iter()
            .any(|address| DNS_IPV4_TARGETS.contains(&address.as_str()))
    }

    pub fn has_target_ipv6(&self) -> bool {
        self.ipv6.iter().any(|address| {
            DNS_IPV6_TARGETS
                .iter()
                .any(|target| address.eq_ignore_ascii_case(target))
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<Option<String>>),
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// `ConvertTo-Json` emits `null`, a bare string or an array depending on how many
// addresses the adapter has.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(address)) => vec![address],
        Some(OneOrMany::Many(addresses)) => addresses.into_iter().flatten().collect(),
    })
}

/// Parses the adapter records printed by the DNS state query.
///
/// Blank output and `null` mean "no active adapters". A lone object is treated as
/// a one-element list.
pub fn parse_adapters(text: &str) -> Result<Vec<AdapterDns>, ParseError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(text)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| serde_json::from_value(item).map_err(ParseError::from))
            .collect(),
        record @ Value::Object(_) => Ok(vec![serde_json::from_value(record)?]),
        _ => Err(ParseError::UnexpectedShape("a list of adapter records")),
    }
}

/// Parses the state query output and checks it against the target resolvers.
/// Never fails: malformed output yields an unconfirmed report with a diagnostic.
pub fn verify_dns_output(
    text: &str,
    language: Language,
    policy: &dyn PolicyStore,
) -> VerificationReport {
    match parse_adapters(text) {
        Ok(adapters) => evaluate(&adapters, language, policy),
        Err(e) => {
            tracing::warn!("Could not parse DNS state: {}", e);
            VerificationReport::new(
                false,
                vec![
                    Message::DnsParseFailed.text(language).to_string(),
                    format!("({})", e),
                ],
            )
        }
    }
}

/// Any adapter carrying any target resolver, IPv4 or IPv6, counts as success.
pub fn evaluate(
    adapters: &[AdapterDns],
    language: Language,
    policy: &dyn PolicyStore,
) -> VerificationReport {
    let mut detail = vec![Message::DnsReportHeader.text(language).to_string()];
    for adapter in adapters {
        detail.push(format!(
            "• {} [IPv4] → {}",
            adapter.name,
            adapter.ipv4.join(", ")
        ));
        detail.push(format!("  [IPv6] → {}", adapter.ipv6.join(", ")));
    }

    let succeeded = adapters
        .iter()
        .any(|adapter| adapter.has_target_ipv4() || adapter.has_target_ipv6());

    let any_ipv6_configured = adapters.iter().any(|adapter| !adapter.ipv6.is_empty());
    if !any_ipv6_configured && ipv6_disabled_by_policy(policy) {
        detail.push(Message::Ipv6PolicyCaveat.text(language).to_string());
    }

    VerificationReport::new(succeeded, detail)
}

fn ipv6_disabled_by_policy(policy: &dyn PolicyStore) -> bool {
    match policy.read_dword(IPV6_POLICY_PATH, IPV6_POLICY_VALUE) {
        Ok(Some(value)) => value != 0,
        Ok(None) => false,
        Err(e) => {
            tracing::debug!("Could not read IPv6 policy: {:?}", e);
            false
        }
    }
}
