// src/tweaks/dns.rs

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use strum_macros::{Display, EnumIter};

use super::{execute_mutation, TweakContext, TweakId, TweakMethod};
use crate::{
    constants::{DNS_IPV4_PRIMARY, DNS_IPV4_SECONDARY, DNS_IPV6_PRIMARY, DNS_IPV6_SECONDARY},
    errors::{CommandError, ParseError, TweakError},
    language::{Language, Message},
    utils::powershell::ScopedTempFile,
    verification::{dns::verify_dns_output, VerificationReport},
};

/// One per-adapter mutation step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DnsStep {
    EnableIpv6Binding,
    Ipv4Primary,
    Ipv4Secondary,
    Ipv6Primary,
    Ipv6Secondary,
}

/// Outcome of one step on one adapter, as recorded by the mutation script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdapterAttempt {
    pub adapter: String,
    pub step: DnsStep,
    pub ok: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Points every adapter that is up at Cloudflare's malware-blocking resolvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudflareDns;

const STATE_QUERY: &str = r#"$ErrorActionPreference='SilentlyContinue'
$WarningPreference='SilentlyContinue'
$ProgressPreference='SilentlyContinue'

$up = Get-NetAdapter | Where-Object { $_.Status -eq 'Up' }
$result = foreach ($a in $up) {
  $v4 = (Get-DnsClientServerAddress -InterfaceIndex $a.IfIndex -AddressFamily IPv4).ServerAddresses
  $v6 = (Get-DnsClientServerAddress -InterfaceIndex $a.IfIndex -AddressFamily IPv6).ServerAddresses
  [pscustomobject]@{ Name = $a.Name; IPv4 = $v4; IPv6 = $v6 }
}
$result | ConvertTo-Json -Compress -Depth 4
"#;

/// Builds the mutation script. Every step is attempted on every adapter and its
/// outcome appended to `results_path` as JSON.
pub fn mutation_script(results_path: &Path) -> String {
    let results_path = results_path.display().to_string().replace('\'', "''");
    format!(
        r#"$ErrorActionPreference='Stop'
$WarningPreference='SilentlyContinue'
$ProgressPreference='SilentlyContinue'

$resultsPath = '{results_path}'
$attempts = New-Object System.Collections.Generic.List[object]

function Invoke-Step([string]$adapter, [string]$step, [scriptblock]$action) {{
  try {{
    $global:LASTEXITCODE = 0
    $out = & $action 2>&1 | Out-String
    if ($global:LASTEXITCODE -ne 0) {{ throw $out.Trim() }}
    $attempts.Add([pscustomobject]@{{ Adapter = $adapter; Step = $step; Ok = $true; Detail = $null }})
  }} catch {{
    $attempts.Add([pscustomobject]@{{ Adapter = $adapter; Step = $step; Ok = $false; Detail = "$_" }})
  }}
}}

try {{
  $ad = @(Get-NetAdapter | Where-Object {{ $_.Status -eq 'Up' }})
  foreach ($a in $ad) {{
    $alias = $a.InterfaceAlias

    Invoke-Step $alias '{enable_ipv6}' {{
      $b = Get-NetAdapterBinding -InterfaceDescription $a.InterfaceDescription -ComponentID ms_tcpip6 -ErrorAction SilentlyContinue
      if ($b -and -not $b.Enabled) {{
        Enable-NetAdapterBinding -InterfaceDescription $a.InterfaceDescription -ComponentID ms_tcpip6
      }}
    }}

    Invoke-Step $alias '{v4_primary}' {{ netsh interface ipv4 set dnsservers name="$alias" static {v4_primary_addr} primary }}
    Invoke-Step $alias '{v4_secondary}' {{ netsh interface ipv4 add dnsservers name="$alias" address={v4_secondary_addr} index=2 }}
    Invoke-Step $alias '{v6_primary}' {{ netsh interface ipv6 set dnsservers name="$alias" static {v6_primary_addr} primary }}
    Invoke-Step $alias '{v6_secondary}' {{ netsh interface ipv6 add dnsservers name="$alias" address={v6_secondary_addr} index=2 }}
  }}
}} finally {{
  ConvertTo-Json -InputObject @($attempts) -Depth 3 | Set-Content -LiteralPath $resultsPath -Encoding UTF8
}}
"#,
        results_path = results_path,
        enable_ipv6 = DnsStep::EnableIpv6Binding,
        v4_primary = DnsStep::Ipv4Primary,
        v4_secondary = DnsStep::Ipv4Secondary,
        v6_primary = DnsStep::Ipv6Primary,
        v6_secondary = DnsStep::Ipv6Secondary,
        v4_primary_addr = DNS_IPV4_PRIMARY,
        v4_secondary_addr = DNS_IPV4_SECONDARY,
        v6_primary_addr = DNS_IPV6_PRIMARY,
        v6_secondary_addr = DNS_IPV6_SECONDARY,
    )
}

pub fn state_query_script() -> &'static str {
    STATE_QUERY
}

/// Parses the attempt list written by the mutation script.
pub fn parse_attempts(text: &str) -> Result<Vec<AdapterAttempt>, ParseError> {
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
        _ => Err(ParseError::UnexpectedShape("a list of adapter attempts")),
    }
}

/// Report lines for an attempt list: one line per failed step, then how many
/// adapters went through every step cleanly.
pub fn attempt_lines(attempts: &[AdapterAttempt], language: Language) -> Vec<String> {
    let mut per_adapter: IndexMap<&str, bool> = IndexMap::new();
    let mut lines = Vec::new();

    for attempt in attempts {
        let clean = per_adapter.entry(attempt.adapter.as_str()).or_insert(true);
        if !attempt.ok {
            *clean = false;
            let detail = attempt.detail.as_deref().unwrap_or("").trim();
            lines.push(if detail.is_empty() {
                format!("⚠ {}: {}", attempt.adapter, attempt.step)
            } else {
                format!("⚠ {}: {} → {}", attempt.adapter, attempt.step, detail)
            });
        }
    }

    if !per_adapter.is_empty() {
        let done = per_adapter.values().filter(|clean| **clean).count();
        lines.push(
            Message::DnsAdaptersUpdated
                .text(language)
                .replace("{done}", &done.to_string())
                .replace("{total}", &per_adapter.len().to_string()),
        );
    }
    lines
}

impl TweakMethod for CloudflareDns {
    fn apply(
        &self,
        id: TweakId,
        ctx: &TweakContext,
        log: &mut Vec<String>,
    ) -> Result<(), TweakError> {
        let results = ScopedTempFile::empty(".json").map_err(CommandError::TempScript)?;
        let script = mutation_script(results.path());

        let outcome = execute_mutation(id, ctx, &script, log);

        match results.read_to_string().map(|text| parse_attempts(&text)) {
            Ok(Ok(attempts)) => {
                tracing::debug!("{:?} -> {} adapter step(s) recorded.", id, attempts.len());
                log.extend(attempt_lines(&attempts, ctx.language()));
            }
            Ok(Err(e)) => tracing::warn!("{:?} -> Unreadable attempt list: {}", id, e),
            Err(e) => tracing::debug!("{:?} -> No attempt list: {}", id, e),
        }

        outcome
    }

    fn verify(&self, id: TweakId, ctx: &TweakContext) -> VerificationReport {
        let language = ctx.language();
        match ctx.query(state_query_script()) {
            Ok(result) => {
                let report = verify_dns_output(&result.stdout, language, ctx.policy.as_ref());
                let stderr = result.stderr.trim();
                if stderr.is_empty() {
                    return report;
                }
                tracing::warn!("{:?} -> DNS state query wrote to stderr: {}", id, stderr);
                let mut detail = vec![format!("⚠ {}", stderr)];
                detail.extend(report.detail);
                VerificationReport::new(report.succeeded, detail)
            }
            Err(e) => {
                tracing::error!(error = ?e, "{:?} -> DNS state query failed.", id);
                let mut detail = e.report_lines(language);
                detail.push(Message::DnsParseFailed.text(language).to_string());
                VerificationReport::new(false, detail)
            }
        }
    }
}
