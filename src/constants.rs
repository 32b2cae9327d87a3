// src/constants.rs

use std::time::Duration;

// Cloudflare "malware blocking" resolvers.
pub const DNS_IPV4_PRIMARY: &str = "1.1.1.2";
pub const DNS_IPV4_SECONDARY: &str = "1.0.0.2";
pub const DNS_IPV6_PRIMARY: &str = "2606:4700:4700::1112";
pub const DNS_IPV6_SECONDARY: &str = "2606:4700:4700::1002";

pub const DNS_IPV4_TARGETS: [&str; 2] = [DNS_IPV4_PRIMARY, DNS_IPV4_SECONDARY];
pub const DNS_IPV6_TARGETS: [&str; 2] = [DNS_IPV6_PRIMARY, DNS_IPV6_SECONDARY];

/// Hidden baseline scheme that `powercfg -duplicatescheme` copies into a visible
/// "Ultimate Performance" plan.
pub const ULTIMATE_PERFORMANCE_TEMPLATE_GUID: &str = "e9a42b02-d5df-448d-aa00-03f14749eb61";

/// Localized names of the duplicated plan, as printed by `powercfg -list`.
pub const ULTIMATE_PERFORMANCE_LABELS: [&str; 5] = [
    "Ultimate",
    "Najwyższa",
    "Ultimative",
    "Máximo",
    "Максимальная",
];

pub const IPV6_POLICY_PATH: &str =
    "HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Services\\Tcpip6\\Parameters";
pub const IPV6_POLICY_VALUE: &str = "DisabledComponents";

pub const DEFAULT_POWERSHELL: &str = "powershell.exe";
pub const DEFAULT_CMD: &str = "cmd.exe";
pub const DEFAULT_SCRIPTS_DIR: &str = "scripts";

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
/// Upper bound for a configured command ceiling.
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when a process status or its captured output is unavailable.
pub const SYNTHETIC_FAILURE_CODE: i32 = -1;
/// Windows code page identifier for UTF-8.
pub const UTF8_CODE_PAGE: u32 = 65001;

pub const TEMP_SCRIPT_PREFIX: &str = "w11tweak_";
