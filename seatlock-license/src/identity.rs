//! Machine identity strategies.
//!
//! A machine identity is a string that stays the same across reboots and is
//! used verbatim as a token's `machine_id`. Each platform exposes it
//! differently, so every source is its own [`MachineIdentityProvider`] and
//! [`platform_identity_provider`] picks an ordered chain for the host once at
//! startup. The verifier only ever sees the trait.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::debug;

use crate::error::{LicenseError, LicenseResult};

/// Source of the local machine identity.
pub trait MachineIdentityProvider: Send + Sync {
    /// Returns the identity of this machine.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::IdentityUnavailable`] if this source has no value.
    fn identify(&self) -> LicenseResult<String>;

    /// Short label for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Kernel/systemd machine id files, first non-empty one wins.
#[derive(Debug, Clone)]
pub struct MachineIdFile {
    paths: Vec<PathBuf>,
}

impl MachineIdFile {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// `/etc/machine-id`, then the D-Bus copy.
    pub fn linux() -> Self {
        Self::new(vec![
            PathBuf::from("/etc/machine-id"),
            PathBuf::from("/var/lib/dbus/machine-id"),
        ])
    }
}

impl MachineIdentityProvider for MachineIdFile {
    fn identify(&self) -> LicenseResult<String> {
        for path in &self.paths {
            match fs::read_to_string(path) {
                Ok(content) => {
                    let id = content.trim();
                    if !id.is_empty() {
                        return Ok(id.to_string());
                    }
                }
                Err(e) => debug!(path = %path.display(), error = %e, "machine-id file unreadable"),
            }
        }
        Err(LicenseError::IdentityUnavailable(
            "no non-empty machine-id file".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "machine-id-file"
    }
}

/// macOS `IOPlatformUUID` as reported by `ioreg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformUuid;

impl MachineIdentityProvider for PlatformUuid {
    fn identify(&self) -> LicenseResult<String> {
        let output = run_command("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
        parse_ioreg_uuid(&output).ok_or_else(|| {
            LicenseError::IdentityUnavailable("IOPlatformUUID not found".to_string())
        })
    }

    fn name(&self) -> &'static str {
        "platform-uuid"
    }
}

/// Windows `MachineGuid` from the Cryptography registry key.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsMachineGuid;

impl MachineIdentityProvider for WindowsMachineGuid {
    fn identify(&self) -> LicenseResult<String> {
        let output = run_command(
            "reg",
            &[
                "query",
                r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ],
        )?;
        parse_reg_machine_guid(&output).ok_or_else(|| {
            LicenseError::IdentityUnavailable("MachineGuid not found".to_string())
        })
    }

    fn name(&self) -> &'static str {
        "windows-machine-guid"
    }
}

#[derive(Debug, Clone)]
enum MacSource {
    Sysfs(PathBuf),
    Ifconfig,
    Getmac,
}

/// First non-loopback network interface hardware address.
///
/// Last resort: adapters can be swapped or spoofed.
#[derive(Debug, Clone)]
pub struct MacAddress {
    source: MacSource,
}

impl MacAddress {
    /// Uses the interface listing native to the host.
    pub fn for_host() -> Self {
        let source = if cfg!(target_os = "linux") {
            MacSource::Sysfs(PathBuf::from("/sys/class/net"))
        } else if cfg!(target_os = "windows") {
            MacSource::Getmac
        } else {
            MacSource::Ifconfig
        };
        Self { source }
    }

    /// Reads interfaces from a `/sys/class/net` style directory.
    pub fn from_sysfs(root: impl Into<PathBuf>) -> Self {
        Self {
            source: MacSource::Sysfs(root.into()),
        }
    }
}

impl MachineIdentityProvider for MacAddress {
    fn identify(&self) -> LicenseResult<String> {
        let found = match &self.source {
            MacSource::Sysfs(root) => first_sysfs_mac(root)?,
            MacSource::Ifconfig => parse_ifconfig_mac(&run_command("ifconfig", &["-a"])?),
            MacSource::Getmac => parse_getmac(&run_command("getmac", &["/fo", "csv", "/nh"])?),
        };
        found.ok_or_else(|| {
            LicenseError::IdentityUnavailable("no non-loopback hardware address".to_string())
        })
    }

    fn name(&self) -> &'static str {
        "mac-address"
    }
}

/// Constant identity, for tests and for issuing on behalf of a known host.
#[derive(Debug, Clone)]
pub struct FixedIdentity(String);

impl FixedIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl MachineIdentityProvider for FixedIdentity {
    fn identify(&self) -> LicenseResult<String> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Tries each provider in order and returns the first identity found.
#[derive(Clone)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn MachineIdentityProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn MachineIdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Names of the chained providers, in order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Like [`MachineIdentityProvider::identify`], also returning which provider answered.
    pub fn identify_with_source(&self) -> LicenseResult<(String, &'static str)> {
        for provider in &self.providers {
            match provider.identify() {
                Ok(id) => {
                    debug!(provider = provider.name(), "machine identity resolved");
                    return Ok((id, provider.name()));
                }
                Err(e) => debug!(provider = provider.name(), error = %e, "identity strategy failed"),
            }
        }
        Err(LicenseError::IdentityUnavailable(format!(
            "all strategies failed ({})",
            self.provider_names().join(", ")
        )))
    }
}

impl MachineIdentityProvider for FallbackChain {
    fn identify(&self) -> LicenseResult<String> {
        self.identify_with_source().map(|(id, _)| id)
    }

    fn name(&self) -> &'static str {
        "fallback-chain"
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}

/// The identity chain for the host this binary was built for.
pub fn platform_identity_provider() -> FallbackChain {
    let mut providers: Vec<Arc<dyn MachineIdentityProvider>> = Vec::new();

    if cfg!(target_os = "linux") {
        providers.push(Arc::new(MachineIdFile::linux()));
    } else if cfg!(target_os = "macos") {
        providers.push(Arc::new(PlatformUuid));
    } else if cfg!(target_os = "windows") {
        providers.push(Arc::new(WindowsMachineGuid));
    }
    providers.push(Arc::new(MacAddress::for_host()));

    FallbackChain::new(providers)
}

fn run_command(program: &str, args: &[&str]) -> LicenseResult<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| LicenseError::IdentityUnavailable(format!("{program}: {e}")))?;
    if !output.status.success() {
        return Err(LicenseError::IdentityUnavailable(format!(
            "{program} exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `"IOPlatformUUID" = "564D1A2B-..."`
fn parse_ioreg_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("IOPlatformUUID"))
        .filter_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim_matches(|c| c == ' ' || c == '"').to_string())
        .find(|id| !id.is_empty())
}

/// `    MachineGuid    REG_SZ    1f2e3d4c-...`
fn parse_reg_machine_guid(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("MachineGuid"))
        .find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            (fields.len() >= 3).then(|| fields[fields.len() - 1].to_string())
        })
}

/// Parses `aa:bb:cc:dd:ee:ff` or `AA-BB-CC-DD-EE-FF` into lowercase
/// colon-separated form. Rejects anything but 6 octets, and the all-zero address.
fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.trim().split([':', '-']).collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }
    if octets.iter().all(|o| *o == "00") {
        return None;
    }
    Some(octets.join(":").to_ascii_lowercase())
}

/// ARPHRD_LOOPBACK in `/sys/class/net/<if>/type`.
const ARPHRD_LOOPBACK: u32 = 772;

fn first_sysfs_mac(root: &Path) -> LicenseResult<Option<String>> {
    let entries = fs::read_dir(root).map_err(|e| {
        LicenseError::IdentityUnavailable(format!("{}: {e}", root.display()))
    })?;

    let read_trimmed = |dir: &Path, file: &str| {
        fs::read_to_string(dir.join(file))
            .ok()
            .map(|s| s.trim().to_string())
    };

    let mut candidates: Vec<(u32, String)> = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        let if_type = read_trimmed(&dir, "type").and_then(|t| t.parse::<u32>().ok());
        if if_type == Some(ARPHRD_LOOPBACK) {
            continue;
        }
        let Some(mac) = read_trimmed(&dir, "address").and_then(|a| normalize_mac(&a)) else {
            continue;
        };
        let index = read_trimmed(&dir, "ifindex")
            .and_then(|i| i.parse::<u32>().ok())
            .unwrap_or(u32::MAX);
        candidates.push((index, mac));
    }

    candidates.sort();
    Ok(candidates.into_iter().next().map(|(_, mac)| mac))
}

/// BSD/macOS `ifconfig -a`: interface headers start in column 0, addresses
/// follow on indented `ether` lines.
fn parse_ifconfig_mac(output: &str) -> Option<String> {
    let mut loopback = false;
    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            loopback = line.contains("LOOPBACK");
            continue;
        }
        if loopback {
            continue;
        }
        let mut words = line.split_whitespace();
        if words.next() == Some("ether") {
            if let Some(mac) = words.next().and_then(normalize_mac) {
                return Some(mac);
            }
        }
    }
    None
}

/// Windows `getmac /fo csv /nh`: `"00-1A-2B-3C-4D-5E","\Device\Tcpip_{...}"`.
fn parse_getmac(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let first = line.split(',').next()?.trim().trim_matches('"');
        normalize_mac(first)
    })
}
