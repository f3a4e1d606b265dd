use std::net::IpAddr;
use std::process::Command;

use log::debug;

/// Run a command, failing with the tool's stderr when it exits nonzero.
pub(crate) fn run(program: &str, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    debug!("running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("failed to run {}: {}", program, e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(format!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            if detail.is_empty() { "nonzero exit status" } else { detail }
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn require_root() -> Result<(), Box<dyn std::error::Error>> {
    if !nix::unistd::Uid::effective().is_root() {
        return Err("this command must be run as root".into());
    }
    Ok(())
}

/// Makes sure the WireGuard tooling is present on the host.
pub trait PackageInstaller {
    fn ensure_installed(&self) -> Result<(), Box<dyn std::error::Error>>;
}

/// apt-based installer for Debian-family hosts.
pub struct AptInstaller;

impl PackageInstaller for AptInstaller {
    fn ensure_installed(&self) -> Result<(), Box<dyn std::error::Error>> {
        if which::which("wg").is_ok() && which::which("wg-quick").is_ok() {
            return Ok(());
        }
        println!("Installing WireGuard...");
        run("apt-get", &["update"])?;
        run("apt-get", &["install", "-y", "wireguard"])?;
        Ok(())
    }
}

/// Service-manager control of the per-interface WireGuard unit.
pub trait ServiceController {
    fn enable_and_start(&self, interface: &str) -> Result<(), Box<dyn std::error::Error>>;
    fn start(&self, interface: &str) -> Result<(), Box<dyn std::error::Error>>;
    fn is_active(&self, interface: &str) -> bool;
}

pub struct SystemdController;

impl SystemdController {
    fn unit(interface: &str) -> String {
        format!("wg-quick@{}", interface)
    }
}

impl ServiceController for SystemdController {
    fn enable_and_start(&self, interface: &str) -> Result<(), Box<dyn std::error::Error>> {
        let unit = Self::unit(interface);
        run("systemctl", &["enable", &unit])?;
        run("systemctl", &["start", &unit])?;
        Ok(())
    }

    fn start(&self, interface: &str) -> Result<(), Box<dyn std::error::Error>> {
        run("systemctl", &["start", &Self::unit(interface)])?;
        Ok(())
    }

    fn is_active(&self, interface: &str) -> bool {
        Command::new("systemctl")
            .args(["is-active", "--quiet", &Self::unit(interface)])
            .status()
            .is_ok_and(|s| s.success())
    }
}

/// Resolves the server's public-facing address for client configs.
pub trait EndpointDiscovery {
    fn public_ip(&self) -> Result<String, Box<dyn std::error::Error>>;
}

const IP_SERVICE: &str = "https://api.ipify.org";
const DISCOVERY_TIMEOUT_SECS: &str = "10";

/// Queries a what-is-my-IP service, curl first with a wget fallback.
/// The timeout is bounded: this is the one call to an uncontrolled third party.
pub struct HttpEndpointDiscovery;

impl EndpointDiscovery for HttpEndpointDiscovery {
    fn public_ip(&self) -> Result<String, Box<dyn std::error::Error>> {
        let answer = if which::which("curl").is_ok() {
            run("curl", &["-fsSL", "--max-time", DISCOVERY_TIMEOUT_SECS, IP_SERVICE])?
        } else if which::which("wget").is_ok() {
            run("wget", &["-qO-", "-T", DISCOVERY_TIMEOUT_SECS, IP_SERVICE])?
        } else {
            return Err("neither curl nor wget is available; pass --endpoint instead".into());
        };
        if answer.parse::<IpAddr>().is_err() {
            return Err(format!("public IP service returned garbage: '{}'", answer).into());
        }
        Ok(answer)
    }
}
