use std::process::Command;

use crate::system::run;

/// Kernel forwarding and NAT rules for the VPN subnet.
pub trait NetConfigurator {
    fn enable_forwarding(&self) -> Result<(), Box<dyn std::error::Error>>;
    fn install_rules(
        &self,
        interface: &str,
        subnet: &str,
        uplink: &str,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

pub struct Iptables;

impl NetConfigurator for Iptables {
    fn enable_forwarding(&self) -> Result<(), Box<dyn std::error::Error>> {
        run("sysctl", &["-w", "net.ipv4.ip_forward=1"])?;
        Ok(())
    }

    fn install_rules(
        &self,
        interface: &str,
        subnet: &str,
        uplink: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Idempotent iptables rules
        ensure_rule(
            Some("nat"),
            "POSTROUTING",
            &["-s", subnet, "-o", uplink, "-j", "MASQUERADE"],
        )?;
        ensure_rule(None, "FORWARD", &["-i", interface, "-j", "ACCEPT"])?;
        ensure_rule(None, "FORWARD", &["-o", interface, "-j", "ACCEPT"])?;
        Ok(())
    }
}

fn ensure_rule(table: Option<&str>, chain: &str, spec: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let mut check: Vec<&str> = Vec::new();
    if let Some(table) = table {
        check.extend(["-t", table]);
    }
    check.extend(["-C", chain]);
    check.extend(spec);
    let present = Command::new("iptables")
        .args(&check)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !present {
        let mut add = check;
        let flag = add.iter().position(|a| *a == "-C").unwrap();
        add[flag] = "-A";
        run("iptables", &add)?;
    }
    Ok(())
}

/// Egress interface taken from the default route.
pub fn default_uplink() -> Option<String> {
    let output = Command::new("ip").args(["route", "show", "default"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        let mut parts = line.split_whitespace();
        while let Some(part) = parts.next() {
            if part == "dev" {
                return parts.next().map(str::to_string);
            }
        }
    }
    None
}
