use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

pub const DEFAULT_SUBNET: &str = "10.0.0.0/24";
pub const DEFAULT_PORT: u16 = 51820;
pub const DEFAULT_INTERFACE: &str = "wg0";
pub const DEFAULT_DNS: &str = "1.1.1.1,8.8.8.8";

const STATE_SUFFIX: &str = ".state";
const LOCK_FILE: &str = ".wg-provision.lock";

/// Effective run configuration after CLI defaults are applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub subnet: String,
    pub port: u16,
    pub clients: u32,
    pub interface: String,
    pub dns: String,
    pub endpoint: Option<String>,
    pub uplink: Option<String>,
    pub show_qr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subnet: DEFAULT_SUBNET.into(),
            port: DEFAULT_PORT,
            clients: 1,
            interface: DEFAULT_INTERFACE.into(),
            dns: DEFAULT_DNS.into(),
            endpoint: None,
            uplink: None,
            show_qr: true,
        }
    }
}

/// Identity and allocation record persisted across invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionState {
    pub subnet: String,
    pub port: u16,
    pub subnet_base: String,
    pub server_ip: String,
    pub server_public_key: String,
    pub server_private_key: String,
    pub last_client_ip: u32,
    pub server_config_path: String,
    pub interface_name: String,
    pub dns_servers: String,
}

impl ProvisionState {
    pub fn to_text(&self) -> String {
        format!(
            "SUBNET={}\nPORT={}\nSUBNET_BASE={}\nSERVER_IP={}\nSERVER_PUBLIC_KEY={}\n\
             SERVER_PRIVATE_KEY={}\nLAST_CLIENT_IP={}\nSERVER_CONFIG_PATH={}\n\
             INTERFACE_NAME={}\nDNS_SERVERS={}\n",
            self.subnet,
            self.port,
            self.subnet_base,
            self.server_ip,
            self.server_public_key,
            self.server_private_key,
            self.last_client_ip,
            self.server_config_path,
            self.interface_name,
            self.dns_servers,
        )
    }

    pub fn from_text(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key.trim(), value.trim());
            }
        }
        let get = |key: &str| -> Result<String, Box<dyn std::error::Error>> {
            fields
                .get(key)
                .map(|v| v.to_string())
                .ok_or_else(|| format!("state file is missing {}", key).into())
        };
        Ok(Self {
            subnet: get("SUBNET")?,
            port: get("PORT")?.parse().map_err(|_| "PORT is not a valid port number")?,
            subnet_base: get("SUBNET_BASE")?,
            server_ip: get("SERVER_IP")?,
            server_public_key: get("SERVER_PUBLIC_KEY")?,
            server_private_key: get("SERVER_PRIVATE_KEY")?,
            last_client_ip: get("LAST_CLIENT_IP")?
                .parse()
                .map_err(|_| "LAST_CLIENT_IP is not a valid counter")?,
            server_config_path: get("SERVER_CONFIG_PATH")?,
            interface_name: get("INTERFACE_NAME")?,
            dns_servers: get("DNS_SERVERS")?,
        })
    }
}

/**
 * @brief Adopt stored values for every field still equal to its built-in default.
 * @param settings Effective settings, mutated in place.
 * @param stored Previously persisted record.
 *
 * A flag explicitly passed with the default value is indistinguishable from
 * an omitted flag at this level and falls back to the stored value; the CLI
 * layer warns about that case instead of resolving it differently.
 */
pub fn merge_stored(settings: &mut Settings, stored: &ProvisionState) {
    if settings.interface == DEFAULT_INTERFACE {
        settings.interface = stored.interface_name.clone();
    }
    if settings.subnet == DEFAULT_SUBNET {
        settings.subnet = stored.subnet.clone();
    }
    if settings.port == DEFAULT_PORT {
        settings.port = stored.port;
    }
    if settings.dns == DEFAULT_DNS {
        settings.dns = stored.dns_servers.clone();
    }
}

/// Held for the duration of a mutating invocation; drop releases the lock.
pub struct StateLock {
    _flock: Option<Flock<File>>,
}

/// Load/save access to the persisted per-interface record.
pub trait StateRepository {
    /// Load the record for `interface`, or resolve the active interface from
    /// the working directory when no explicit interface is in play.
    fn load(&self, interface: Option<&str>) -> Result<Option<ProvisionState>, Box<dyn std::error::Error>>;

    fn save(&self, state: &ProvisionState) -> Result<(), Box<dyn std::error::Error>>;

    /// Exclusive advisory lock serializing mutating invocations in this
    /// working directory. The default is a no-op for test doubles.
    fn lock(&self) -> Result<StateLock, Box<dyn std::error::Error>> {
        Ok(StateLock { _flock: None })
    }
}

/// One `<interface>.state` key=value file per interface in a working directory.
pub struct FileStateRepository {
    dir: PathBuf,
}

impl FileStateRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn state_path(&self, interface: &str) -> PathBuf {
        self.dir.join(format!("{}{}", interface, STATE_SUFFIX))
    }

    // Resolution when no interface was named: the default interface's file
    // wins, otherwise a single existing state file is adopted.
    fn resolve_path(&self) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
        let default_path = self.state_path(DEFAULT_INTERFACE);
        if default_path.exists() {
            return Ok(Some(default_path));
        }
        let mut found: Vec<PathBuf> = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(STATE_SUFFIX))
                {
                    found.push(path);
                }
            }
        }
        match found.len() {
            0 => Ok(None),
            1 => Ok(Some(found.remove(0))),
            _ => Err("several interfaces are provisioned here; pass --interface to pick one".into()),
        }
    }
}

impl StateRepository for FileStateRepository {
    fn load(&self, interface: Option<&str>) -> Result<Option<ProvisionState>, Box<dyn std::error::Error>> {
        let path = match interface {
            Some(name) => {
                let p = self.state_path(name);
                if p.exists() {
                    Some(p)
                } else {
                    None
                }
            }
            None => self.resolve_path()?,
        };
        match path {
            Some(p) => {
                let text = fs::read_to_string(&p)?;
                let state = ProvisionState::from_text(&text)
                    .map_err(|e| format!("{}: {}", p.display(), e))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn save(&self, state: &ProvisionState) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.state_path(&state.interface_name);
        let tmp = path.with_extension("state.tmp");
        fs::write(&tmp, state.to_text())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn lock(&self) -> Result<StateLock, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.dir.join(LOCK_FILE))?;
        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| format!("another invocation is already running here ({})", errno))?;
        Ok(StateLock { _flock: Some(flock) })
    }
}
