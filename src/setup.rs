use std::fs;
use std::path::{Path, PathBuf};

use crate::filelog::AuditLog;
use crate::keys::KeyGenerator;
use crate::nat::{self, NetConfigurator};
use crate::peers::{self, PeerManager};
use crate::qr::QrRenderer;
use crate::state::{self, ProvisionState, Settings, StateRepository};
use crate::system::{EndpointDiscovery, PackageInstaller, ServiceController};
use crate::{allocator, render};

/// Filesystem roots, overridable for tests.
pub struct Paths {
    pub config_dir: PathBuf,
    pub clients_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/wireguard"),
            clients_dir: PathBuf::from("clients"),
            state_dir: PathBuf::from("."),
        }
    }
}

/// External capabilities the flows are driven through, so orchestration
/// can be exercised without touching the host.
pub struct Collaborators<'a> {
    pub keys: &'a dyn KeyGenerator,
    pub peers: &'a dyn PeerManager,
    pub packages: &'a dyn PackageInstaller,
    pub services: &'a dyn ServiceController,
    pub endpoint: &'a dyn EndpointDiscovery,
    pub qr: &'a dyn QrRenderer,
    pub repo: &'a dyn StateRepository,
    pub net: &'a dyn NetConfigurator,
}

/// Full server bring-up: dependencies, forwarding and NAT, server identity,
/// static configuration, the initial client batch, state, service start.
///
/// Steps run strictly in order and a failure aborts the run; partially
/// applied system state is left behind.
pub fn run(mut settings: Settings, paths: &Paths, tools: &Collaborators) -> Result<(), Box<dyn std::error::Error>> {
    let _lock = tools.repo.lock()?;

    let hint = explicit_interface(&settings);
    let stored = tools.repo.load(hint.as_deref())?;
    let initialized = stored.is_none();
    if let Some(stored) = &stored {
        state::merge_stored(&mut settings, stored);
    }

    tools.packages.ensure_installed()?;

    tools.net.enable_forwarding()?;
    let uplink = settings
        .uplink
        .clone()
        .or_else(nat::default_uplink)
        .unwrap_or_else(|| "eth0".into());
    tools.net.install_rules(&settings.interface, &settings.subnet, &uplink)?;

    let base = allocator::subnet_base(&settings.subnet)?;
    let server_ip = allocator::server_ip(&base);

    let mut st = match stored {
        Some(mut st) => {
            // Explicit flag overrides may change identity fields; server keys
            // and the allocation counter always carry over.
            st.subnet = settings.subnet.clone();
            st.port = settings.port;
            st.subnet_base = base;
            st.server_ip = server_ip;
            st.dns_servers = settings.dns.clone();
            st
        }
        None => {
            let keypair = tools.keys.keypair()?;
            println!("Server public key: {}", keypair.public_b64);
            ProvisionState {
                subnet: settings.subnet.clone(),
                port: settings.port,
                subnet_base: base,
                server_ip,
                server_public_key: keypair.public_b64,
                server_private_key: keypair.private_b64,
                last_client_ip: 1,
                server_config_path: render::server_config_path(&paths.config_dir, &settings.interface)
                    .display()
                    .to_string(),
                interface_name: settings.interface.clone(),
                dns_servers: settings.dns.clone(),
            }
        }
    };

    let config_path = PathBuf::from(&st.server_config_path);
    if initialized || !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &config_path,
            render::server_config(&st.server_ip, st.port, &st.server_private_key),
        )?;
        println!("Wrote server configuration to {}", config_path.display());
    }

    let endpoint_host = match &settings.endpoint {
        Some(host) => host.clone(),
        None => tools.endpoint.public_ip()?,
    };

    let client_dir = paths.clients_dir.join(&st.interface_name);
    fs::create_dir_all(&client_dir)?;

    for _ in 0..settings.clients {
        let (client_ip, next) = allocator::next_client_ip(&st.subnet_base, st.last_client_ip);
        let name = format!("client{}", next);
        let keypair = tools.keys.keypair()?;
        let psk = tools.keys.preshared_key()?;
        peers::append_to_server_config(
            &config_path,
            &render::peer_stanza(&keypair.public_b64, &psk, &client_ip),
        )?;
        let config_text = render::client_config(
            &keypair.private_b64,
            &client_ip,
            &st.dns_servers,
            &st.server_public_key,
            &psk,
            &endpoint_host,
            st.port,
        );
        write_client_files(&client_dir, &name, &config_text, tools.qr, settings.show_qr)?;
        st.last_client_ip = next;
        println!("Created client '{}' at {}", name, client_ip);
    }

    tools.repo.save(&st)?;

    tools.services.enable_and_start(&st.interface_name)?;
    println!("WireGuard server is LIVE on UDP {}!", st.port);

    AuditLog::new(paths.state_dir.join("wg-provision.log")).record(&format!(
        "provisioned {} ({}) with {} client(s)",
        st.interface_name, st.subnet, settings.clients
    ));
    Ok(())
}

/// An interface named on the command line (any value other than the built-in
/// default) pins the persisted record to load.
pub(crate) fn explicit_interface(settings: &Settings) -> Option<String> {
    (settings.interface != state::DEFAULT_INTERFACE).then(|| settings.interface.clone())
}

pub(crate) fn write_client_files(
    dir: &Path,
    name: &str,
    config_text: &str,
    qr: &dyn QrRenderer,
    show_qr: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(dir.join(format!("{}.conf", name)), config_text)?;
    qr.save_image(config_text, &dir.join(format!("{}.svg", name)))?;
    if show_qr {
        qr.print_terminal(config_text);
    }
    Ok(())
}
