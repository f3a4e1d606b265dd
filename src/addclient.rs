use std::fs;
use std::path::PathBuf;

use crate::filelog::AuditLog;
use crate::keys::KeyGenerator as _;
use crate::setup::{explicit_interface, write_client_files, Collaborators, Paths};
use crate::state::{self, Settings, StateRepository as _};
use crate::system::{EndpointDiscovery as _, ServiceController as _};
use crate::{allocator, peers, render};

/// Add a single client to an already provisioned interface.
///
/// The allocation counter only advances, and the state is only re-saved,
/// once the peer is verified against the live interface listing. Earlier
/// side effects are not rolled back on failure.
pub fn run(
    name: &str,
    mut settings: Settings,
    paths: &Paths,
    tools: &Collaborators,
) -> Result<(), Box<dyn std::error::Error>> {
    let _lock = tools.repo.lock()?;

    let hint = explicit_interface(&settings);
    let mut st = tools
        .repo
        .load(hint.as_deref())?
        .ok_or("server configuration not found; run initial setup before adding clients")?;
    state::merge_stored(&mut settings, &st);

    let config_path = PathBuf::from(&st.server_config_path);
    if !config_path.exists() {
        return Err(format!("server configuration not found at {}", config_path.display()).into());
    }

    // Explicit flag overrides become the persisted identity, as on setup.
    st.subnet = settings.subnet.clone();
    st.subnet_base = allocator::subnet_base(&settings.subnet)?;
    st.server_ip = allocator::server_ip(&st.subnet_base);
    st.port = settings.port;
    st.dns_servers = settings.dns.clone();

    if !tools.services.is_active(&st.interface_name) {
        println!("Interface {} is down, starting it...", st.interface_name);
        tools.services.start(&st.interface_name)?;
    }

    let endpoint_host = match &settings.endpoint {
        Some(host) => host.clone(),
        None => tools.endpoint.public_ip()?,
    };

    let keypair = tools.keys.keypair()?;
    let psk = tools.keys.preshared_key()?;
    let (client_ip, next) = allocator::next_client_ip(&st.subnet_base, st.last_client_ip);

    let stanza = render::peer_stanza(&keypair.public_b64, &psk, &client_ip);
    peers::register_incremental(
        tools.peers,
        &st.interface_name,
        &keypair.public_b64,
        &psk,
        &client_ip,
        &config_path,
        &stanza,
    )?;

    st.last_client_ip = next;
    tools.repo.save(&st)?;

    let client_dir = paths.clients_dir.join(&st.interface_name);
    fs::create_dir_all(&client_dir)?;
    let config_text = render::client_config(
        &keypair.private_b64,
        &client_ip,
        &st.dns_servers,
        &st.server_public_key,
        &psk,
        &endpoint_host,
        st.port,
    );
    write_client_files(&client_dir, name, &config_text, tools.qr, settings.show_qr)?;

    println!("Client '{}' added to {} at {}", name, st.interface_name, client_ip);
    AuditLog::new(paths.state_dir.join("wg-provision.log")).record(&format!(
        "added client {} ({}) to {}",
        name, client_ip, st.interface_name
    ));
    Ok(())
}
