use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use defguard_wireguard_rs::{host::Peer, key::Key, net::IpAddrMask, WGApi, WireguardInterfaceApi};

/// Live peer table of a running interface.
pub trait PeerManager {
    fn apply_peer(
        &self,
        interface: &str,
        public_key_b64: &str,
        preshared_key_b64: &str,
        client_ip: &str,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn peer_present(
        &self,
        interface: &str,
        public_key_b64: &str,
    ) -> Result<bool, Box<dyn std::error::Error>>;
}

/// Talks to the kernel WireGuard module for the named interface.
pub struct KernelPeerManager;

impl PeerManager for KernelPeerManager {
    fn apply_peer(
        &self,
        interface: &str,
        public_key_b64: &str,
        preshared_key_b64: &str,
        client_ip: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let wgapi = WGApi::<defguard_wireguard_rs::Kernel>::new(interface.to_string())?;
        let mut peer = Peer::new(decode_key(public_key_b64)?);
        peer.preshared_key = Some(decode_key(preshared_key_b64)?);
        peer.allowed_ips.push(IpAddrMask::from_str(&format!("{}/32", client_ip))?);
        wgapi.configure_peer(&peer)?;
        Ok(())
    }

    fn peer_present(
        &self,
        interface: &str,
        public_key_b64: &str,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let wgapi = WGApi::<defguard_wireguard_rs::Kernel>::new(interface.to_string())?;
        let key = decode_key(public_key_b64)?;
        let host = wgapi.read_interface_data()?;
        Ok(host.peers.contains_key(&key))
    }
}

fn decode_key(b64: &str) -> Result<Key, Box<dyn std::error::Error>> {
    let bytes = general_purpose::STANDARD.decode(b64)?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| "invalid key length")?;
    Ok(Key::new(bytes))
}

/**
 * @brief Append a peer stanza to the static server configuration.
 * @param config_path Server configuration file.
 * @param stanza Rendered peer block.
 *
 * Used directly during initial bring-up, before the interface is started.
 */
pub fn append_to_server_config(config_path: &Path, stanza: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().append(true).open(config_path)?;
    file.write_all(stanza.as_bytes())?;
    Ok(())
}

/**
 * @brief Register a peer with a running interface, then persist it.
 * @param manager Live peer table access.
 * @param interface Interface name.
 * @param config_path Static server configuration to append the stanza to.
 *
 * The stanza only reaches the configuration file once the peer is visible
 * in the live listing; on verification failure nothing is written, so the
 * caller's allocation counter stays consistent with the applied state.
 */
pub fn register_incremental(
    manager: &dyn PeerManager,
    interface: &str,
    public_key_b64: &str,
    preshared_key_b64: &str,
    client_ip: &str,
    config_path: &Path,
    stanza: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    manager.apply_peer(interface, public_key_b64, preshared_key_b64, client_ip)?;
    if !manager.peer_present(interface, public_key_b64)? {
        return Err(format!(
            "peer verification failed: {} is not listed on {}",
            public_key_b64, interface
        )
        .into());
    }
    append_to_server_config(config_path, stanza)?;
    Ok(())
}
