use std::path::{Path, PathBuf};

pub const KEEPALIVE_SECONDS: u16 = 25;

/**
 * @brief Path of the static server configuration for an interface.
 * @param config_dir System configuration directory (normally /etc/wireguard).
 * @param interface Interface name.
 */
pub fn server_config_path(config_dir: &Path, interface: &str) -> PathBuf {
    config_dir.join(format!("{}.conf", interface))
}

/**
 * @brief Render the server-side interface section.
 * @param server_ip Server address (host .1 of the subnet).
 * @param port UDP listen port.
 * @param server_private_key Base64 private key.
 * @return Interface section text; peer stanzas are appended separately.
 *
 * SaveConfig keeps live peer changes across service restarts.
 */
pub fn server_config(server_ip: &str, port: u16, server_private_key: &str) -> String {
    format!(
        "[Interface]\n\
         Address = {}/24\n\
         SaveConfig = true\n\
         ListenPort = {}\n\
         PrivateKey = {}\n",
        server_ip, port, server_private_key
    )
}

/**
 * @brief Render a peer stanza appendable to the server configuration.
 * @param public_key Client public key (Base64).
 * @param preshared_key Preshared key (Base64).
 * @param client_ip Client address; AllowedIPs is restricted to this /32.
 */
pub fn peer_stanza(public_key: &str, preshared_key: &str, client_ip: &str) -> String {
    format!(
        "\n[Peer]\n\
         PublicKey = {}\n\
         PresharedKey = {}\n\
         AllowedIPs = {}/32\n",
        public_key, preshared_key, client_ip
    )
}

/**
 * @brief Render a full-tunnel client configuration.
 * @param private_key Client private key (Base64).
 * @param client_ip Client address inside the VPN subnet.
 * @param dns Comma-separated resolver list, written verbatim.
 * @param server_public_key Server public key (Base64).
 * @param preshared_key Preshared key shared with the server (Base64).
 * @param endpoint_host Public address of the server.
 * @param port Server UDP listen port.
 */
pub fn client_config(
    private_key: &str,
    client_ip: &str,
    dns: &str,
    server_public_key: &str,
    preshared_key: &str,
    endpoint_host: &str,
    port: u16,
) -> String {
    format!(
        "[Interface]\n\
         PrivateKey = {}\n\
         Address = {}/24\n\
         DNS = {}\n\
         \n\
         [Peer]\n\
         PublicKey = {}\n\
         PresharedKey = {}\n\
         AllowedIPs = 0.0.0.0/0\n\
         Endpoint = {}:{}\n\
         PersistentKeepalive = {}\n",
        private_key, client_ip, dns, server_public_key, preshared_key, endpoint_host, port, KEEPALIVE_SECONDS
    )
}
