use clap::Parser;
use log::warn;

use wg_provision::keys::X25519KeyGenerator;
use wg_provision::nat::Iptables;
use wg_provision::peers::KernelPeerManager;
use wg_provision::qr::QrCodeRenderer;
use wg_provision::setup::{Collaborators, Paths};
use wg_provision::state::{
    FileStateRepository, Settings, DEFAULT_DNS, DEFAULT_INTERFACE, DEFAULT_PORT, DEFAULT_SUBNET,
};
use wg_provision::system::{self, AptInstaller, HttpEndpointDiscovery, SystemdController};
use wg_provision::{addclient, setup};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    warn_ambiguous_defaults(&cli);
    system::require_root()?;

    let settings = Settings {
        subnet: cli.subnet.unwrap_or_else(|| DEFAULT_SUBNET.into()),
        port: cli.port.unwrap_or(DEFAULT_PORT),
        clients: cli.clients.unwrap_or(1),
        interface: cli.interface.unwrap_or_else(|| DEFAULT_INTERFACE.into()),
        dns: cli.dns.unwrap_or_else(|| DEFAULT_DNS.into()),
        endpoint: cli.endpoint,
        uplink: cli.uplink,
        show_qr: !cli.no_qr,
    };

    let paths = Paths::default();
    let repo = FileStateRepository::new(&paths.state_dir);
    let tools = Collaborators {
        keys: &X25519KeyGenerator,
        peers: &KernelPeerManager,
        packages: &AptInstaller,
        services: &SystemdController,
        endpoint: &HttpEndpointDiscovery,
        qr: &QrCodeRenderer,
        repo: &repo,
        net: &Iptables,
    };

    match cli.add_client {
        Some(name) => addclient::run(&name, settings, &paths, &tools)?,
        None => setup::run(settings, &paths, &tools)?,
    }
    Ok(())
}

// A flag passed with its built-in default value cannot be told apart from an
// omitted flag when stored state is merged; surface that instead of guessing.
fn warn_ambiguous_defaults(cli: &Cli) {
    if cli.interface.as_deref() == Some(DEFAULT_INTERFACE) {
        warn!("--interface {} equals the default; a stored interface may take precedence", DEFAULT_INTERFACE);
    }
    if cli.subnet.as_deref() == Some(DEFAULT_SUBNET) {
        warn!("--subnet {} equals the default; a stored subnet may take precedence", DEFAULT_SUBNET);
    }
    if cli.dns.as_deref() == Some(DEFAULT_DNS) {
        warn!("--dns {} equals the default; stored DNS servers may take precedence", DEFAULT_DNS);
    }
    if cli.port == Some(DEFAULT_PORT) {
        warn!("--port {} equals the default; a stored port may take precedence", DEFAULT_PORT);
    }
}

#[derive(Parser)]
#[command(name = "wg-provision")]
#[command(version, about = "WireGuard VPN server provisioner")]
struct Cli {
    /// VPN subnet in CIDR form
    #[arg(short, long)]
    subnet: Option<String>,

    /// UDP listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of clients to generate during setup
    #[arg(short, long)]
    clients: Option<u32>,

    /// WireGuard interface name
    #[arg(short, long)]
    interface: Option<String>,

    /// Comma-separated DNS servers for client configs
    #[arg(short, long)]
    dns: Option<String>,

    /// Add one client to an already provisioned interface
    #[arg(short = 'a', long = "add-client", value_name = "NAME")]
    add_client: Option<String>,

    /// Public endpoint host to use instead of discovering it
    #[arg(long)]
    endpoint: Option<String>,

    /// NAT egress interface (default: taken from the default route)
    #[arg(long)]
    uplink: Option<String>,

    /// Do not print QR codes to the terminal
    #[arg(long)]
    no_qr: bool,
}
