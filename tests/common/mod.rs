use std::cell::{Cell, RefCell};
use std::path::Path;

use tempfile::TempDir;
use wg_provision::keys::{KeyGenerator, Keypair};
use wg_provision::nat::NetConfigurator;
use wg_provision::peers::PeerManager;
use wg_provision::qr::QrRenderer;
use wg_provision::setup::{Collaborators, Paths};
use wg_provision::state::{FileStateRepository, Settings};
use wg_provision::system::{EndpointDiscovery, PackageInstaller, ServiceController};

pub struct FakeKeys {
    counter: Cell<u32>,
}

impl FakeKeys {
    pub fn new() -> Self {
        Self { counter: Cell::new(0) }
    }

    fn next(&self) -> u32 {
        let n = self.counter.get() + 1;
        self.counter.set(n);
        n
    }
}

impl KeyGenerator for FakeKeys {
    fn keypair(&self) -> Result<Keypair, Box<dyn std::error::Error>> {
        let n = self.next();
        Ok(Keypair {
            private_b64: format!("priv{}", n),
            public_b64: format!("pub{}", n),
        })
    }

    fn preshared_key(&self) -> Result<String, Box<dyn std::error::Error>> {
        Ok(format!("psk{}", self.next()))
    }
}

/// Records applied peers instead of touching a live interface.
pub struct FakePeers {
    pub applied: RefCell<Vec<AppliedPeer>>,
    pub verify_ok: Cell<bool>,
}

pub struct AppliedPeer {
    pub interface: String,
    pub public_key: String,
    pub client_ip: String,
}

impl FakePeers {
    pub fn new() -> Self {
        Self {
            applied: RefCell::new(Vec::new()),
            verify_ok: Cell::new(true),
        }
    }
}

impl PeerManager for FakePeers {
    fn apply_peer(
        &self,
        interface: &str,
        public_key_b64: &str,
        _preshared_key_b64: &str,
        client_ip: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.applied.borrow_mut().push(AppliedPeer {
            interface: interface.into(),
            public_key: public_key_b64.into(),
            client_ip: client_ip.into(),
        });
        Ok(())
    }

    fn peer_present(
        &self,
        _interface: &str,
        public_key_b64: &str,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        Ok(self.verify_ok.get()
            && self.applied.borrow().iter().any(|p| p.public_key == public_key_b64))
    }
}

pub struct FakeInstaller;

impl PackageInstaller for FakeInstaller {
    fn ensure_installed(&self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

pub struct FakeServices {
    pub active: Cell<bool>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self { active: Cell::new(false) }
    }
}

impl ServiceController for FakeServices {
    fn enable_and_start(&self, _interface: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.active.set(true);
        Ok(())
    }

    fn start(&self, _interface: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.active.set(true);
        Ok(())
    }

    fn is_active(&self, _interface: &str) -> bool {
        self.active.get()
    }
}

pub struct FakeEndpoint;

impl EndpointDiscovery for FakeEndpoint {
    fn public_ip(&self) -> Result<String, Box<dyn std::error::Error>> {
        Ok("203.0.113.7".into())
    }
}

pub struct FakeQr;

impl QrRenderer for FakeQr {
    fn save_image(&self, _payload: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, "qr")?;
        Ok(())
    }

    fn print_terminal(&self, _payload: &str) {}
}

pub struct NullNet;

impl NetConfigurator for NullNet {
    fn enable_forwarding(&self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn install_rules(
        &self,
        _interface: &str,
        _subnet: &str,
        _uplink: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// A throwaway host: fake collaborators plus a temp working directory.
pub struct TestHost {
    pub dir: TempDir,
    pub keys: FakeKeys,
    pub peers: FakePeers,
    pub services: FakeServices,
    pub repo: FileStateRepository,
}

impl TestHost {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = FileStateRepository::new(dir.path().join("state"));
        Self {
            dir,
            keys: FakeKeys::new(),
            peers: FakePeers::new(),
            services: FakeServices::new(),
            repo,
        }
    }

    pub fn paths(&self) -> Paths {
        Paths {
            config_dir: self.dir.path().join("etc/wireguard"),
            clients_dir: self.dir.path().join("clients"),
            state_dir: self.dir.path().join("state"),
        }
    }

    pub fn tools(&self) -> Collaborators<'_> {
        Collaborators {
            keys: &self.keys,
            peers: &self.peers,
            packages: &FakeInstaller,
            services: &self.services,
            endpoint: &FakeEndpoint,
            qr: &FakeQr,
            repo: &self.repo,
            net: &NullNet,
        }
    }
}

/// Defaults with host-touching bits neutralized for tests.
pub fn base_settings() -> Settings {
    Settings {
        uplink: Some("lo".into()),
        show_qr: false,
        ..Settings::default()
    }
}
