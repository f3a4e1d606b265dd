/* \page ProvisionerOverview Provisioner Overview
WireGuard VPN server provisioner components.

- Persisted per-interface state and CLI merge policy (`state.rs`).
- Client address allocation (`allocator.rs`).
- Server/client configuration rendering (`render.rs`).
- Key material generation (`keys.rs`).
- Live peer registration and verification (`peers.rs`).
- Host tooling: packages, services, endpoint discovery (`system.rs`).
- IP forwarding and NAT rules (`nat.rs`).
- QR output for client onboarding (`qr.rs`).
- Provisioning orchestration (`setup.rs`) and incremental add (`addclient.rs`).
- Append-only action log (`filelog.rs`).
*/
pub mod addclient;
pub mod allocator;
pub mod filelog;
pub mod keys;
pub mod nat;
pub mod peers;
pub mod qr;
pub mod render;
pub mod setup;
pub mod state;
pub mod system;
