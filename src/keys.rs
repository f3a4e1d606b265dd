use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};

#[derive(Debug, Clone)]
pub struct Keypair {
    pub private_b64: String,
    pub public_b64: String,
}

/// Key material source for server and client identities.
pub trait KeyGenerator {
    fn keypair(&self) -> Result<Keypair, Box<dyn std::error::Error>>;
    fn preshared_key(&self) -> Result<String, Box<dyn std::error::Error>>;
}

/// Generates WireGuard-compatible x25519 keys in process.
pub struct X25519KeyGenerator;

impl KeyGenerator for X25519KeyGenerator {
    fn keypair(&self) -> Result<Keypair, Box<dyn std::error::Error>> {
        let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok(Keypair {
            private_b64: general_purpose::STANDARD.encode(secret.to_bytes()),
            public_b64: general_purpose::STANDARD.encode(public.as_bytes()),
        })
    }

    fn preshared_key(&self) -> Result<String, Box<dyn std::error::Error>> {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Ok(general_purpose::STANDARD.encode(bytes))
    }
}
