//! Crypto boundary for sealed records: key material, the signing/encryption
//! provider, the canonical-form signer and the per-field codec.
//! Keys come from the OS keyring in production (or test doubles).

pub mod codec;
pub mod key_provider;
pub mod provider;
pub mod signer;

pub use codec::{DecryptMode, FieldAad, FieldCodec, SealedField};
pub use key_provider::{
    generate_encoded_key, InMemoryKeyProvider, KeyError, KeyMaterial, KeyProvider,
    KeyringProvider, StaticKeyProvider,
};
pub use provider::{CryptoError, CryptoProvider, LocalCrypto};
pub use signer::{Signature, Signer};
