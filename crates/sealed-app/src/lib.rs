//! Repository façade for applications: every read is decrypted, verified
//! against its signature, decorated and masked; every write is validated,
//! encrypted, signed and masked before control returns to the caller.

mod error;
mod mapping;
mod store;

pub use error::{Error, ErrorKind};
pub use store::ApplicationStore;
