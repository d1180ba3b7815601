//! Core abstractions for sealed: the plain record model, canonical forms used as
//! signing input, and the secret masking policy.
//! This crate is intentionally free of storage and crypto dependencies.

pub mod application;
pub mod canonical;
pub mod secret;
