//! Cryptographic primitives for Archiva.
//!
//! This module provides authenticated encryption of backend credentials
//! using AES-256-GCM.
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Decryption failures return a single generic error

pub mod cipher;

pub use cipher::{CredentialCipher, ENCRYPTION_KEY_VAR, KEY_LENGTH, NONCE_LENGTH, TAG_LENGTH};
