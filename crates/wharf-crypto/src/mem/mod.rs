//! Memory safety utilities for cryptographic operations
//!
//! This module provides secure memory handling and protection against
//! memory dumps.

pub mod secure_buf;
pub mod wipe;

pub use secure_buf::SecureBuf;
pub use wipe::{lock_memory, prevent_core_dumps, wipe_on_drop};
