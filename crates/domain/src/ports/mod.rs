//! Interfaces of the external collaborators the scan engine drives.

mod traits;

pub use traits::*;
