//! Data types exchanged between the walioss transfer engine and its front ends.
//!
//! Everything here is plain serde data. The JSON shape of [`TransferUpdate`]
//! is the `transfer:update` event payload consumed by the desktop UI, so
//! field names and omission rules must stay stable.

pub mod settings;
pub mod types;

pub use settings::{AppSettings, OssConfig, normalize_endpoint, normalize_region};
pub use types::{ToolStatus, TransferKind, TransferStatus, TransferUpdate};
