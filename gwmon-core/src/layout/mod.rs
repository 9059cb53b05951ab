//! Monitor file layout.
//!
//! A monitor file is a metadata region followed by one label/value buffer
//! pair for the gateway and one per monitored service:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ version │ gw data ref │ svc data ref │ gateway id (1024)              │
//! │ gw labels off │ gw labels len │ gw values off │ gw values len │ N     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ service 0 name (1024) │ reserved │ ... │ service N-1 name │ reserved  │
//! │                         (padding)                                     │
//! │ quad 0: labels off │ labels len │ values off │ values len │ ... quad N-1
//! ├────────────────────────── end of metadata (64-aligned) ──────────────┤
//! │ gateway labels │ gateway values                                       │
//! │ service 0 labels │ service 0 values │ ... │ service N-1 values        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Region offset words read `0` until the owning region is published.

mod constants;
mod planner;

pub use constants::*;
pub use planner::{BufferSizes, MonitorLayout};
