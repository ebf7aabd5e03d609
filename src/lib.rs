//! CavaCRM - incident tracking data layer
//!
//! Records quality incidents raised against wineries during inspection,
//! with the verifier who caused them, the coordinators who registered and
//! follow them up, and an action history per incident. The same surface runs
//! over a local SQLite file or a hosted PostgREST table API.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          cavacrm CLI                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                     Crm (flat surface)                      ││
//! │  │  validation · failure translation · logging                 ││
//! │  └──────┬──────────────┬───────────────┬──────────────┬────────┘│
//! │         │              │               │              │         │
//! │         ▼              ▼               ▼              ▼         │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────┐ ┌────────────┐  │
//! │  │ Read Model │ │  Import /  │ │   Export     │ │  Backup /  │  │
//! │  │ (joins,    │ │  Seed      │ │ (xlsx, html) │ │  Restore   │  │
//! │  │  counts)   │ │            │ │              │ │            │  │
//! │  └──────┬─────┘ └──────┬─────┘ └──────────────┘ └──────┬─────┘  │
//! │         └──────────────┴──────────────┬────────────────┘        │
//! │                                       ▼                         │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                    Store trait (selector)                   ││
//! │  └──────────────┬────────────────────────────────┬─────────────┘│
//! │                 ▼                                ▼              │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────┐
//! │  │  LocalStore (rusqlite)      │  │  RemoteStore                │
//! │  │  foreign keys, transactions │  │  Tables: HTTP | in-memory   │
//! │  └─────────────────────────────┘  └─────────────────────────────┘
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backup;
pub mod config;
pub mod crm;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod readmodel;
pub mod seed;
pub mod selector;
pub mod store;
pub mod validation;

pub use config::{BackendChoice, Config, RemoteConfig};
pub use crm::Crm;
pub use error::{Error, Result};
pub use import::ImportReport;
pub use readmodel::{ActionRow, DashboardStats, GroupCount, IncidentRow, PendingFilter, RecordDetails};
pub use seed::SeedReport;
pub use store::{BackendKind, LocalStore, RemoteStore, Snapshot, Store};
