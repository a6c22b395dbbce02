//! Field group documents for the YAP custom fields engine
//!
//! This crate provides the portable form of a field group and a
//! file-system sync directory:
//!
//! - **Documents**: a group's fields as a tree, its location rules and
//!   flexible content layouts, serialised as JSON or YAML
//! - **Change detection**: a content hash compared against the hash
//!   recorded at the last import
//! - **Sync directory**: one document per group, loaded and saved with
//!   Tokio file I/O
//!
//! # Quick Start
//!
//! ```no_run
//! use yap_repository::{FileSystemRepository, GroupRepository, SyncStatus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repo = FileSystemRepository::new("field-groups")?;
//!
//!     for document in repo.load_all().await? {
//!         if document.sync_status(None)? == SyncStatus::New {
//!             println!("{} has never been imported", document.group_name);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod file_system;
pub mod traits;

pub use document::{FieldDocument, GroupDocument, LocationDocument, SyncStatus, DOCUMENT_VERSION};
pub use error::{RepositoryError, RepositoryResult};
pub use file_system::FileSystemRepository;
pub use traits::GroupRepository;
