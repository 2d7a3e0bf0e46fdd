//! Global parameter library
//!
//! Parameters are defined once, in named groups, and shared by every
//! solution that references those groups. The library lives in a single
//! YAML file in the configuration directory.
//!
//! ```text
//! groups:
//!   drilling:
//!     description: Drilling cycle parameters
//!     items:
//!       depth:
//!         type: number
//!         default: 12.5
//!         min: 0.5
//!         unit: mm
//! ```

mod document;
mod model;
mod store;

pub use model::{
    is_identifier, GlobalParameter, GlobalParameterGroup, ParameterLibrary, ParameterType, SelectOption,
};
pub use store::{LibraryInfo, LibraryStore, BACKUP_SUFFIX, LIBRARY_FILE_NAME};
