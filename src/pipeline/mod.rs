//! Pipeline orchestration for both tools

pub mod backup;
pub mod cancel;
pub mod convert;
pub mod organize;
pub mod relocate;
pub mod summary;

pub use backup::{prepare_backups, BackupSet};
pub use cancel::CancelFlag;
pub use convert::{ConvertReport, Converter};
pub use organize::{extension_counts, resolve_selection, OrganizeReport, Organizer};
pub use relocate::{move_file, same_location, unique_target, Relocation};
pub use summary::{FailedJob, OrganizeSummary, RunSummary};
