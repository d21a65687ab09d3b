mod batch_allocator;
mod dir_cleaner;
mod file_lock;
mod file_mover;
mod file_scanner;
mod ledger;
mod path_validator;

pub use batch_allocator::{allocate_batch_folder, batch_folder_name};
pub use dir_cleaner::remove_empty_subdirectories;
pub use file_lock::LockProbe;
pub use file_mover::{FileMover, FsRelocator, MoveResult, Relocator, unique_destination};
pub use file_scanner::{Candidate, EligibilityFilter, ScanResult, SourceScan};
pub use ledger::Ledger;
pub use path_validator::{PathError, ensure_directory_exists, validate_directory_exists};
