pub mod comparator;
pub mod conflict;
pub mod engine;
pub mod matcher;
pub mod scanner;
pub mod trash;

pub use comparator::{ActionSummary, Direction, PendingOperation, Reason, Reconciler, SyncPlan};
pub use conflict::{resolve_conflicts, ConflictKind, ConflictRecord, ConflictResolution};
pub use engine::{SyncConfig, SyncEngine, SyncProgress, SyncReport, SyncSession, SyncStatus};
pub use matcher::NameMatcher;
pub use scanner::{FileRecord, FileScanner, Snapshot};
pub use trash::TrashArchiver;
