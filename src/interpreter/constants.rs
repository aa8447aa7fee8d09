// Constants for the interpreter

/// Smallest pool size class in bytes; classes double from here
pub const POOL_MIN_CLASS_BYTES: usize = 16;

/// Number of pooled size classes (16 B .. 64 KiB)
pub const POOL_CLASS_COUNT: usize = 13;

/// Maximum frame depth before a Stack error is raised
pub const DEFAULT_STACK_LIMIT: usize = 1024;

/// Bytes allocated since the last collection before the next one is due
pub const DEFAULT_GC_BALLAST: usize = 1024 * 1024;

/// Memory budget for inspector snapshots
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 64 * 1024 * 1024;

/// Initial capacity of a freshly loaded or copied array
pub const MIN_SERIES_CAPACITY: usize = 4;

/// Longest rendering of a `near` fragment in error reports
pub const NEAR_MOLD_LIMIT: usize = 60;

/// Largest single series buffer, in bytes
pub const MAX_SERIES_BYTES: usize = 1 << 30;

/// Remaining native stack below which nested evaluation grows a new segment
pub const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each native stack segment grown for nested evaluation
pub const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Deepest block nesting the scanner accepts and comparison descends
pub const MAX_NESTING: usize = 10_000;

/// Native stack size for the interpreter thread spawned by the CLI
pub const INTERPRETER_THREAD_STACK: usize = 64 * 1024 * 1024;

/// Upper bound on device polls before a pending operation fails
pub const DEVICE_POLL_LIMIT: usize = 10_000;
