/// Seconds between consecutive execution-layer blocks.
pub const SLOT_TIME_SECONDS: u64 = 12;

/// Execution-layer blocks produced in one day.
pub const BLOCKS_IN_ONE_DAY: u64 = 24 * 60 * 60 / SLOT_TIME_SECONDS;

/// Messages older than this many blocks behind the head are stale.
pub const MESSAGE_STALENESS_WINDOW_BLOCKS: u64 = 200;

/// Widest block range a single on-chain log scan may cover.
pub const STANDARD_LOG_OFFSET: u64 = 256;

/// Upper bound on messages drained from a transport in one fetch.
pub const MAX_MESSAGES_PER_FETCH: usize = 1000;

/// Page size for base-fee history requests.
pub const FEE_HISTORY_REQUEST_SIZE: u64 = 1024;

/// Blocks a transaction submission is given before it is declared lost.
pub const SUBMISSION_TIMEOUT_IN_BLOCKS: u64 = 6;
