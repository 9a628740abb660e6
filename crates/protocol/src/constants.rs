/// Bytes per socket write. The final write of a file may be shorter.
pub const CHUNK_SIZE: usize = 8192;

/// How long a server waits for a peer to connect (90 s).
pub const DEFAULT_SERVER_TIMEOUT_MILLIS: u64 = 90_000;

/// How long a client waits for its connect attempt (2 s).
pub const DEFAULT_CLIENT_TIMEOUT_MILLIS: u64 = 2_000;
