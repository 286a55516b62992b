/// Separator used by every packed text field on the wire
/// (conversation keys and contract notes).
pub const FIELD_SEPARATOR: char = ';';

/// Read-state segment of a conversation key
pub const STATE_UNREAD: &str = "unread";
pub const STATE_READ: &str = "read";

/// Contract negotiation stage codes carried in the third notes segment
pub const STAGE_CODE_CREATED: i64 = 1;
pub const STAGE_CODE_SENT: i64 = 2;

/// Refresh cadence for open threads and the unread indicator, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
