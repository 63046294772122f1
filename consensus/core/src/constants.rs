/// BLOCK_VERSION represents the current block version
pub const BLOCK_VERSION: u16 = 1;

/// TX_VERSION is the current latest supported transaction version
pub const TX_VERSION: u16 = 0;

/// MAX_SCRIPT_PUBLIC_KEY_VERSION is the current latest supported public key script version
pub const MAX_SCRIPT_PUBLIC_KEY_VERSION: u16 = 0;

pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000_000;

/// The number of sompi in one kyanite coin
pub const SOMPI_PER_KYANITE: u64 = 100_000_000;

/// MAX_SOMPI is the maximum transaction amount allowed in sompi
pub const MAX_SOMPI: u64 = 21_000_000_000 * SOMPI_PER_KYANITE;

/// MAX_TX_IN_SEQUENCE_NUM is the maximum sequence number a transaction
/// input's sequence field can carry
pub const MAX_TX_IN_SEQUENCE_NUM: u64 = u64::MAX;

/// SEQUENCE_LOCK_TIME_MASK extracts the relative lock time when masked
/// against a transaction input's sequence number
pub const SEQUENCE_LOCK_TIME_MASK: u64 = 0x00000000ffffffff;

/// SEQUENCE_LOCK_TIME_DISABLED is a flag that, when set on a transaction
/// input's sequence number, disables relative lock-time interpretation
pub const SEQUENCE_LOCK_TIME_DISABLED: u64 = 1 << 63;

/// UNACCEPTED_DAA_SCORE marks UtxoEntries which were created by
/// transactions in the mempool, or otherwise not-yet-accepted transactions
pub const UNACCEPTED_DAA_SCORE: u64 = u64::MAX;
