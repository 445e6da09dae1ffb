use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2026-01-01T00:00:00Z in milliseconds since Unix epoch.
const CAREER_EPOCH_MS: u64 = 1_767_225_600_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_WORKER_ID: u64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

struct Clock {
    last_ms: u64,
    sequence: u64,
}

/// 64-bit snowflake generator for job, application and notification IDs.
///
/// Layout (MSB → LSB): 42 bits of milliseconds since the career epoch,
/// 10 bits of worker ID, 12 bits of per-millisecond sequence.
///
/// If the wall clock steps backwards the generator keeps issuing IDs from
/// the last observed millisecond, so IDs stay unique and increasing.
pub struct SnowflakeGenerator {
    worker_id: u64,
    clock: Mutex<Clock>,
}

impl SnowflakeGenerator {
    /// Returns `None` when `worker_id` does not fit in 10 bits.
    pub fn new(worker_id: u16) -> Option<Self> {
        let worker_id = u64::from(worker_id);
        if worker_id > MAX_WORKER_ID {
            return None;
        }
        Some(Self {
            worker_id,
            clock: Mutex::new(Clock {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    pub fn generate(&self) -> i64 {
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());

        let now_ms = current_ms().max(clock.last_ms);

        if now_ms == clock.last_ms {
            clock.sequence = (clock.sequence + 1) & SEQUENCE_MASK;
            if clock.sequence == 0 {
                // Sequence exhausted: borrow the next millisecond.
                clock.last_ms += 1;
            }
        } else {
            clock.sequence = 0;
            clock.last_ms = now_ms;
        }

        let ts = clock.last_ms.saturating_sub(CAREER_EPOCH_MS);
        let id = (ts << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | clock.sequence;

        id as i64
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(CAREER_EPOCH_MS)
}
