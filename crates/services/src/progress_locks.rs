use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use course_core::model::{CourseId, UserId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Per-(user, course) async locks serializing load, mutate and save of one
/// progress tree within this process.
#[derive(Clone, Default)]
pub struct ProgressLocks {
    slots: Arc<Mutex<HashMap<(UserId, CourseId), Slot>>>,
}

impl ProgressLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the progress of `user_id` in `course_id`.
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn lock(&self, user_id: UserId, course_id: CourseId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // idle slots are only referenced by the map
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry((user_id, course_id)).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of keys currently locked or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
