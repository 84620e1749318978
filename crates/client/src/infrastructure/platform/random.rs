//! Id generation.

use uuid::Uuid;

use crate::ports::outbound::RandomPort;

/// System random - time-ordered UUIDs.
///
/// Version 7 ids start with the millisecond timestamp and end in random bits, so
/// they sort by creation time and collide only with negligible probability.
#[derive(Clone, Default)]
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl RandomPort for SystemRandom {
    fn gen_uuid(&self) -> Uuid {
        Uuid::now_v7()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_v7_uuids() {
        let random = SystemRandom::new();
        let first = random.gen_uuid();
        let second = random.gen_uuid();

        assert_ne!(first, second);
        assert_eq!(first.get_version_num(), 7);
        assert_eq!(first.to_string().len(), 36);
    }
}
