//! Single-assignment completion flag shared by the two progress channels.

use std::sync::atomic::{AtomicU8, Ordering};

/// Which channel observed completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stream,
    Poll,
}

const OPEN: u8 = 0;
const BY_STREAM: u8 = 1;
const BY_POLL: u8 = 2;

/// Check-and-set guard: the first channel to claim it triggers finalize,
/// every later claim is discarded.
#[derive(Debug, Default)]
pub struct FinalizeLatch {
    state: AtomicU8,
}

impl FinalizeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the first claim.
    pub fn claim(&self, by: Channel) -> bool {
        let tag = match by {
            Channel::Stream => BY_STREAM,
            Channel::Poll => BY_POLL,
        };
        self.state
            .compare_exchange(OPEN, tag, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    /// Channel that won the claim, if any.
    pub fn winner(&self) -> Option<Channel> {
        match self.state.load(Ordering::Acquire) {
            BY_STREAM => Some(Channel::Stream),
            BY_POLL => Some(Channel::Poll),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_claim_wins() {
        let latch = FinalizeLatch::new();
        assert!(!latch.is_claimed());
        assert!(latch.claim(Channel::Poll));
        assert!(!latch.claim(Channel::Stream));
        assert!(!latch.claim(Channel::Poll));
        assert_eq!(latch.winner(), Some(Channel::Poll));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let latch = Arc::new(FinalizeLatch::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || {
                    latch.claim(if i % 2 == 0 { Channel::Stream } else { Channel::Poll })
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert!(latch.winner().is_some());
    }
}
