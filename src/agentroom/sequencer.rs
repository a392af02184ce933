//! Message id allocation.
//!
//! The sequencer hands out a single gap-free, strictly increasing sequence of
//! ids. A turn reserves its id before the completion request starts so that
//! streaming presentation can be tied to the eventual message from the first
//! token on; if the turn is cancelled the reservation is released and the id
//! is handed out again.

/// An id taken ahead of the message that will carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    id: u64,
}

impl Reservation {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageSequencer {
    next: u64,
}

impl MessageSequencer {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Continue after previously persisted ids, so the next id is `last + 1`.
    pub fn resume_after(last: Option<u64>) -> Self {
        Self {
            next: last.map_or(0, |id| id + 1),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Id the next allocation will return, without taking it.
    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn reserve(&mut self) -> Reservation {
        Reservation { id: self.next_id() }
    }

    /// Consume a reservation, returning the id for the message that uses it.
    pub fn commit(&mut self, reservation: Reservation) -> u64 {
        reservation.id
    }

    /// Give a reservation back. Only the most recent allocation can be rolled
    /// back; anything older is left as is and logged.
    pub fn release(&mut self, reservation: Reservation) {
        if reservation.id + 1 == self.next {
            self.next = reservation.id;
        } else {
            log::warn!(
                "agentroom::sequencer::release(...): id {} is not the latest allocation (next = {}), leaving it consumed",
                reservation.id,
                self.next
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_consecutive() {
        let mut seq = MessageSequencer::new();
        let ids: Vec<u64> = (0..5).map(|_| seq.next_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_release_rolls_back_latest_reservation() {
        let mut seq = MessageSequencer::new();
        seq.next_id();
        let r = seq.reserve();
        assert_eq!(r.id(), 1);
        seq.release(r);
        assert_eq!(seq.next_id(), 1);
    }

    #[test]
    fn test_commit_keeps_reserved_id() {
        let mut seq = MessageSequencer::new();
        let r = seq.reserve();
        assert_eq!(seq.commit(r), 0);
        assert_eq!(seq.next_id(), 1);
    }

    #[test]
    fn test_resume_after_persisted_ids() {
        let mut seq = MessageSequencer::resume_after(Some(41));
        assert_eq!(seq.next_id(), 42);
        assert_eq!(MessageSequencer::resume_after(None).peek(), 0);
    }
}
