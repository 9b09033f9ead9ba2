//! Interrupt-to-engine completion handshake.
//!
//! Each PIO block has one slot. A camera binds the slot at init and unbinds it at terminate; the
//! frame-done interrupt looks the slot up and marks the bound ticket complete. Tickets and slots
//! are statics and only change through atomic operations, so the interrupt handler never touches
//! the camera itself.

use crate::hw::Block;
use core::ptr;
use portable_atomic::{AtomicPtr, AtomicU8, Ordering};

/// Where a capture is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TicketState {
    Idle = 0,
    Armed = 1,
    Complete = 2,
}

impl TicketState {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => TicketState::Armed,
            2 => TicketState::Complete,
            _ => TicketState::Idle,
        }
    }
}

/// Capture state shared between normal context and the frame-done interrupt.
pub struct CaptureTicket {
    state: AtomicU8,
}

impl CaptureTicket {
    const fn new() -> Self {
        CaptureTicket {
            state: AtomicU8::new(TicketState::Idle as u8),
        }
    }

    pub fn state(&self) -> TicketState {
        TicketState::from_bits(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: TicketState, to: TicketState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Idle -> Armed`. Fails if a capture is outstanding.
    pub fn arm(&self) -> bool {
        self.transition(TicketState::Idle, TicketState::Armed)
    }

    /// `Armed -> Complete`. A no-op in any other state.
    pub fn complete(&self) -> bool {
        self.transition(TicketState::Armed, TicketState::Complete)
    }

    /// `Complete -> Idle`. Returns whether a completed capture was consumed.
    pub fn take_complete(&self) -> bool {
        self.transition(TicketState::Complete, TicketState::Idle)
    }

    /// Force the ticket back to idle after the hardware has been stopped.
    pub fn reset(&self) {
        self.state.store(TicketState::Idle as u8, Ordering::Release);
    }
}

static TICKETS: [CaptureTicket; 2] = [CaptureTicket::new(), CaptureTicket::new()];

static SLOTS: [AtomicPtr<CaptureTicket>; 2] = [
    AtomicPtr::new(ptr::null_mut()),
    AtomicPtr::new(ptr::null_mut()),
];

/// Claim the slot for `block`. Returns `None` if it is already bound.
pub(crate) fn bind(block: Block) -> Option<&'static CaptureTicket> {
    let ticket = &TICKETS[block.index()];
    let raw = ticket as *const CaptureTicket as *mut CaptureTicket;

    SLOTS[block.index()]
        .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
        .ok()?;

    ticket.reset();
    Some(ticket)
}

/// Release the slot for `block`. Interrupts arriving afterwards are ignored.
pub(crate) fn unbind(block: Block) {
    SLOTS[block.index()].store(ptr::null_mut(), Ordering::Release);
}

/// Called from the frame-done interrupt of `block`. Marks the armed capture complete and returns
/// whether there was one; spurious or late signals change nothing.
pub fn signal_frame_done(block: Block) -> bool {
    let raw = SLOTS[block.index()].load(Ordering::Acquire);
    if raw.is_null() {
        return false;
    }

    // Slots only ever point at `TICKETS`
    let ticket = unsafe { &*raw };
    ticket.complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn slot_binds_once() {
        let ticket = bind(Block::Pio1).unwrap();
        assert!(bind(Block::Pio1).is_none());
        assert_eq!(ticket.state(), TicketState::Idle);

        unbind(Block::Pio1);
        assert!(bind(Block::Pio1).is_some());
        unbind(Block::Pio1);
    }

    #[test]
    #[serial]
    fn signal_only_completes_armed_ticket() {
        let ticket = bind(Block::Pio1).unwrap();

        // Spurious
        assert!(!signal_frame_done(Block::Pio1));
        assert_eq!(ticket.state(), TicketState::Idle);

        assert!(ticket.arm());
        assert!(!ticket.arm());
        assert!(signal_frame_done(Block::Pio1));
        assert!(!signal_frame_done(Block::Pio1));
        assert_eq!(ticket.state(), TicketState::Complete);

        assert!(ticket.take_complete());
        assert_eq!(ticket.state(), TicketState::Idle);
        unbind(Block::Pio1);
    }

    #[test]
    #[serial]
    fn unbound_slot_ignores_signal() {
        let ticket = bind(Block::Pio1).unwrap();
        assert!(ticket.arm());
        unbind(Block::Pio1);

        assert!(!signal_frame_done(Block::Pio1));
        assert_eq!(ticket.state(), TicketState::Armed);
        ticket.reset();
    }
}
