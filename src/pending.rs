use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

/// Capacity of the pending record. Entries past this are dropped silently;
/// the handler may not allocate or report.
pub const CAPACITY: usize = 256;

/// One child-state transition observed by the `SIGCHLD` handler but not yet
/// applied to the job table.
struct Slot {
    pid: AtomicI32,
    status: AtomicI32,
}

impl Slot {
    const fn empty() -> Self {
        Slot {
            pid: AtomicI32::new(0),
            status: AtomicI32::new(0),
        }
    }
}

/// Single-producer / single-consumer record of `(pid, raw_status)` pairs.
///
/// The producer is the `SIGCHLD` handler, the consumer is the shell main
/// path. Slot contents are written before the length is published
/// (release store); the consumer reads the length with an acquire load, so
/// it never observes a partially-written entry. The consumer must hold
/// `SIGCHLD` blocked while draining so the length reset cannot race a
/// concurrent push.
pub struct PendingQueue {
    slots: [Slot; CAPACITY],
    len: AtomicUsize,
}

impl PendingQueue {
    pub const fn new() -> Self {
        const EMPTY: Slot = Slot::empty();
        PendingQueue {
            slots: [EMPTY; CAPACITY],
            len: AtomicUsize::new(0),
        }
    }

    /// Append one entry. Called from the signal handler only: no allocation,
    /// no locking, no I/O. A full record drops the entry.
    pub fn push(&self, pid: libc::pid_t, status: libc::c_int) {
        let len = self.len.load(Ordering::Relaxed);
        if len >= CAPACITY {
            return;
        }
        self.slots[len].pid.store(pid, Ordering::Relaxed);
        self.slots[len].status.store(status, Ordering::Relaxed);
        self.len.store(len + 1, Ordering::Release);
    }

    /// Hand every recorded entry to `apply` in arrival order, then reset.
    pub fn drain(&self, mut apply: impl FnMut(libc::pid_t, libc::c_int)) {
        let len = self.len.load(Ordering::Acquire).min(CAPACITY);
        for slot in &self.slots[..len] {
            apply(
                slot.pid.load(Ordering::Relaxed),
                slot.status.load(Ordering::Relaxed),
            );
        }
        self.len.store(0, Ordering::Release);
    }
}

/// The record written by the shell's `SIGCHLD` handler.
pub static PENDING: PendingQueue = PendingQueue::new();
