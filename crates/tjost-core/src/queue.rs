//! Time-ordered event queue drained once per period.
//!
//! Events live in a fixed arena threaded by a doubly linked list in time order, with
//! a free list through the unused slots. Insertion scans from the tail, so events
//! scheduled in roughly ascending time cost O(1); removal through an
//! [`EventHandle`] is O(1) anywhere in the list.

use crate::{Destination, Diagnostic, DiagnosticSender, Event, IMMEDIATE};

const NIL: u32 = u32::MAX;

/// Identifies a pending event for [`EventQueue::cancel`].
///
/// Handles go stale once their event is drained or cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    index: u32,
    generation: u32,
}

/// Returned by [`EventQueue::schedule`] when the arena is full, handing the event
/// back so its payload can be recycled.
#[derive(Debug)]
pub struct QueueFull(pub Event);

struct Slot {
    event: Option<Event>,
    time: u64,
    generation: u32,
    prev: u32,
    next: u32,
}

pub struct EventQueue {
    slots: Vec<Slot>,
    free: u32,
    head: u32,
    tail: u32,
    len: usize,
}

impl EventQueue {
    /// Allocate an arena for `capacity` pending events.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(NIL as usize - 1);
        let slots = (0..capacity)
            .map(|i| Slot {
                event: None,
                time: 0,
                generation: 0,
                prev: NIL,
                next: if i + 1 < capacity { (i + 1) as u32 } else { NIL },
            })
            .collect();
        Self {
            slots,
            free: if capacity > 0 { 0 } else { NIL },
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&self) -> Option<u64> {
        (self.head != NIL).then(|| self.slots[self.head as usize].time)
    }

    /// Insert in time order. Events with equal times keep their scheduling order.
    pub fn schedule(&mut self, event: Event) -> Result<EventHandle, QueueFull> {
        if self.free == NIL {
            return Err(QueueFull(event));
        }
        let index = self.free;
        let time = event.time;

        // last node not later than `time`
        let mut after = self.tail;
        while after != NIL && self.slots[after as usize].time > time {
            after = self.slots[after as usize].prev;
        }
        let before = if after == NIL {
            self.head
        } else {
            self.slots[after as usize].next
        };

        let slot = &mut self.slots[index as usize];
        self.free = slot.next;
        slot.event = Some(event);
        slot.time = time;
        slot.prev = after;
        slot.next = before;
        let generation = slot.generation;

        if after == NIL {
            self.head = index;
        } else {
            self.slots[after as usize].next = index;
        }
        if before == NIL {
            self.tail = index;
        } else {
            self.slots[before as usize].prev = index;
        }
        self.len += 1;

        Ok(EventHandle { index, generation })
    }

    /// Remove a pending event before it is dispatched.
    pub fn cancel(&mut self, handle: EventHandle) -> Option<Event> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation || slot.event.is_none() {
            return None;
        }
        self.unlink(handle.index)
    }

    /// Dispatch every event due before `current + period`, in time order.
    ///
    /// Immediate events run at `current`. Events already in the past also run at
    /// `current`, each reported once as [`Diagnostic::LateEvent`]. Returns the number
    /// of events dispatched.
    pub fn drain<F>(
        &mut self,
        current: u64,
        period: u64,
        diagnostics: &mut DiagnosticSender,
        mut dispatch: F,
    ) -> usize
    where
        F: FnMut(Event),
    {
        let horizon = current.saturating_add(period);
        let mut count = 0;
        while self.head != NIL {
            let time = self.slots[self.head as usize].time;
            if time >= horizon {
                break;
            }
            let Some(mut event) = self.unlink(self.head) else {
                break;
            };
            if time == IMMEDIATE {
                event.time = current;
            } else if time < current {
                diagnostics.send(Diagnostic::LateEvent {
                    destination: event.destination,
                    scheduled: time,
                    current,
                });
                event.time = current;
            }
            dispatch(event);
            count += 1;
        }
        count
    }

    /// Remove every pending event matching `predicate` without dispatching it.
    pub fn remove_where<P, R>(&mut self, mut predicate: P, mut release: R) -> usize
    where
        P: FnMut(&Event) -> bool,
        R: FnMut(Event),
    {
        let mut removed = 0;
        let mut cursor = self.head;
        while cursor != NIL {
            let next = self.slots[cursor as usize].next;
            let matches = self.slots[cursor as usize]
                .event
                .as_ref()
                .is_some_and(&mut predicate);
            if matches {
                if let Some(event) = self.unlink(cursor) {
                    release(event);
                    removed += 1;
                }
            }
            cursor = next;
        }
        removed
    }

    /// Drop every event addressed to `destination`.
    pub fn remove_destination<R>(&mut self, destination: Destination, release: R) -> usize
    where
        R: FnMut(Event),
    {
        self.remove_where(|e| e.destination == destination, release)
    }

    /// Free every pending event without dispatch.
    pub fn clear<R>(&mut self, release: R) -> usize
    where
        R: FnMut(Event),
    {
        self.remove_where(|_| true, release)
    }

    /// Pending events in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            while cursor != NIL {
                let slot = &self.slots[cursor as usize];
                cursor = slot.next;
                if let Some(event) = slot.event.as_ref() {
                    return Some(event);
                }
            }
            None
        })
    }

    /// Detach a linked slot and return its event.
    fn unlink(&mut self, index: u32) -> Option<Event> {
        let (prev, next) = {
            let slot = &self.slots[index as usize];
            (slot.prev, slot.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next as usize].prev = prev;
        }

        let slot = &mut self.slots[index as usize];
        let event = slot.event.take();
        slot.generation = slot.generation.wrapping_add(1);
        slot.prev = NIL;
        slot.next = self.free;
        self.free = index;
        self.len -= 1;
        event
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("next_time", &self.peek_time())
            .finish()
    }
}
