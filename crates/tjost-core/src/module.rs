//! The boundary between the host and its I/O modules.

use crate::queue::QueueFull;
use crate::{
    Destination, Diagnostic, DiagnosticSender, Error, Event, EventHandle, EventQueue, ModuleId,
    PayloadPool, PoolBuffer, Result, Timestamper,
};
use tjost_osc::{encode_message, message_len, unroll, Argument, NtpTime, UnrollHandler, UnrollMode};

/// A pluggable I/O module driven by the host once per period.
///
/// Every method runs on the real-time thread and must not block.
pub trait Module: Send {
    fn name(&self) -> &str;

    /// Called at the start of a period, before the queue is drained. Input modules
    /// schedule what they received here.
    fn process_input(&mut self, ctx: &mut ProcessContext<'_>, frames: usize) {
        let _ = (ctx, frames);
    }

    /// Called after the queue is drained.
    fn process_output(&mut self, ctx: &mut ProcessContext<'_>, frames: usize) {
        let _ = (ctx, frames);
    }

    /// Receive a dispatched payload due at absolute frame `time`.
    fn deliver(&mut self, time: u64, payload: &[u8]) {
        let _ = (time, payload);
    }

    /// Called once when the module is removed from the host.
    fn teardown(&mut self) {}
}

/// Observes every dispatched event, e.g. for logging or monitoring.
pub trait EventInspector: Send {
    fn inspect(&mut self, event: &Event);
}

/// Scheduling access handed to modules during a period.
///
/// Failures are reported on the diagnostics channel as well as returned, so callers
/// may ignore them on the real-time path.
pub struct ProcessContext<'a> {
    module: Option<ModuleId>,
    frame: u64,
    frames: usize,
    queue: &'a mut EventQueue,
    pool: &'a mut PayloadPool,
    diagnostics: &'a mut DiagnosticSender,
    timestamper: &'a Timestamper,
}

impl<'a> ProcessContext<'a> {
    pub fn new(
        frame: u64,
        frames: usize,
        queue: &'a mut EventQueue,
        pool: &'a mut PayloadPool,
        diagnostics: &'a mut DiagnosticSender,
        timestamper: &'a Timestamper,
    ) -> Self {
        Self {
            module: None,
            frame,
            frames,
            queue,
            pool,
            diagnostics,
            timestamper,
        }
    }

    /// Module currently being processed.
    #[inline]
    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    pub fn set_module(&mut self, module: Option<ModuleId>) {
        self.module = module;
    }

    /// Absolute frame at the start of this period.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Absolute frame for a wall-clock time tag.
    #[inline]
    pub fn frames_for(&self, tag: NtpTime) -> u64 {
        self.timestamper.frames_for(tag)
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.send(diagnostic);
    }

    /// Take a pool buffer, reporting exhaustion.
    pub fn alloc(&mut self, len: usize) -> Result<PoolBuffer> {
        self.pool.alloc(len).inspect_err(|_| {
            self.diagnostics.send(Diagnostic::PoolExhausted { size: len });
        })
    }

    pub fn release(&mut self, buffer: PoolBuffer) {
        self.pool.release(buffer);
    }

    /// Copy `payload` into a pool buffer and queue it.
    pub fn schedule(
        &mut self,
        destination: Destination,
        time: u64,
        payload: &[u8],
    ) -> Result<EventHandle> {
        let mut buffer = self.alloc(payload.len())?;
        buffer.as_mut_slice().copy_from_slice(payload);
        self.schedule_buffer(destination, time, buffer)
    }

    /// Queue an already filled pool buffer.
    pub fn schedule_buffer(
        &mut self,
        destination: Destination,
        time: u64,
        buffer: PoolBuffer,
    ) -> Result<EventHandle> {
        match self.queue.schedule(Event::new(destination, time, buffer)) {
            Ok(handle) => Ok(handle),
            Err(QueueFull(event)) => {
                self.diagnostics
                    .send(Diagnostic::QueueFull { destination, time });
                self.pool.release(event.payload);
                Err(Error::QueueFull {
                    capacity: self.queue.capacity(),
                })
            }
        }
    }

    /// Encode a message straight into a pool buffer and queue it.
    pub fn schedule_message(
        &mut self,
        destination: Destination,
        time: u64,
        path: &str,
        args: &[Argument<'_>],
    ) -> Result<EventHandle> {
        let mut buffer = self.alloc(message_len(path, args))?;
        match encode_message(buffer.as_mut_slice(), path, args) {
            Ok(len) => {
                buffer.truncate(len);
                self.schedule_buffer(destination, time, buffer)
            }
            Err(e) => {
                self.pool.release(buffer);
                Err(e.into())
            }
        }
    }

    /// Withdraw a pending event; its payload returns to the pool.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        match self.queue.cancel(handle) {
            Some(event) => {
                self.pool.release(event.payload);
                true
            }
            None => false,
        }
    }

    /// Validate and unroll an incoming packet into the queue.
    ///
    /// Malformed packets are discarded with a [`Diagnostic::MalformedPacket`]. Returns
    /// the number of events queued; items that could not be queued are reported
    /// individually and skipped.
    pub fn inject(
        &mut self,
        destination: Destination,
        packet: &[u8],
        mode: UnrollMode,
    ) -> Result<usize> {
        let mut injection = Injection {
            ctx: self,
            destination,
            scheduled: 0,
        };
        let outcome = unroll(packet, mode, &mut injection);
        let scheduled = injection.scheduled;
        match outcome {
            Ok(()) => Ok(scheduled),
            Err(error) => {
                self.diagnostics.send(Diagnostic::MalformedPacket {
                    error,
                    len: packet.len(),
                });
                Err(error.into())
            }
        }
    }
}

struct Injection<'c, 'a> {
    ctx: &'c mut ProcessContext<'a>,
    destination: Destination,
    scheduled: usize,
}

impl UnrollHandler for Injection<'_, '_> {
    fn timestamp(&mut self, time: NtpTime) -> u64 {
        self.ctx.frames_for(time)
    }

    fn message(&mut self, time: u64, bytes: &[u8]) {
        if self.ctx.schedule(self.destination, time, bytes).is_ok() {
            self.scheduled += 1;
        }
    }

    fn bundle(&mut self, time: u64, bytes: &[u8]) {
        self.message(time, bytes);
    }
}
