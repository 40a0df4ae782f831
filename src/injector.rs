//! Auxiliary-thread entry point for incoming packets.

use crate::{Error, Result};
use tjost_core::{Destination, Diagnostic, DiagnosticSender, PipeProducer, Timestamper};
use tjost_osc::{unroll, FrameDecoder, NtpTime, UnrollHandler, UnrollMode};

/// Feeds validated packets from an I/O thread into a host pipe.
///
/// Obtained from [`Host::injector`](crate::Host::injector). Time tags are converted to
/// frames here, off the real-time thread; the host only copies finished records into
/// its queue. Never blocks: records that do not fit are dropped and reported.
pub struct PacketInjector {
    producer: PipeProducer,
    timestamper: Timestamper,
    diagnostics: DiagnosticSender,
    destination: Destination,
    mode: UnrollMode,
    max_frame_len: usize,
    malformed: u64,
    dropped: u64,
}

impl PacketInjector {
    pub(crate) fn new(
        producer: PipeProducer,
        timestamper: Timestamper,
        diagnostics: DiagnosticSender,
        destination: Destination,
        max_frame_len: usize,
    ) -> Self {
        Self {
            producer,
            timestamper,
            diagnostics,
            destination,
            mode: UnrollMode::Full,
            max_frame_len,
            malformed: 0,
            dropped: 0,
        }
    }

    /// Default: [`UnrollMode::Full`]
    pub fn with_mode(mut self, mode: UnrollMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate, unroll and forward one packet, then wake the host.
    ///
    /// Returns the number of records written. A malformed packet is discarded whole
    /// and reported; items that do not fit in the pipe are dropped individually.
    pub fn inject(&mut self, packet: &[u8]) -> Result<usize> {
        let mut sink = PipeSink {
            producer: &mut self.producer,
            timestamper: &self.timestamper,
            diagnostics: &mut self.diagnostics,
            destination: self.destination,
            written: 0,
            dropped: 0,
        };
        let outcome = unroll(packet, self.mode, &mut sink);
        let (written, dropped) = (sink.written, sink.dropped);
        self.dropped += dropped;

        if let Err(error) = outcome {
            self.malformed += 1;
            self.diagnostics.send(Diagnostic::MalformedPacket {
                error,
                len: packet.len(),
            });
            return Err(Error::Osc(error));
        }
        if written > 0 {
            self.producer.flush();
        }
        Ok(written)
    }

    /// Inject every complete frame buffered in `decoder`.
    ///
    /// Malformed frames are skipped; an oversized length prefix clears the decoder and
    /// is returned as an error, since the stream can no longer be trusted.
    pub fn inject_frames(&mut self, decoder: &mut FrameDecoder) -> Result<usize> {
        let mut written = 0;
        while let Some(frame) = decoder.next_frame()? {
            match self.inject(frame) {
                Ok(n) => written += n,
                Err(Error::Osc(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// A decoder for stream carriers, bounded by the configured frame size.
    pub fn frame_decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.max_frame_len)
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Packets discarded as malformed.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// Items dropped for lack of pipe space or oversize.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

struct PipeSink<'a> {
    producer: &'a mut PipeProducer,
    timestamper: &'a Timestamper,
    diagnostics: &'a mut DiagnosticSender,
    destination: Destination,
    written: usize,
    dropped: u64,
}

impl UnrollHandler for PipeSink<'_> {
    fn timestamp(&mut self, time: NtpTime) -> u64 {
        self.timestamper.frames_for(time)
    }

    fn message(&mut self, time: u64, bytes: &[u8]) {
        match self.producer.produce(self.destination, time, bytes) {
            Ok(()) => self.written += 1,
            Err(error) => {
                self.dropped += 1;
                let diagnostic = match error {
                    tjost_core::Error::PipeOverflow { needed, available } => {
                        Diagnostic::PipeOverflow { needed, available }
                    }
                    _ => Diagnostic::PoolExhausted { size: bytes.len() },
                };
                self.diagnostics.send(diagnostic);
            }
        }
    }

    fn bundle(&mut self, time: u64, bytes: &[u8]) {
        self.message(time, bytes);
    }
}
