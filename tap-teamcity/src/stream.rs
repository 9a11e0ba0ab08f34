//! Stream adapter
//!
//! [`TapTeamCity`] is the single object callers interact with: raw TAP bytes
//! go in through [`std::io::Write`] (or [`TapTeamCity::write_input`]) and
//! TeamCity text comes out chunk by chunk, or through [`std::io::Read`].
//! The adapter only wires the tokenizer, the router and the output buffer
//! together; all conversion logic lives in those components.

use crate::config::ReporterConfig;
use crate::output::OutputBuffer;
use crate::parser::TapParser;
use crate::router::EventRouter;
use crate::types::{Result, Summary, TapEvent, TapTeamCityError};
use std::io::{self, Read, Write};

/// Bidirectional TAP to TeamCity converter
#[derive(Debug)]
pub struct TapTeamCity {
    parser: TapParser,
    router: EventRouter,
    output: OutputBuffer,
    /// Bytes of a chunk partially handed out through `Read`
    unread: Vec<u8>,
    summary: Option<Summary>,
    closed: bool,
}

impl TapTeamCity {
    pub fn new() -> Self {
        Self::with_config(&ReporterConfig::default())
    }

    pub fn with_config(config: &ReporterConfig) -> Self {
        Self {
            parser: TapParser::new(),
            router: EventRouter::with_config(config),
            output: OutputBuffer::new(),
            unread: Vec::new(),
            summary: None,
            closed: false,
        }
    }

    /// True once any assertion failed. Never reset.
    pub fn failed(&self) -> bool {
        self.router.failed()
    }

    /// Totals of the TAP stream, available after [`TapTeamCity::end_input`]
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Feed raw TAP bytes. Chunk boundaries may fall anywhere.
    pub fn write_input(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TapTeamCityError::StreamClosed);
        }
        let events = self.parser.push(bytes);
        self.route(events);
        Ok(())
    }

    /// Signal end of input: closes the last test and ends the output
    pub fn end_input(&mut self) -> Result<()> {
        if self.closed {
            return Err(TapTeamCityError::StreamClosed);
        }
        self.closed = true;
        let events = self.parser.finish();
        self.route(events);
        Ok(())
    }

    /// Stop processing without finishing the stream
    ///
    /// Buffered input is discarded and no closing messages are emitted for
    /// the open test or assertion. Output already produced stays readable.
    pub fn destroy(&mut self) {
        if !self.closed {
            log::debug!("Stream destroyed before end of input");
        }
        self.closed = true;
        self.parser = TapParser::new();
    }

    /// True when input was closed and every output byte was consumed
    pub fn is_ended(&self) -> bool {
        self.closed && self.unread.is_empty() && self.output.is_empty()
    }

    /// Take the next emitted chunk, if any
    pub fn read_chunk(&mut self) -> Option<String> {
        self.output.pop()
    }

    /// Take every emitted chunk in order
    pub fn drain_chunks(&mut self) -> std::collections::vec_deque::Drain<'_, String> {
        self.output.drain()
    }

    fn route(&mut self, events: Vec<TapEvent>) {
        for event in events {
            if let TapEvent::Output(summary) = &event {
                self.summary = Some(summary.clone());
            }
            self.router.dispatch(event, &mut self.output);
        }
    }
}

impl Default for TapTeamCity {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for TapTeamCity {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_input(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for TapTeamCity {
    /// Returns `Ok(0)` once the stream has ended and everything was read,
    /// and `WouldBlock` while more output may still arrive.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.unread.is_empty() {
            match self.output.pop() {
                Some(chunk) => self.unread = chunk.into_bytes(),
                None if self.closed => return Ok(0),
                None => return Err(io::ErrorKind::WouldBlock.into()),
            }
        }

        let n = self.unread.len().min(buf.len());
        buf[..n].copy_from_slice(&self.unread[..n]);
        self.unread.drain(..n);
        Ok(n)
    }
}

/// Result of a complete [`transform`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// True if any assertion failed
    pub failed: bool,
    pub summary: Summary,
}

/// Convert everything readable from `input` and write it to `output`
///
/// Input is read one block at a time; the next block is only read once the
/// output produced by the previous one was written and flushed.
pub fn transform<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    config: &ReporterConfig,
) -> Result<Outcome> {
    config.validate()?;

    let mut stream = TapTeamCity::with_config(config);
    let mut buffer = vec![0u8; config.read_buffer_size];

    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        stream.write_input(&buffer[..read])?;
        write_pending(&mut stream, &mut output)?;
    }

    stream.end_input()?;
    write_pending(&mut stream, &mut output)?;

    Ok(Outcome {
        failed: stream.failed(),
        summary: stream.summary().cloned().unwrap_or_default(),
    })
}

fn write_pending<W: Write>(stream: &mut TapTeamCity, output: &mut W) -> Result<()> {
    let mut wrote = false;
    for chunk in stream.drain_chunks() {
        output.write_all(chunk.as_bytes())?;
        wrote = true;
    }
    if wrote {
        output.flush()?;
    }
    Ok(())
}
