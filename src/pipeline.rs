//! Threaded receiver fed through a bounded queue.
//!
//! Sample blocks are queued to a worker thread running a `Receiver`. When the queue is
//! full the oldest queued block is dropped and counted, so a slow decoder never stalls
//! the sample source.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver as ChannelReceiver, Sender, TrySendError};
use tracing::{debug, trace};

use crate::config::ReceiverConfig;
use crate::error::{DabError, Result};
use crate::receiver::{Receiver, ReceiverEvent};
use crate::source::{SampleBlock, SampleSource};
use crate::telemetry::Telemetry;

/// Requests handled by the worker between sample blocks.
enum Command {
    Select(Option<u8>),
    Reset,
}

/// Items carried by the sample queue, in stream order.
enum Input {
    Samples(SampleBlock),
    /// The sample stream stopped.
    End,
}

fn stopped() -> DabError { DabError::WorkerUnavailable("receiver stopped".to_string()) }

/// Send the given item into a bounded queue, making room by taking the oldest items
/// out through `oldest`. Return the number of items dropped.
fn push_latest<T>(input: &Sender<T>, oldest: &ChannelReceiver<T>, item: T) -> Result<u64> {
    let mut item = item;
    let mut dropped = 0;

    loop {
        match input.try_send(item) {
            Ok(()) => return Ok(dropped),
            Err(TrySendError::Full(x)) => {
                if oldest.try_recv().is_ok() {
                    dropped += 1;
                }

                item = x;
            },
            Err(TrySendError::Disconnected(_)) => return Err(stopped()),
        }
    }
}

/// Forward the given events to the listener.
fn emit<I: IntoIterator<Item = ReceiverEvent>>(output: &Sender<ReceiverEvent>, events: I) {
    for e in events {
        if output.send(e).is_err() {
            trace!("event dropped without a listener");
        }
    }
}

/// Runs a `Receiver` on its own thread.
pub struct Pipeline {
    input: Option<Sender<Input>>,
    /// Second handle on the queue for dropping the oldest block.
    oldest: ChannelReceiver<Input>,
    control: Sender<Command>,
    events: ChannelReceiver<ReceiverEvent>,
    telemetry: Arc<Telemetry>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start a worker running a receiver with the given configuration.
    pub fn spawn(config: ReceiverConfig) -> Result<Pipeline> {
        let mut receiver = Receiver::new(config)?;
        let telemetry = receiver.telemetry();

        let (input, queue) = channel::bounded::<Input>(config.queue_depth);
        let (control, commands) = channel::unbounded::<Command>();
        let (output, events) = channel::unbounded::<ReceiverEvent>();
        let oldest = queue.clone();

        let worker = std::thread::Builder::new()
            .name("dab-receiver".to_string())
            .spawn(move || {
                let handle = |receiver: &mut Receiver, cmd: Command| match cmd {
                    Command::Select(id) => receiver.select_subchannel(id),
                    Command::Reset => receiver.reset(),
                };

                loop {
                    // Commands are handled ahead of queued blocks.
                    while let Ok(cmd) = commands.try_recv() {
                        handle(&mut receiver, cmd);
                    }

                    channel::select! {
                        recv(commands) -> cmd => if let Ok(cmd) = cmd {
                            handle(&mut receiver, cmd);
                        },
                        recv(queue) -> item => match item {
                            Ok(Input::Samples(block)) => emit(&output, receiver.feed(&block)),
                            Ok(Input::End) => emit(&output, receiver.stop()),
                            Err(_) => break,
                        },
                    }
                }

                debug!("receiver worker stopped");
            })
            .map_err(|e| DabError::WorkerUnavailable(format!("unable to start: {}", e)))?;

        Ok(Pipeline {
            input: Some(input),
            oldest: oldest,
            control: control,
            events: events,
            telemetry: telemetry,
            worker: Some(worker),
        })
    }

    /// Queue the given block, dropping the oldest queued block if the queue is full.
    pub fn push(&self, block: SampleBlock) -> Result<()> {
        let dropped = push_latest(self.input()?, &self.oldest, Input::Samples(block))?;

        if dropped > 0 {
            trace!("queue full, dropped {} blocks", dropped);
            self.telemetry.record_dropped(dropped);
        }

        Ok(())
    }

    /// Queue every block of the given source until it ends or fails, and return the
    /// reason it stopped. The receiver drops sync once it has processed the queued
    /// blocks.
    pub fn pump<S: SampleSource + ?Sized>(&self, source: &mut S) -> DabError {
        let err = loop {
            match source.next_block() {
                Ok(Some(block)) => if let Err(e) = self.push(block) {
                    return e;
                },
                Ok(None) => break DabError::EndOfStream,
                Err(DabError::SourceUnavailable(msg)) => {
                    break DabError::SourceUnavailable(msg)
                },
                Err(e) => break DabError::SourceUnavailable(e.to_string()),
            }
        };

        debug!("sample stream stopped: {}", err);

        // Queued behind the remaining blocks, and never dropped to make room.
        match self.input() {
            Ok(input) => if input.send(Input::End).is_err() {
                return stopped();
            },
            Err(e) => return e,
        }

        err
    }

    /// Choose the decoded sub-channel, effective from the next block processed.
    pub fn select_subchannel(&self, id: Option<u8>) -> Result<()> {
        self.control.send(Command::Select(id)).map_err(|_| stopped())
    }

    /// Reset the receiver, as after retuning. Blocks still queued belong to the old
    /// stream and are discarded.
    pub fn reset(&self) -> Result<()> {
        let mut discarded = 0;

        while self.oldest.try_recv().is_ok() {
            discarded += 1;
        }

        debug!("reset, discarded {} queued blocks", discarded);

        self.control.send(Command::Reset).map_err(|_| stopped())
    }

    /// Events produced by the receiver, in order.
    pub fn events(&self) -> &ChannelReceiver<ReceiverEvent> { &self.events }

    pub fn telemetry(&self) -> Arc<Telemetry> { self.telemetry.clone() }

    fn input(&self) -> Result<&Sender<Input>> {
        match self.input {
            Some(ref input) => Ok(input),
            None => Err(stopped()),
        }
    }

    /// Let the worker finish the queued blocks and wait for it to exit.
    pub fn finish(&mut self) {
        self.input = None;

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("receiver worker panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) { self.finish(); }
}
