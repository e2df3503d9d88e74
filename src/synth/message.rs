use rtrb::{Consumer, Producer, RingBuffer};

use crate::{synth::params::ParamChange, EngineError};

/// Commands a control thread (UI, MIDI) sends to the engine on the audio
/// thread.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EngineMessage {
    NoteOn { note: i32 },
    NoteOff { note: i32 },
    StopAll,
    Toggle,
    Set(ParamChange),
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<EngineMessage>;
}

impl MessageReceiver for Consumer<EngineMessage> {
    fn pop(&mut self) -> Option<EngineMessage> {
        Consumer::pop(self).ok()
    }
}

/// Sending half of the engine's command queue.
pub struct EngineHandle {
    tx: Producer<EngineMessage>,
}

impl EngineHandle {
    /// Create a queue of `capacity` messages. The consumer goes to
    /// [`Engine::process_messages`](crate::Engine::process_messages).
    pub fn channel(capacity: usize) -> (Self, Consumer<EngineMessage>) {
        let (tx, rx) = RingBuffer::new(capacity);
        (Self { tx }, rx)
    }

    pub fn send(&mut self, msg: EngineMessage) -> Result<(), EngineError> {
        self.tx.push(msg).map_err(|_| EngineError::QueueFull)
    }

    pub fn note_on(&mut self, note: i32) -> Result<(), EngineError> {
        self.send(EngineMessage::NoteOn { note })
    }

    pub fn note_off(&mut self, note: i32) -> Result<(), EngineError> {
        self.send(EngineMessage::NoteOff { note })
    }

    pub fn stop_all(&mut self) -> Result<(), EngineError> {
        self.send(EngineMessage::StopAll)
    }

    pub fn toggle(&mut self) -> Result<(), EngineError> {
        self.send(EngineMessage::Toggle)
    }

    /// Validated on this side, so bad values never reach the audio thread.
    pub fn set(&mut self, change: ParamChange) -> Result<(), EngineError> {
        change.validate()?;
        self.send(EngineMessage::Set(change))
    }

    pub fn slots(&self) -> usize {
        self.tx.slots()
    }
}
