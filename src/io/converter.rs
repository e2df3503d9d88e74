use crate::{io::midi::MidiEvent, synth::message::EngineMessage, synth::voice::note_to_frequency};

/// "All Notes Off" channel mode message.
pub const CC_ALL_NOTES_OFF: u8 = 123;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Translate a MIDI event on `channel_filter` into an engine command.
///
/// A note-on with velocity 0 is a note-off, as most keyboards send it.
pub fn midi_to_message(midi: MidiEvent, channel_filter: u8) -> Option<EngineMessage> {
    if midi.channel() != channel_filter {
        return None;
    }

    match midi {
        MidiEvent::NoteOn { key, velocity: 0, .. } | MidiEvent::NoteOff { key, .. } => {
            Some(EngineMessage::NoteOff { note: key as i32 })
        }
        MidiEvent::NoteOn { key, .. } => Some(EngineMessage::NoteOn { note: key as i32 }),
        MidiEvent::ControlChange {
            controller: CC_ALL_NOTES_OFF,
            ..
        } => Some(EngineMessage::StopAll),
        _ => None,
    }
}

pub fn midi_note_to_freq(note: i32) -> f64 {
    note_to_frequency(note)
}

/// Scientific pitch name, middle C (60) = "C4".
pub fn note_name(note: i32) -> String {
    let pitch_class = note.rem_euclid(12) as usize;
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}
