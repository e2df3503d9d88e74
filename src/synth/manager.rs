use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
};

use tracing::{debug, warn};

use crate::{
    graph::{arena::NodeGraph, node::NodeId},
    synth::{
        params::ParameterSet,
        voice::{Voice, VoiceId},
    },
    EngineError,
};

/*
Voice Manager
=============

Two collections:

  active     note → voice, in note-on order. At most one voice per note,
             at most `polyphony` entries. The front is the steal victim.

  voices     every voice that still owns nodes: the active ones plus
             those playing out their release tail.

A note-off moves a voice out of `active` at once, so the same note can be
struck again while the old tail rings. The releasing voice is queued for
disposal at its cleanup deadline.

Pending Disposals
-----------------

A min-heap of (deadline, voice), drained once per render quantum. Entries
are never removed in place: re-timing a release pushes a fresh entry and
records the new deadline, and an entry whose deadline no longer matches
is skipped when it surfaces.
*/

pub const DEFAULT_POLYPHONY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct PendingDisposal {
    deadline: f64,
    voice: VoiceId,
}

impl PartialEq for PendingDisposal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingDisposal {}

impl PartialOrd for PendingDisposal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingDisposal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .total_cmp(&other.deadline)
            .then(self.voice.cmp(&other.voice))
    }
}

pub struct VoiceManager {
    polyphony: usize,
    next_id: u64,
    active: Vec<(i32, VoiceId)>,
    voices: HashMap<VoiceId, Voice>,
    releasing: HashMap<VoiceId, f64>,
    pending: BinaryHeap<Reverse<PendingDisposal>>,
}

impl VoiceManager {
    /// A polyphony of zero is treated as one.
    pub fn new(polyphony: usize) -> Self {
        let polyphony = polyphony.max(1);
        Self {
            polyphony,
            next_id: 0,
            active: Vec::with_capacity(polyphony),
            voices: HashMap::with_capacity(polyphony * 2),
            releasing: HashMap::new(),
            pending: BinaryHeap::new(),
        }
    }

    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Start a voice for `note`.
    ///
    /// Returns `Ok(None)` if the note is already sounding. The new voice is
    /// fully built before anything is stolen, so an error leaves the
    /// manager and the graph as they were.
    pub fn note_on(
        &mut self,
        graph: &mut NodeGraph,
        filter_input: NodeId,
        note: i32,
        now: f64,
        params: &ParameterSet,
    ) -> Result<Option<VoiceId>, EngineError> {
        if self.active_voice_id(note).is_some() {
            return Ok(None);
        }

        let id = VoiceId(self.next_id);
        let mut voice = Voice::build(graph, id, note, params, filter_input)?;
        if let Err(err) = voice.trigger(graph, now, &params.envelope) {
            voice.dispose(graph);
            return Err(err);
        }
        self.next_id += 1;

        while self.active.len() >= self.polyphony {
            let (stolen_note, stolen) = self.active.remove(0);
            debug!(note = stolen_note, voice = %stolen, "stealing oldest voice");
            self.release_voice(graph, stolen, now, params.envelope.release);
        }

        debug!(note, voice = %id, frequency = voice.frequency(), "voice started");
        self.active.push((note, id));
        self.voices.insert(id, voice);
        Ok(Some(id))
    }

    /// Release the voice playing `note`. Returns false if there was none.
    pub fn note_off(&mut self, graph: &mut NodeGraph, note: i32, now: f64, release: f32) -> bool {
        let Some(pos) = self.active.iter().position(|&(n, _)| n == note) else {
            return false;
        };

        let (_, id) = self.active.remove(pos);
        self.release_voice(graph, id, now, release);
        true
    }

    /// Release every active voice, oldest first.
    pub fn stop_all(&mut self, graph: &mut NodeGraph, now: f64, release: f32) -> usize {
        let notes: Vec<i32> = self.active_notes().collect();
        for &note in &notes {
            self.note_off(graph, note, now, release);
        }
        notes.len()
    }

    fn release_voice(&mut self, graph: &mut NodeGraph, id: VoiceId, now: f64, release: f32) {
        let Some(voice) = self.voices.get_mut(&id) else {
            return;
        };

        match voice.release(graph, now, release) {
            Ok(deadline) => self.schedule_disposal(id, deadline),
            Err(err) => {
                warn!(voice = %id, %err, "release failed; disposing immediately");
                if let Some(mut voice) = self.voices.remove(&id) {
                    voice.dispose(graph);
                }
                self.releasing.remove(&id);
            }
        }
    }

    fn schedule_disposal(&mut self, voice: VoiceId, deadline: f64) {
        self.releasing.insert(voice, deadline);
        self.pending
            .push(Reverse(PendingDisposal { deadline, voice }));
    }

    /// Dispose every releasing voice whose deadline is at or before `now`.
    pub fn collect_due(&mut self, graph: &mut NodeGraph, now: f64) -> usize {
        let mut disposed = 0;

        while let Some(Reverse(next)) = self.pending.peek().copied() {
            if next.deadline > now {
                break;
            }
            self.pending.pop();

            // stale entry: re-timed or already gone
            if self.releasing.get(&next.voice) != Some(&next.deadline) {
                continue;
            }
            self.releasing.remove(&next.voice);

            if let Some(mut voice) = self.voices.remove(&next.voice) {
                if voice.dispose(graph) {
                    debug!(voice = %next.voice, note = voice.note(), "voice disposed");
                    disposed += 1;
                }
            }
        }

        disposed
    }

    /// Restart every release tail with a new release time. Cleanup
    /// deadlines move with it.
    pub fn retime_releases(&mut self, graph: &mut NodeGraph, now: f64, release: f32) {
        let ids: Vec<VoiceId> = self.releasing.keys().copied().collect();
        for id in ids {
            self.release_voice(graph, id, now, release);
        }
    }

    /// Earliest pending cleanup deadline, ignoring stale entries.
    pub fn next_deadline(&self) -> Option<f64> {
        self.releasing.values().copied().min_by(f64::total_cmp)
    }

    fn active_voice_id(&self, note: i32) -> Option<VoiceId> {
        self.active
            .iter()
            .find(|&&(n, _)| n == note)
            .map(|&(_, id)| id)
    }

    /// Active notes in note-on order.
    pub fn active_notes(&self) -> impl Iterator<Item = i32> + '_ {
        self.active.iter().map(|&(note, _)| note)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_voice(&self, note: i32) -> Option<&Voice> {
        self.active_voice_id(note).and_then(|id| self.voices.get(&id))
    }

    pub fn active_voices(&self) -> impl Iterator<Item = &Voice> + '_ {
        self.active
            .iter()
            .filter_map(|(_, id)| self.voices.get(id))
    }

    pub fn releasing_voices(&self) -> impl Iterator<Item = &Voice> + '_ {
        self.releasing.keys().filter_map(|id| self.voices.get(id))
    }

    pub fn releasing_count(&self) -> usize {
        self.releasing.len()
    }

    /// Voices that still own graph nodes.
    pub fn live_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dsp::envelope::EnvelopeStage, graph::node::Node};

    struct Rig {
        graph: NodeGraph,
        filter: NodeId,
        params: ParameterSet,
        manager: VoiceManager,
    }

    impl Rig {
        fn new(polyphony: usize, max_nodes: usize) -> Self {
            let mut graph = NodeGraph::new(max_nodes);
            let filter = graph.create(Node::Destination).unwrap();
            Self {
                graph,
                filter,
                params: ParameterSet::default(),
                manager: VoiceManager::new(polyphony),
            }
        }

        fn on(&mut self, note: i32, now: f64) -> Result<Option<VoiceId>, EngineError> {
            self.manager
                .note_on(&mut self.graph, self.filter, note, now, &self.params)
        }

        fn off(&mut self, note: i32, now: f64) -> bool {
            let release = self.params.envelope.release;
            self.manager.note_off(&mut self.graph, note, now, release)
        }
    }

    #[test]
    fn repeated_note_on_is_ignored() {
        let mut rig = Rig::new(8, 64);
        assert!(rig.on(60, 0.0).unwrap().is_some());
        assert!(rig.on(60, 0.1).unwrap().is_none());
        assert_eq!(rig.manager.active_count(), 1);
        assert_eq!(rig.manager.live_count(), 1);
    }

    #[test]
    fn oldest_voice_is_stolen() {
        let mut rig = Rig::new(2, 64);
        rig.on(60, 0.0).unwrap();
        rig.on(64, 0.0).unwrap();
        rig.on(67, 0.0).unwrap();

        assert_eq!(rig.manager.active_notes().collect::<Vec<_>>(), vec![64, 67]);
        let releasing: Vec<i32> = rig.manager.releasing_voices().map(Voice::note).collect();
        assert_eq!(releasing, vec![60]);
    }

    #[test]
    fn note_off_of_silent_note_is_noop() {
        let mut rig = Rig::new(8, 64);
        assert!(!rig.off(72, 0.0));
        assert_eq!(rig.manager.releasing_count(), 0);
    }

    #[test]
    fn restrike_during_tail_gets_fresh_voice() {
        let mut rig = Rig::new(8, 64);
        let first = rig.on(60, 0.0).unwrap().unwrap();
        rig.off(60, 0.5);
        let second = rig.on(60, 0.6).unwrap().unwrap();

        assert_ne!(first, second);
        let voice = rig.manager.active_voice(60).unwrap();
        assert_eq!(voice.id(), second);
        assert_eq!(voice.stage(0.6), EnvelopeStage::Attacking);
        assert_eq!(rig.manager.live_count(), 2);
    }

    #[test]
    fn disposal_waits_for_deadline() {
        let mut rig = Rig::new(8, 64);
        rig.on(60, 0.0).unwrap();
        rig.off(60, 1.0);
        let nodes_with_voice = rig.graph.len();

        // release 0.3 s + 80 ms margin
        assert_eq!(rig.manager.collect_due(&mut rig.graph, 1.3), 0);
        assert_eq!(rig.manager.collect_due(&mut rig.graph, 1.39), 1);
        assert_eq!(rig.manager.live_count(), 0);
        assert_eq!(rig.graph.len(), nodes_with_voice - 3);
        assert_eq!(rig.manager.collect_due(&mut rig.graph, 5.0), 0);
    }

    #[test]
    fn retimed_release_defers_cleanup() {
        let mut rig = Rig::new(8, 64);
        rig.on(60, 0.0).unwrap();
        rig.off(60, 1.0);
        rig.manager.retime_releases(&mut rig.graph, 1.1, 2.0);

        assert_eq!(rig.manager.collect_due(&mut rig.graph, 1.5), 0);
        assert_eq!(rig.manager.live_count(), 1);
        assert!(rig.manager.next_deadline().unwrap() > 3.1);
        assert_eq!(rig.manager.collect_due(&mut rig.graph, 3.2), 1);
    }

    #[test]
    fn failed_note_on_changes_nothing() {
        // sink + one three-node voice
        let mut rig = Rig::new(1, 4);
        rig.on(60, 0.0).unwrap();
        let nodes = rig.graph.len();

        assert!(matches!(rig.on(62, 0.1), Err(EngineError::NodeLimit { .. })));
        assert_eq!(rig.manager.active_notes().collect::<Vec<_>>(), vec![60]);
        assert_eq!(rig.manager.releasing_count(), 0);
        assert_eq!(rig.graph.len(), nodes);
    }

    #[test]
    fn stop_all_releases_in_order() {
        let mut rig = Rig::new(8, 64);
        for note in [60, 64, 67] {
            rig.on(note, 0.0).unwrap();
        }
        let release = rig.params.envelope.release;
        assert_eq!(rig.manager.stop_all(&mut rig.graph, 0.5, release), 3);
        assert_eq!(rig.manager.active_count(), 0);
        assert_eq!(rig.manager.releasing_count(), 3);
    }
}
