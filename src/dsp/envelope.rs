#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{dsp::param::AudioParam, EngineError};

/*
ADSR Envelope Scheduling
========================

This module drives a voice's envelope gain. Unlike a per-sample envelope
generator, it never touches audio: it writes time-stamped ramps onto an
`AudioParam`, and the graph renderer evaluates them sample by sample.

Vocabulary
----------

  trigger     Gate high. Schedules the attack and decay ramps in one go.

  release     Gate low. Cancels whatever has not happened yet and ramps
              from the *current* value to zero.

  deadline    When the voice's nodes may be torn down: the end of the
              release ramp plus a safety margin.


The Shape: Linear Ramps
-----------------------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        t0   t0+A   t0+A+D    t1  t1+R
         (A)   (D)      (S)      (R)

  trigger at t0:
      set(0, t0)
      ramp(1, t0 + A)
      ramp(S, t0 + A + D)

  release at t1:
      v = value_at(t1)
      cancel(t1)
      set(v, t1)
      ramp(0, t1 + R)

Sustain has no event of its own. It is just the end value of the decay
ramp, held until release.


Minimum Durations
-----------------

A zero-length ramp is a step, and a step in gain is a click. Attack and
decay are stretched to at least 2 ms, release to at least 5 ms.


The State Machine
-----------------

    ┌──────┐ trigger ┌───────────┐  t0+A  ┌──────────┐ t0+A+D ┌────────────┐
    │ Idle │ ──────→ │ Attacking │ ─────→ │ Decaying │ ─────→ │ Sustaining │
    └──────┘         └───────────┘        └──────────┘        └────────────┘
                           │ release           │ release            │ release
                           ↓                   ↓                    ↓
                     ┌─────────────────────────────────────────────────┐
                     │                    Releasing                    │
                     └─────────────────────────────────────────────────┘
                                            │ dispose
                                            ↓
                                      ┌──────────┐
                                      │ Disposed │  (terminal)
                                      └──────────┘

Attacking → Decaying → Sustaining happen by the clock alone, so the stage
is derived from the scheduled times rather than stored. Releasing again
while Releasing re-times the tail (used when the release parameter changes
mid-tail).
*/

pub const MIN_ATTACK_SECONDS: f32 = 0.002;
pub const MIN_DECAY_SECONDS: f32 = 0.002;
pub const MIN_RELEASE_SECONDS: f32 = 0.005;
/// Slack between the end of the release ramp and node teardown.
pub const CLEANUP_MARGIN_SECONDS: f64 = 0.080;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Adsr {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attacking,
    Decaying,
    Sustaining,
    Releasing,
    Disposed,
}

#[derive(Debug, Clone, Copy)]
enum Gate {
    Idle,
    Open { attack_end: f64, decay_end: f64 },
    Released { release_end: f64 },
    Disposed,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    gate: Gate,
}

impl Envelope {
    pub fn new() -> Self {
        Self { gate: Gate::Idle }
    }

    pub fn stage(&self, now: f64) -> EnvelopeStage {
        match self.gate {
            Gate::Idle => EnvelopeStage::Idle,
            Gate::Open {
                attack_end,
                decay_end,
            } => {
                if now < attack_end {
                    EnvelopeStage::Attacking
                } else if now < decay_end {
                    EnvelopeStage::Decaying
                } else {
                    EnvelopeStage::Sustaining
                }
            }
            Gate::Released { .. } => EnvelopeStage::Releasing,
            Gate::Disposed => EnvelopeStage::Disposed,
        }
    }

    /// Gate high: schedule attack and decay starting at `now`.
    pub fn trigger(
        &mut self,
        param: &mut AudioParam,
        now: f64,
        adsr: &Adsr,
    ) -> Result<(), EngineError> {
        if !matches!(self.gate, Gate::Idle) {
            return Err(EngineError::IllegalTransition {
                from: self.stage(now),
                event: "trigger",
            });
        }

        let attack_end = now + adsr.attack.max(MIN_ATTACK_SECONDS) as f64;
        let decay_end = attack_end + adsr.decay.max(MIN_DECAY_SECONDS) as f64;

        param.cancel_scheduled_values(now);
        param.set_value_at_time(0.0, now);
        param.linear_ramp_to_value_at_time(1.0, attack_end);
        param.linear_ramp_to_value_at_time(adsr.sustain.clamp(0.0, 1.0), decay_end);

        self.gate = Gate::Open {
            attack_end,
            decay_end,
        };
        Ok(())
    }

    /// Gate low: ramp from the instantaneous value to zero.
    ///
    /// Returns the time after which the voice's nodes may be torn down.
    pub fn release(
        &mut self,
        param: &mut AudioParam,
        now: f64,
        release: f32,
    ) -> Result<f64, EngineError> {
        if matches!(self.gate, Gate::Idle | Gate::Disposed) {
            return Err(EngineError::IllegalTransition {
                from: self.stage(now),
                event: "release",
            });
        }

        // snapshot before cancelling: the cancel drops an unfinished ramp
        let current = param.value_at(now);
        param.cancel_scheduled_values(now);
        param.set_value_at_time(current, now);

        let release_end = now + release.max(MIN_RELEASE_SECONDS) as f64;
        param.linear_ramp_to_value_at_time(0.0, release_end);

        self.gate = Gate::Released { release_end };
        Ok(release_end + CLEANUP_MARGIN_SECONDS)
    }

    /// Enter the terminal stage. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        if matches!(self.gate, Gate::Disposed) {
            return false;
        }
        self.gate = Gate::Disposed;
        true
    }

    /// End of the scheduled release ramp, while releasing.
    pub fn release_end(&self) -> Option<f64> {
        match self.gate {
            Gate::Released { release_end } => Some(release_end),
            _ => None,
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
