/*
Automatable Parameters
======================

An AudioParam is a value that can be changed *in the future*. Instead of
writing the gain directly every sample, callers schedule points on a
timeline and the renderer evaluates the timeline at every sample's time.
This is what makes envelopes sample-accurate: `note_on` returns
immediately, and the ramps it scheduled play out over the following
blocks.

Vocabulary
----------

  intrinsic value  The value used when no event has been reached yet.

  event            A scheduled point: either "jump to v at t" (SetValue) or
                   "arrive at v at t, linearly from the previous point"
                   (LinearRamp). Events are kept sorted by time.

  anchor           The most recent event at or before the query time. A
                   ramp interpolates from its anchor to its own end point.


Timeline Evaluation
-------------------

    value
      1.0 ┤          ●  ramp(1.0, 0.1)
          │        ╱   ╲
      0.7 ┤      ╱       ●──────────  ramp(0.7, 0.2)
          │    ╱
      0.0 ●──╱─────────────────────→ time
        set(0.0, 0.0)

Before the first event: intrinsic value.
Between an anchor and a following ramp: linear interpolation.
Between an anchor and a following set: the anchor's value.
After the last event: the last event's value.


Cancellation
------------

`cancel_scheduled_values(t)` drops every event whose time is at or after
`t`, including a ramp that *started* earlier but ends later. The value
then snaps back to the previous anchor, so callers that want to continue
smoothly first read `value_at(t)` and re-anchor with
`set_value_at_time(v, t)`. The envelope release does exactly that.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    SetValue { value: f32, time: f64 },
    LinearRamp { value: f32, time: f64 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } | ParamEvent::LinearRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } | ParamEvent::LinearRamp { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f32,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            events: Vec::with_capacity(8),
        }
    }

    /// Set the value right now, discarding any automation.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.events.clear();
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { value, time });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(ParamEvent::LinearRamp {
            value,
            time: end_time,
        });
    }

    /// Drop every event at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Evaluate the timeline at `time` (seconds).
    pub fn value_at(&self, time: f64) -> f32 {
        let mut anchor_value = self.value;
        let mut anchor_time = 0.0;

        for event in &self.events {
            if event.time() <= time {
                anchor_value = event.value();
                anchor_time = event.time();
                continue;
            }

            return match *event {
                ParamEvent::SetValue { .. } => anchor_value,
                ParamEvent::LinearRamp { value, time: end } => {
                    let span = end - anchor_time;
                    if span <= 0.0 {
                        value
                    } else {
                        let progress = ((time - anchor_time) / span) as f32;
                        anchor_value + (value - anchor_value) * progress
                    }
                }
            };
        }

        anchor_value
    }

    /// Collapse every event at or before `time` into a single anchor.
    ///
    /// Keeps the timeline short for long-lived params without changing any
    /// value at or after `time`.
    pub fn prune(&mut self, time: f64) {
        let Some(last_past) = self.events.iter().rposition(|e| e.time() <= time) else {
            return;
        };

        let anchor = self.events[last_past];
        if last_past + 1 == self.events.len() {
            self.value = anchor.value();
            self.events.clear();
            return;
        }

        self.events.drain(..=last_past);
        self.events.insert(
            0,
            ParamEvent::SetValue {
                value: anchor.value(),
                time: anchor.time(),
            },
        );
    }

    /// Fill `out` with the parameter value at each sample time.
    pub fn render(&mut self, out: &mut [f32], start_time: f64, sample_rate: f32) {
        if self.events.is_empty() {
            out.fill(self.value);
            return;
        }

        let period = 1.0 / sample_rate as f64;
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.value_at(start_time + i as f64 * period);
        }

        self.prune(start_time);
    }

    fn insert(&mut self, event: ParamEvent) {
        // after any event with the same time, so issue order is kept
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }
}

impl Default for AudioParam {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_value_without_events() {
        let param = AudioParam::new(0.25);
        assert_eq!(param.value_at(0.0), 0.25);
        assert_eq!(param.value_at(10.0), 0.25);
    }

    #[test]
    fn linear_ramp_interpolates_from_anchor() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 1.0);
        param.linear_ramp_to_value_at_time(1.0, 2.0);

        assert_eq!(param.value_at(0.5), 0.0);
        assert!((param.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(param.value_at(2.0), 1.0);
        assert_eq!(param.value_at(3.0), 1.0);
    }

    #[test]
    fn set_value_holds_previous_until_reached() {
        let mut param = AudioParam::new(0.2);
        param.set_value_at_time(0.9, 1.0);

        assert_eq!(param.value_at(0.99), 0.2);
        assert_eq!(param.value_at(1.0), 0.9);
    }

    #[test]
    fn cancel_drops_ramp_in_progress() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(1.0, 1.0);

        let mid = param.value_at(0.5);
        param.cancel_scheduled_values(0.5);

        // the ramp ended after 0.5, so it is gone and the anchor holds
        assert_eq!(param.value_at(0.75), 0.0);

        param.set_value_at_time(mid, 0.5);
        assert!((param.value_at(0.75) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn prune_preserves_future_values() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(1.0, 1.0);
        param.linear_ramp_to_value_at_time(0.5, 2.0);

        let before: Vec<f32> = [1.0, 1.25, 1.5, 2.0, 3.0]
            .iter()
            .map(|&t| param.value_at(t))
            .collect();
        param.prune(1.0);
        let after: Vec<f32> = [1.0, 1.25, 1.5, 2.0, 3.0]
            .iter()
            .map(|&t| param.value_at(t))
            .collect();

        assert_eq!(before, after);
    }

    #[test]
    fn render_is_sample_accurate() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(1.0, 0.01);

        let mut out = [0.0f32; 20];
        param.render(&mut out, 0.0, 1_000.0);

        assert_eq!(out[0], 0.0);
        assert!((out[5] - 0.5).abs() < 1e-5);
        assert!((out[10] - 1.0).abs() < 1e-5);
        assert_eq!(out[19], 1.0);
    }
}
