//! Computer keyboard → notes
//!
//! Two rows laid out like a piano:
//!
//! ```text
//!  w e   t y u   o p
//! a s d f g h j k l ;
//! ```
//!
//! Terminals report key presses but not releases, so a note is released
//! once its key has not repeated for `hold`.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

const PIANO_KEYS: [char; 17] = [
    'a', 'w', 's', 'e', 'd', 'f', 't', 'g', 'y', 'h', 'u', 'j', 'k', 'o', 'l', 'p', ';',
];

pub struct Keyboard {
    octave: i32,
    hold: Duration,
    held: HashMap<i32, Instant>,
}

impl Keyboard {
    pub fn new(hold: Duration) -> Self {
        Self {
            octave: 4,
            hold,
            held: HashMap::new(),
        }
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn shift_octave(&mut self, delta: i32) {
        self.octave = (self.octave + delta).clamp(0, 8);
    }

    /// Returns the note if this press starts a new one. Repeats of a held
    /// key only extend it.
    pub fn press(&mut self, key: char, now: Instant) -> Option<i32> {
        let offset = PIANO_KEYS.iter().position(|&k| k == key)? as i32;
        let note = (self.octave + 1) * 12 + offset;
        self.held.insert(note, now).is_none().then_some(note)
    }

    /// Notes whose key stopped repeating.
    pub fn expired(&mut self, now: Instant) -> Vec<i32> {
        let hold = self.hold;
        let mut released = Vec::new();
        self.held.retain(|&note, &mut last| {
            let keep = now.duration_since(last) < hold;
            if !keep {
                released.push(note);
            }
            keep
        });
        released.sort_unstable();
        released
    }

    pub fn held_notes(&self) -> impl Iterator<Item = i32> + '_ {
        self.held.keys().copied()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_is_c_of_current_octave() {
        let mut keys = Keyboard::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert_eq!(keys.press('a', t0), Some(60));
        assert_eq!(keys.press('a', t0), None);
        assert_eq!(keys.press('h', t0), Some(69));
        assert_eq!(keys.press('z', t0), None);
    }

    #[test]
    fn notes_expire_without_repeats() {
        let mut keys = Keyboard::new(Duration::from_millis(300));
        let t0 = Instant::now();
        keys.press('a', t0);
        keys.press('d', t0 + Duration::from_millis(200));

        assert_eq!(keys.expired(t0 + Duration::from_millis(350)), vec![60]);
        assert_eq!(keys.expired(t0 + Duration::from_millis(600)), vec![64]);
    }
}
