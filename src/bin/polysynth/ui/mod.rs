//! Terminal UI: keyboard in, scope and status out

mod params;
mod status;
mod waveform;

use std::time::{Duration, Instant};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use polysynth::{
    dsp::{FilterType, Waveform},
    EngineHandle, EngineMessage, EngineStatus, ParamChange, ParameterSet,
};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use tracing::warn;

use crate::keyboard::Keyboard;
use params::render_params;
use status::{render_status, AudioStats};
use waveform::render_waveform;

/// Audio visualization buffer size
const VIS_BUFFER_SIZE: usize = 1024;
/// How long a key counts as held after its last repeat.
const KEY_HOLD: Duration = Duration::from_millis(350);

const SLOT_CYCLE: [Option<Waveform>; 5] = [
    None,
    Some(Waveform::Sine),
    Some(Waveform::Square),
    Some(Waveform::Sawtooth),
    Some(Waveform::Triangle),
];

const FILTER_CYCLE: [FilterType; 4] = [
    FilterType::LowPass,
    FilterType::HighPass,
    FilterType::BandPass,
    FilterType::Notch,
];

pub struct UiApp {
    handle: EngineHandle,
    audio_rx: Consumer<f32>,
    status_rx: Consumer<EngineStatus>,
    status: EngineStatus,
    params: ParameterSet,
    keyboard: Keyboard,
    sample_rate: f32,
    audio_buffer: Vec<f32>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        handle: EngineHandle,
        audio_rx: Consumer<f32>,
        status_rx: Consumer<EngineStatus>,
        params: ParameterSet,
        sample_rate: f32,
    ) -> Self {
        Self {
            handle,
            audio_rx,
            status_rx,
            status: EngineStatus::default(),
            params,
            keyboard: Keyboard::new(KEY_HOLD),
            sample_rate,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            should_quit: false,
        }
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.poll_status();
            self.release_expired();

            terminal.draw(|frame| self.render(frame))?;

            // non-blocking, ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        self.send(EngineMessage::StopAll);
        Ok(())
    }

    fn poll_audio(&mut self) {
        while let Ok(sample) = self.audio_rx.pop() {
            self.audio_buffer.push(sample);
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
    }

    /// Keep only the latest status.
    fn poll_status(&mut self) {
        while let Ok(status) = self.status_rx.pop() {
            self.status = status;
        }
    }

    fn release_expired(&mut self) {
        for note in self.keyboard.expired(Instant::now()) {
            self.send(EngineMessage::NoteOff { note });
        }
    }

    fn send(&mut self, msg: EngineMessage) {
        if let Err(err) = self.handle.send(msg) {
            warn!(?msg, %err, "dropped engine command");
        }
    }

    fn set(&mut self, change: ParamChange) {
        match self.params.apply(change) {
            Ok(()) => self.send(EngineMessage::Set(change)),
            Err(err) => warn!(?change, %err, "parameter rejected"),
        }
    }

    fn cycle_slot(&mut self, slot: usize) {
        let current = self.params.oscillators[slot].waveform;
        let pos = SLOT_CYCLE.iter().position(|&w| w == current).unwrap_or(0);
        let waveform = SLOT_CYCLE[(pos + 1) % SLOT_CYCLE.len()];
        self.set(ParamChange::OscWaveform { slot, waveform });
    }

    fn cycle_filter(&mut self) {
        let current = self.params.filter.filter_type;
        let pos = FILTER_CYCLE.iter().position(|&f| f == current).unwrap_or(0);
        self.set(ParamChange::FilterType(FILTER_CYCLE[(pos + 1) % FILTER_CYCLE.len()]));
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => self.send(EngineMessage::Toggle),
            KeyCode::Backspace => {
                self.keyboard.clear();
                self.send(EngineMessage::StopAll);
            }
            KeyCode::Char('z') => self.keyboard.shift_octave(-1),
            KeyCode::Char('x') => self.keyboard.shift_octave(1),
            KeyCode::Char('1') => self.cycle_slot(0),
            KeyCode::Char('2') => self.cycle_slot(1),
            KeyCode::Char('3') => self.cycle_slot(2),
            KeyCode::Char('4') => self.cycle_filter(),
            KeyCode::Char('[') => {
                let cutoff = (self.params.filter.cutoff / 1.25).max(20.0);
                self.set(ParamChange::FilterCutoff(cutoff));
            }
            KeyCode::Char(']') => {
                let cutoff = (self.params.filter.cutoff * 1.25).min(18_000.0);
                self.set(ParamChange::FilterCutoff(cutoff));
            }
            KeyCode::Char('-') => {
                let release = (self.params.envelope.release - 0.1).max(0.0);
                self.set(ParamChange::Release(release));
            }
            KeyCode::Char('=') => {
                let release = (self.params.envelope.release + 0.1).min(5.0);
                self.set(ParamChange::Release(release));
            }
            KeyCode::Char('\\') => self.set(ParamChange::DelayEnabled(!self.params.delay.enabled)),
            KeyCode::Char(c) => {
                if let Some(note) = self.keyboard.press(c, Instant::now()) {
                    self.send(EngineMessage::NoteOn { note });
                }
            }
            _ => {}
        }
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Status bar
                Constraint::Length(10), // Patch
                Constraint::Min(6),     // Scope
                Constraint::Length(1),  // Help bar
            ])
            .split(frame.area());

        let stats = AudioStats::from_buffer(&self.audio_buffer);
        render_status(
            frame,
            chunks[0],
            self.sample_rate,
            self.keyboard.octave(),
            &self.status,
            &stats,
        );

        let mut held: Vec<i32> = self.keyboard.held_notes().collect();
        held.sort_unstable();
        render_params(frame, chunks[1], &self.params, &held);

        render_waveform(frame, chunks[2], &self.audio_buffer);

        let help = Paragraph::new(
            " [a-;] Play  [Z/X] Octave  [Space] Tone  [1-3] Osc  [4] Filter  [ [ ] ] Cutoff  [-/=] Release  [\\] Delay  [Bksp] Stop  [Esc] Quit",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
