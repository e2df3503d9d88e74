//! Status bar - voices, nodes, clock and levels

use polysynth::EngineStatus;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Levels of the visible scope window.
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

pub fn render_status(
    frame: &mut Frame,
    area: Rect,
    sample_rate: f32,
    octave: i32,
    status: &EngineStatus,
    stats: &AudioStats,
) {
    let block = Block::default().title(" polysynth ").borders(Borders::ALL);

    let (tone_symbol, tone_color) = if status.toggled {
        ("● tone", Color::Green)
    } else {
        ("○ tone", Color::DarkGray)
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {:.1}kHz  ", sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:>7.2}s  ", status.time),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(
                "Voices: {} (+{} releasing)  ",
                status.active_voices, status.releasing_voices
            ),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("Nodes: {}  ", status.live_nodes),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("Octave: {}  ", octave), Style::default().fg(Color::White)),
        Span::styled(format!("{}  ", tone_symbol), Style::default().fg(tone_color)),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", stats.peak, stats.rms),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
