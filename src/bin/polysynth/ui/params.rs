//! Parameter panel

use polysynth::{
    dsp::oscillator::slot_waveform_name,
    io::converter::{midi_note_to_freq, note_name},
    ParameterSet,
};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn row(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<10}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}

pub fn render_params(frame: &mut Frame, area: Rect, params: &ParameterSet, held: &[i32]) {
    let block = Block::default().title(" Patch ").borders(Borders::ALL);

    let mut lines: Vec<Line> = params
        .oscillators
        .iter()
        .enumerate()
        .map(|(slot, osc)| {
            row(
                &format!("osc{}", slot + 1),
                format!("{:<9} level {:.2}", slot_waveform_name(osc.waveform), osc.level),
            )
        })
        .collect();

    lines.push(row(
        "filter",
        format!(
            "{:<9} {:>6.0} Hz  Q {:.2}",
            params.filter.filter_type.as_str(),
            params.filter.cutoff,
            params.filter.q
        ),
    ));
    lines.push(row(
        "envelope",
        format!(
            "A {:.3}  D {:.3}  S {:.2}  R {:.3}",
            params.envelope.attack,
            params.envelope.decay,
            params.envelope.sustain,
            params.envelope.release
        ),
    ));
    lines.push(row(
        "delay",
        format!(
            "{}  {:.2}s  fb {:.2}",
            if params.delay.enabled { "on " } else { "off" },
            params.delay.time,
            params.delay.feedback
        ),
    ));
    lines.push(row("master", format!("{:.2}", params.master_gain)));

    let held_names: Vec<String> = held
        .iter()
        .map(|&n| format!("{} {:.0}Hz", note_name(n), midi_note_to_freq(n)))
        .collect();
    lines.push(Line::from(vec![
        Span::styled(format!(" {:<10}", "held"), Style::default().fg(Color::DarkGray)),
        Span::styled(
            held_names.join(" "),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
    ]));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
