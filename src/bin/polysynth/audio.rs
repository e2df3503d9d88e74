//! Audio output: the engine lives inside the cpal callback

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use polysynth::{Engine, EngineConfig, EngineMessage, EngineStatus, ParameterSnapshot, MAX_BLOCK_SIZE};
use rtrb::{Consumer, Producer};
use tracing::{error, info};

/// Keeps the stream alive. Dropping it stops audio.
pub struct AudioOutput {
    _stream: cpal::Stream,
    pub sample_rate: f32,
}

pub fn start(
    mut config: EngineConfig,
    preset: Option<&ParameterSnapshot>,
    commands: Consumer<EngineMessage>,
    scope: Producer<f32>,
    mut status: Producer<EngineStatus>,
) -> EyreResult<AudioOutput> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let stream_config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = stream_config.sample_rate().0 as f32;
    let channels = stream_config.channels() as usize;
    config.sample_rate = sample_rate;
    info!(sample_rate, channels, "audio device opened");

    let mut engine = Engine::new(config)?;
    if let Some(snapshot) = preset {
        engine.apply_snapshot(snapshot)?;
    }
    engine.attach_receiver(commands);
    engine.attach_tap(scope);

    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_output_stream(
        &stream_config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames_to_render = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let block = &mut render_buf[..frames_to_render];
                engine.process_block(block);

                // mono to all channels
                let out_off = frames_written * channels;
                for (i, &s) in block.iter().enumerate() {
                    for ch in 0..channels {
                        data[out_off + i * channels + ch] = s;
                    }
                }

                frames_written += frames_to_render;
            }

            // the UI only wants the latest; a full ring just skips one
            let _ = status.push(engine.status());
        },
        |err| error!(%err, "audio stream error"),
        None,
    )?;

    stream.play()?;

    Ok(AudioOutput {
        _stream: stream,
        sample_rate,
    })
}
