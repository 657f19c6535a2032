//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform
//! Audio Library). It opens a mono f32 input stream at the engine's
//! configured sample rate and runs the engine directly inside the
//! device callback, so analysis happens on the audio thread with no
//! extra buffering.
//!
//! Estimates leave the audio thread through a crossbeam channel using
//! `try_send`: if the consumer is not keeping up, the record is dropped
//! and the next hop supplies a fresher one.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::{Engine, PitchEstimate};

/// Starts pitch tracking on the default input device.
///
/// The engine is moved into the stream callback; each incoming block is
/// fed straight through it and every completed hop's estimate is
/// forwarded on `sender` without blocking.
///
/// # Arguments
/// * `engine` - A freshly constructed engine; its configured sample
///   rate determines the requested stream rate
/// * `sender` - Channel for delivering estimates to the consumer thread
///
/// # Returns
/// * `Ok(stream)` - The live input stream; keep it alive for as long as
///   tracking should continue, drop it to stop
/// * `Err(e)` - No input device, or no mono f32 config at the requested
///   sample rate
pub fn start_pitch_stream(mut engine: Engine, sender: Sender<PitchEstimate>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let target_rate = engine.config().sample_rate as u32;
    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate).ok_or_else(|| {
        anyhow!("No mono f32 input format supports {} Hz", target_rate)
    })?;

    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(target_rate))
        .into();

    eprintln!("[AUDIO] Streaming at {} Hz", target_rate);

    let err_fn = |err| eprintln!("[AUDIO] Stream error: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            engine.process(data, |estimate| {
                // Fire and forget; a full channel drops the estimate.
                let _ = sender.try_send(*estimate);
            });
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok(stream)
}

/// Finds a mono f32 input configuration whose sample-rate range covers
/// the requested rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .find(|c| c.min_sample_rate().0 <= target_rate && c.max_sample_rate().0 >= target_rate)
}
