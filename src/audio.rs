//! 32-channel PCM mixer (C10): `symphonia` decodes WAV/MP3/OGG files into
//! interleaved f32 samples at the device's sample rate, `cpal` owns the
//! output stream and drives the mixer callback. The mixer callback shares
//! the per-channel buffers with the main thread; every mutation on either
//! side takes the mixer mutex, never raw pointers into the callback's
//! buffers.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::overlay::OverlayManager;

pub const CHANNEL_COUNT: usize = 32;

#[derive(Default)]
struct Channel {
    samples: Vec<f32>,
    position: usize,
    volume: f32,
    playing: bool,
}

struct Mixer {
    channels: Vec<Channel>,
    device_channels: u16,
}

impl Mixer {
    fn new(device_channels: u16) -> Self {
        Self {
            channels: (0..CHANNEL_COUNT).map(|_| Channel { volume: 1.0, ..Default::default() }).collect(),
            device_channels,
        }
    }

    /// Sum all active channels into `out` (interleaved, `device_channels`
    /// wide), clamped to [-1, 1]. Called from the real-time audio callback.
    fn mix_into(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        for channel in &mut self.channels {
            if !channel.playing {
                continue;
            }
            for frame in out.chunks_mut(self.device_channels as usize) {
                if channel.position >= channel.samples.len() {
                    channel.playing = false;
                    break;
                }
                for sample in frame.iter_mut() {
                    if channel.position >= channel.samples.len() {
                        break;
                    }
                    *sample += channel.samples[channel.position] * channel.volume;
                    channel.position += 1;
                }
            }
        }
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    fn play(&mut self, index: usize, samples: Vec<f32>, volume: f32) {
        let Some(channel) = self.channels.get_mut(index) else { return };
        channel.samples = samples;
        channel.position = 0;
        channel.volume = volume;
        channel.playing = true;
    }

    fn stop(&mut self, index: usize) {
        if let Some(channel) = self.channels.get_mut(index) {
            channel.playing = false;
            channel.position = 0;
        }
    }

    fn set_volume(&mut self, index: usize, volume: f32) {
        if let Some(channel) = self.channels.get_mut(index) {
            channel.volume = volume;
        }
    }
}

/// Owns the cpal output stream; dropping this tears the stream down.
pub struct AudioSystem {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    device_channels: u16,
    _stream: cpal::Stream,
}

impl AudioSystem {
    /// Open the default output device. Callers should treat `Err` as
    /// non-fatal and run with audio disabled.
    pub fn init() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| anyhow!("no default audio output device"))?;
        let config = device.default_output_config().context("querying default output config")?;
        let sample_rate = config.sample_rate().0;
        let device_channels = config.channels();

        let mixer = Arc::new(Mutex::new(Mixer::new(device_channels)));
        let callback_mixer = mixer.clone();

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| callback_mixer.lock().mix_into(data),
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )?;
        stream.play().context("starting audio output stream")?;

        Ok(Self { mixer, sample_rate, device_channels, _stream: stream })
    }

    /// Apply `sound=`/`channel=`/`path=`/`volume=` keys from an OSC 777
    /// request. Unrelated keys are ignored.
    pub fn apply_request(&self, params: &[Vec<u8>]) {
        let kv = OverlayManager::parse_kv(params);
        let Some(op) = kv.get("sound").map(String::as_str) else { return };
        let channel: usize = kv.get("channel").and_then(|s| s.parse().ok()).unwrap_or(0);
        if channel >= CHANNEL_COUNT {
            return;
        }
        match op {
            "play" => {
                let Some(path) = kv.get("path") else { return };
                let volume = kv
                    .get("volume")
                    .and_then(|s| s.parse::<u32>().ok())
                    .map(|v| (v.min(100) as f32) / 100.0)
                    .unwrap_or(1.0);
                match decode_file(Path::new(path), self.sample_rate, self.device_channels) {
                    Ok(samples) => self.mixer.lock().play(channel, samples, volume),
                    Err(err) => tracing::warn!(%err, path, "failed to decode sound file"),
                }
            }
            "stop" => self.mixer.lock().stop(channel),
            _ => {}
        }
        if let Some(volume) = kv.get("volume").and_then(|s| s.parse::<u32>().ok()) {
            self.mixer.lock().set_volume(channel, (volume.min(100) as f32) / 100.0);
        }
    }
}

/// Decode a WAV/MP3/OGG file into interleaved f32 samples, resampled (linear
/// interpolation — good enough for sound-effect playback, not audio
/// production) to `device_rate`/`device_channels`.
fn decode_file(path: &Path, device_rate: u32, device_channels: u16) -> Result<Vec<f32>> {
    let file = File::open(path).with_context(|| format!("opening sound file {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("probing sound file format")?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| anyhow!("sound file has no default track"))?;
    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.ok_or_else(|| anyhow!("sound file has no sample rate"))?;
    let source_channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| anyhow!("sound file has no channel layout"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("constructing decoder")?;

    let mut interleaved = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("reading sound packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = decoder.decode(&packet).context("decoding sound packet")?;
        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    let remixed = remix_channels(&interleaved, source_channels, device_channels);
    Ok(resample_linear(&remixed, source_rate, device_rate, device_channels))
}

fn remix_channels(interleaved: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 {
        return interleaved.to_vec();
    }
    let frames = interleaved.len() / from as usize;
    let mut out = Vec::with_capacity(frames * to as usize);
    for frame in interleaved.chunks(from as usize) {
        let mono: f32 = frame.iter().sum::<f32>() / from as f32;
        for _ in 0..to {
            out.push(mono);
        }
    }
    out
}

fn resample_linear(interleaved: &[f32], from_rate: u32, to_rate: u32, channels: u16) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || channels == 0 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    let frame_count = interleaved.len() / channels;
    if frame_count == 0 {
        return Vec::new();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_frames = ((frame_count as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;
        let idx0 = src_idx.min(frame_count - 1);
        let idx1 = (src_idx + 1).min(frame_count - 1);
        for c in 0..channels {
            let a = interleaved[idx0 * channels + c];
            let b = interleaved[idx1 * channels + c];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_sums_two_playing_channels_and_clamps() {
        let mut mixer = Mixer::new(1);
        mixer.play(0, vec![0.8, 0.8], 1.0);
        mixer.play(1, vec![0.8, 0.8], 1.0);
        let mut out = vec![0.0f32; 2];
        mixer.mix_into(&mut out);
        assert_eq!(out, vec![1.0, 1.0]);
    }

    #[test]
    fn stopped_channel_contributes_nothing() {
        let mut mixer = Mixer::new(1);
        mixer.play(0, vec![1.0, 1.0], 1.0);
        mixer.stop(0);
        let mut out = vec![0.0f32; 2];
        mixer.mix_into(&mut out);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn channel_past_end_of_buffer_stops_itself() {
        let mut mixer = Mixer::new(1);
        mixer.play(0, vec![0.5], 1.0);
        let mut out = vec![0.0f32; 3];
        mixer.mix_into(&mut out);
        assert_eq!(out, vec![0.5, 0.0, 0.0]);
        assert!(!mixer.channels[0].playing);
    }

    #[test]
    fn remix_stereo_to_mono_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.0, 1.0];
        let mono = remix_channels(&stereo, 2, 1);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn resample_identity_when_rates_match() {
        let data = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample_linear(&data, 44100, 44100, 2);
        assert_eq!(out, data);
    }

    #[test]
    fn resample_halves_length_when_downsampling_by_half() {
        let data = vec![0.0, 1.0, 2.0, 3.0];
        let out = resample_linear(&data, 44100, 22050, 1);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn volume_scales_mixed_output() {
        let mut mixer = Mixer::new(1);
        mixer.play(0, vec![1.0], 0.5);
        let mut out = vec![0.0f32; 1];
        mixer.mix_into(&mut out);
        assert_eq!(out, vec![0.5]);
    }
}
