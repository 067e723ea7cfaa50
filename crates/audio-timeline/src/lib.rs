//! Mono audio buffers and the operations the mixer needs: silence, padding,
//! gain, overlay, WAV in/out.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

mod decode;
mod mix;

pub use decode::{decode_to_mono, decode_wav_to_mono_f32};
pub use mix::{align_lengths, mix, mix_or_recitation, MixOutcome, MixSettings};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("failed to encode WAV: {0}")]
    Encode(#[from] hound::Error),
    #[error("sample rates differ: {left} Hz vs {right} Hz")]
    SampleRateMismatch { left: u32, right: u32 },
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),
    #[error("gain must be a finite number of dB, got {0}")]
    InvalidGain(f32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Mono f32 samples in [-1, 1] at a fixed sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }
        Ok(Self { samples, sample_rate })
    }

    /// `duration_ms` of digital silence. A zero sample rate is bumped to 1 Hz.
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let len = (duration_ms as u128 * sample_rate as u128 / 1000) as usize;
        Self { samples: vec![0.0; len], sample_rate }
    }

    pub fn silent_secs(secs: f64, sample_rate: u32) -> Self {
        Self::silent(secs_to_ms(secs), sample_rate)
    }

    pub fn samples(&self) -> &[f32] { &self.samples }
    pub fn sample_rate(&self) -> u32 { self.sample_rate }
    pub fn len_samples(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u128 * 1000 / self.sample_rate as u128) as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Concatenate `other` after `self`.
    pub fn append(&mut self, other: &Waveform) -> Result<(), AudioError> {
        self.check_rate(other)?;
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Right-pad with silence up to `len` samples; never truncates.
    pub fn pad_to(&mut self, len: usize) {
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    pub fn apply_gain_db(&mut self, db: f32) -> Result<(), AudioError> {
        if !db.is_finite() {
            return Err(AudioError::InvalidGain(db));
        }
        if db != 0.0 {
            let k = 10f32.powf(db / 20.0);
            for x in &mut self.samples {
                *x *= k;
            }
        }
        Ok(())
    }

    /// Mix `other` into a copy of `self`, both starting at time 0. The result
    /// keeps `self`'s length; whatever of `other` runs past it is dropped.
    /// Sums are hard-clipped to [-1, 1].
    pub fn overlay(&self, other: &Waveform) -> Result<Waveform, AudioError> {
        self.check_rate(other)?;
        let mut out = self.clone();
        for (o, &s) in out.samples.iter_mut().zip(other.samples.iter()) {
            *o = (*o + s).clamp(-1.0, 1.0);
        }
        Ok(out)
    }

    /// Linear-interpolation resample.
    pub fn resampled(&self, sample_rate: u32) -> Result<Waveform, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }
        if sample_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Waveform { samples: self.samples.clone(), sample_rate });
        }
        let ratio = self.sample_rate as f64 / sample_rate as f64;
        let len = (self.samples.len() as f64 / ratio).round() as usize;
        let last = self.samples.len() - 1;
        let samples = (0..len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let i0 = (pos.floor() as usize).min(last);
                let i1 = (i0 + 1).min(last);
                let frac = (pos - i0 as f64) as f32;
                self.samples[i0] * (1.0 - frac) + self.samples[i1] * frac
            })
            .collect();
        Ok(Waveform { samples, sample_rate })
    }

    /// Decode WAV, falling back to Symphonia for compressed formats.
    pub fn decode(bytes: &[u8]) -> Result<Waveform, AudioError> {
        let (samples, sr) = match decode_wav_to_mono_f32(bytes) {
            Ok(decoded) => decoded,
            Err(_) => decode_to_mono(bytes)?,
        };
        Waveform::new(samples, sr)
    }

    pub fn read(path: &Path) -> Result<Waveform, AudioError> {
        Waveform::decode(&std::fs::read(path)?)
    }

    /// Encode to 16-bit PCM mono WAV in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(self.samples.len() * 2 + 64));
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &s in &self.samples {
                let v = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                writer.write_sample(v)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        std::fs::write(path, self.to_wav_bytes()?)?;
        Ok(())
    }

    fn check_rate(&self, other: &Waveform) -> Result<(), AudioError> {
        if self.sample_rate != other.sample_rate {
            return Err(AudioError::SampleRateMismatch { left: self.sample_rate, right: other.sample_rate });
        }
        Ok(())
    }
}

pub fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 { (secs * 1000.0).round() as u64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(ms: u64, sr: u32, level: f32) -> Waveform {
        let mut w = Waveform::silent(ms, sr);
        w.samples.iter_mut().for_each(|s| *s = level);
        w
    }

    #[test]
    fn silence_has_requested_length() {
        let w = Waveform::silent(5000, 44_100);
        assert_eq!(w.len_samples(), 220_500);
        assert_eq!(w.duration_ms(), 5000);
        assert!(w.samples().iter().all(|&s| s == 0.0));
        assert_eq!(Waveform::silent_secs(1.25, 8000).duration_ms(), 1250);
    }

    #[test]
    fn gain_is_decibels() {
        let mut w = tone(10, 1000, 0.5);
        w.apply_gain_db(-6.0206).unwrap();
        assert!((w.samples()[0] - 0.25).abs() < 1e-4);
        assert!(matches!(w.apply_gain_db(f32::NAN), Err(AudioError::InvalidGain(_))));
    }

    #[test]
    fn overlay_keeps_base_length_and_clips() {
        let base = tone(100, 1000, 0.75);
        let top = tone(300, 1000, 0.5);
        let out = base.overlay(&top).unwrap();
        assert_eq!(out.len_samples(), base.len_samples());
        assert_eq!(out.samples()[0], 1.0);

        let short = tone(50, 1000, 0.1);
        let out = base.overlay(&short).unwrap();
        assert!((out.samples()[0] - 0.85).abs() < 1e-6);
        assert_eq!(out.samples()[60], 0.75);
    }

    #[test]
    fn mismatched_rates_are_rejected() {
        let a = Waveform::silent(10, 8000);
        let b = Waveform::silent(10, 16000);
        assert!(matches!(a.overlay(&b), Err(AudioError::SampleRateMismatch { .. })));
    }

    #[test]
    fn append_and_pad() {
        let mut a = tone(100, 1000, 0.2);
        a.append(&Waveform::silent(50, 1000)).unwrap();
        assert_eq!(a.duration_ms(), 150);
        a.pad_to(200);
        assert_eq!(a.len_samples(), 200);
        a.pad_to(10);
        assert_eq!(a.len_samples(), 200);
    }

    #[test]
    fn resample_preserves_duration() {
        let w = tone(1000, 24_000, 0.3);
        let r = w.resampled(44_100).unwrap();
        assert_eq!(r.sample_rate(), 44_100);
        assert_eq!(r.duration_ms(), 1000);
        assert!(r.samples().iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn wav_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let w = tone(200, 22_050, 0.5);
        w.write_wav(&path).unwrap();
        let back = Waveform::read(&path).unwrap();
        assert_eq!(back.sample_rate(), 22_050);
        assert_eq!(back.len_samples(), w.len_samples());
        assert!((back.samples()[10] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn zero_rate_is_invalid() {
        assert!(matches!(Waveform::new(vec![0.0], 0), Err(AudioError::InvalidSampleRate(0))));
    }
}
