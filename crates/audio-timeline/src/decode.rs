use hound::WavReader;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::AudioError;

/// Decode WAV bytes to (mono f32 in [-1,1], sample_rate).
/// 16/24/32-bit PCM and 32-bit float; channels are averaged.
pub fn decode_wav_to_mono_f32(bytes: &[u8]) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let spec = reader.spec();
    let ch = spec.channels as usize;
    if ch == 0 {
        return Err(AudioError::Decode("WAV has zero channels".into()));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<f32>, _>>(),
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let max = (1i64 << (bits - 1)) as f32;
            reader.samples::<i32>().map(|s| s.map(|v| v as f32 / max)).collect::<Result<Vec<f32>, _>>()
        }
        (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>(),
        (fmt, bits) => return Err(AudioError::Decode(format!("unsupported WAV sample format {fmt:?}/{bits}"))),
    }
    .map_err(|e| AudioError::Decode(e.to_string()))?;

    Ok((downmix(samples, ch), spec.sample_rate))
}

/// Decode anything Symphonia can probe (mp3, flac, aac in mp4, wav) to mono f32.
pub fn decode_to_mono(bytes: &[u8]) -> Result<(Vec<f32>, u32), AudioError> {
    let decode_err = |e: SymphoniaError| AudioError::Decode(e.to_string());
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = get_probe()
        .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| AudioError::Decode("no default track".into()))?;
    let track_id = track.id;
    let mut sr = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default()).map_err(decode_err)?;

    let mut out = Vec::<f32>::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // end of stream
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                sr = audio_buf.spec().rate;
                let chans = audio_buf.spec().channels.count();
                let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, *audio_buf.spec());
                sample_buf.copy_interleaved_ref(audio_buf);
                out.extend(downmix(sample_buf.samples().to_vec(), chans));
            }
            // recoverable, skip the packet
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e)),
        }
    }

    if sr == 0 {
        return Err(AudioError::Decode("stream has no sample rate".into()));
    }
    Ok((out, sr))
}

fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn stereo_wav() -> Vec<u8> {
        let spec = WavSpec { channels: 2, sample_rate: 8000, bits_per_sample: 16, sample_format: SampleFormat::Int };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..100 {
                w.write_sample(16384i16).unwrap();
                w.write_sample(0i16).unwrap();
            }
            w.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn wav_is_downmixed() {
        let (mono, sr) = decode_wav_to_mono_f32(&stereo_wav()).unwrap();
        assert_eq!(sr, 8000);
        assert_eq!(mono.len(), 100);
        assert!((mono[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_wav_to_mono_f32(b"not audio"), Err(AudioError::Decode(_))));
        assert!(matches!(decode_to_mono(b"not audio either"), Err(AudioError::Decode(_))));
    }
}
