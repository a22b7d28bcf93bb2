//! # Block Sources
//!
//! Thin acquisition glue that feeds interleaved `f32` frames to the capture
//! loop. Device capture is left to external tools; these sources read a WAV
//! file or raw PCM (a file, or stdin from e.g. `parec --format=s16le`).
//!
//! ## Formats:
//! - **WAV**: 8/16/24-bit integer or 32-bit float, any channel count
//! - **Raw**: little-endian signed 16-bit interleaved PCM, no header
//!
//! Samples are normalized to [-1.0, 1.0).

use crate::config::{AudioSettings, SourceKind, SourceSettings};
use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};

/// A stream of interleaved audio frames.
pub trait BlockSource {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    /// Clear `out` and fill it with up to `frames` interleaved frames.
    /// Returns `false` once the stream is exhausted and nothing was read.
    fn next_block(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<bool>;
}

/// Open the source described by the configuration and check that its format
/// matches the configured stream.
pub fn open_source(
    settings: &SourceSettings,
    audio: &AudioSettings,
) -> Result<Box<dyn BlockSource + Send>> {
    let source: Box<dyn BlockSource + Send> = match settings.kind {
        SourceKind::Wav => {
            let mut file = File::open(&settings.path)
                .with_context(|| format!("Failed to open WAV file {}", settings.path))?;
            Box::new(WavSource::from_reader(&mut file)?)
        }
        SourceKind::Raw if settings.path == "-" => Box::new(RawPcmSource::new(
            io::stdin(),
            audio.sample_rate,
            audio.channels,
        )),
        SourceKind::Raw => {
            let file = File::open(&settings.path)
                .with_context(|| format!("Failed to open PCM file {}", settings.path))?;
            Box::new(RawPcmSource::new(file, audio.sample_rate, audio.channels))
        }
    };

    if source.sample_rate() != audio.sample_rate {
        bail!(
            "Source sample rate {} Hz does not match configured {} Hz",
            source.sample_rate(),
            audio.sample_rate
        );
    }

    if source.channels() != audio.channels {
        bail!(
            "Source has {} channel(s), configuration expects {}",
            source.channels(),
            audio.channels
        );
    }

    Ok(source)
}

/// A fully decoded WAV file.
pub struct WavSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
    channels: usize,
}

impl WavSource {
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let (header, data) = wav::read(reader).context("Failed to decode WAV data")?;

        let samples: Vec<f32> = match data {
            wav::BitDepth::Eight(v) => v.iter().map(|&s| (s as f32 - 128.0) / 128.0).collect(),
            wav::BitDepth::Sixteen(v) => v.iter().map(|&s| s as f32 / 32768.0).collect(),
            wav::BitDepth::TwentyFour(v) => v.iter().map(|&s| s as f32 / 8_388_608.0).collect(),
            wav::BitDepth::ThirtyTwoFloat(v) => v,
            wav::BitDepth::Empty => Vec::new(),
        };

        if header.channel_count == 0 {
            bail!("WAV header declares zero channels");
        }

        Ok(Self {
            samples,
            position: 0,
            sample_rate: header.sampling_rate,
            channels: header.channel_count as usize,
        })
    }
}

impl BlockSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn next_block(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<bool> {
        out.clear();
        let end = (self.position + frames * self.channels).min(self.samples.len());
        // Whole frames only
        let end = end - (end - self.position) % self.channels;
        if end == self.position {
            return Ok(false);
        }

        out.extend_from_slice(&self.samples[self.position..end]);
        self.position = end;
        Ok(true)
    }
}

/// Headerless s16le PCM from any reader.
pub struct RawPcmSource<R: Read> {
    reader: BufReader<R>,
    bytes: Vec<u8>,
    sample_rate: u32,
    channels: usize,
}

impl<R: Read> RawPcmSource<R> {
    pub fn new(reader: R, sample_rate: u32, channels: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            bytes: Vec::new(),
            sample_rate,
            channels: channels.max(1),
        }
    }
}

impl<R: Read> BlockSource for RawPcmSource<R> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn next_block(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<bool> {
        out.clear();
        let frame_bytes = self.channels * 2;
        self.bytes.resize(frames * frame_bytes, 0);

        // A pipe may hand back short reads; keep going until full or EOF
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read PCM data"),
            }
        }

        let whole = filled - filled % frame_bytes;
        if whole == 0 {
            return Ok(false);
        }

        let mut cursor = Cursor::new(&self.bytes[..whole]);
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            out.push(sample as f32 / 32768.0);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, data: Vec<i16>) -> Vec<u8> {
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, channels, sample_rate, 16);
        let mut out = Cursor::new(Vec::new());
        wav::write(header, &wav::BitDepth::Sixteen(data), &mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_wav_source_blocks() {
        // 5 stereo frames
        let data: Vec<i16> = vec![0, 16384, -16384, 0, 8192, 0, 0, 0, 32767, -32768];
        let mut reader = Cursor::new(wav_bytes(2, 44100, data));
        let mut source = WavSource::from_reader(&mut reader).unwrap();

        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.channels(), 2);

        let mut block = Vec::new();
        assert!(source.next_block(2, &mut block).unwrap());
        assert_eq!(block, vec![0.0, 0.5, -0.5, 0.0]);

        assert!(source.next_block(2, &mut block).unwrap());
        assert_eq!(block.len(), 4);

        // Final partial block
        assert!(source.next_block(2, &mut block).unwrap());
        assert_eq!(block.len(), 2);
        assert_eq!(block[1], -1.0);

        assert!(!source.next_block(2, &mut block).unwrap());
        assert!(block.is_empty());
    }

    #[test]
    fn test_raw_source_drops_partial_frame() {
        let mut bytes = Vec::new();
        for s in [16384i16, -16384, 0] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        // Dangling half sample
        bytes.push(0x7f);

        let mut source = RawPcmSource::new(Cursor::new(bytes), 44100, 1);
        let mut block = Vec::new();

        assert!(source.next_block(16, &mut block).unwrap());
        assert_eq!(block, vec![0.5, -0.5, 0.0]);
        assert!(!source.next_block(16, &mut block).unwrap());
    }

    #[test]
    fn test_raw_source_stereo_framing() {
        let bytes: Vec<u8> = [1000i16, 2000, 3000, 4000, 5000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        let mut source = RawPcmSource::new(Cursor::new(bytes), 48000, 2);
        let mut block = Vec::new();

        assert!(source.next_block(8, &mut block).unwrap());
        // Two whole frames, the fifth sample is an incomplete frame
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn test_open_source_rejects_format_mismatch() {
        let path = std::env::temp_dir().join(format!("bass-indicator-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&path, wav_bytes(1, 22050, vec![0; 64])).unwrap();

        let settings = SourceSettings {
            kind: SourceKind::Wav,
            path: path.to_string_lossy().into_owned(),
            realtime: false,
        };
        let audio = AudioSettings {
            sample_rate: 44100,
            block_size: 16,
            channels: 1,
            channel: 0,
        };
        let result = open_source(&settings, &audio);
        std::fs::remove_file(&path).ok();

        let err = result.err().unwrap();
        assert!(err.to_string().contains("sample rate"));
    }
}
