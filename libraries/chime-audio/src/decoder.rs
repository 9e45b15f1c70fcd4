/// Streaming audio source implementation using Symphonia
use crate::error::{AudioError, Result};
use chime_playback::{PlaybackError, Source};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::warn;

/// ITU-R BS.775-1 mix coefficient (-3 dB) for center/LFE/surround channels
const DOWNMIX: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Incremental decoder for one open audio file
///
/// Wraps a Symphonia format reader + codec pair behind the
/// [`Source`] trait. Packets are decoded on demand; samples beyond what
/// the caller's buffer holds are carried over to the next call, so decode
/// granularity never leaks out of this type.
///
/// Output is interleaved f32. Mono files report one channel; everything
/// else is folded to stereo here, so callers only ever see 1 or 2
/// channels.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    /// Channels reported to callers (1 or 2)
    out_channels: u16,
    total_frames: u64,
    /// Frames handed to the caller so far
    position: u64,
    time_base: Option<TimeBase>,
    /// Interleaved per-packet scratch, allocated on the first packet
    packet_buf: Option<SampleBuffer<f32>>,
    /// Downmixed samples left over from the last packet
    carry: Vec<f32>,
    /// Container hit end of stream
    eof: bool,
}

impl SymphoniaSource {
    /// Open `path` and prepare its default audio track for decoding
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Symphonia(format!("Failed to probe file: {}", e)))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;

        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let src_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);
        let out_channels = if src_channels == 1 { 1 } else { 2 };
        let total_frames = track.codec_params.n_frames.unwrap_or(0);
        let track_id = track.id;
        let time_base = track.codec_params.time_base;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            out_channels,
            total_frames,
            position: 0,
            time_base,
            packet_buf: None,
            carry: Vec::new(),
            eof: false,
        })
    }

    /// Decode the next packet of our track into the carry buffer
    ///
    /// Returns `false` once the container reports end of stream.
    fn pull_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Symphonia(format!("Error reading packet: {}", e)))
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Bad frame, keep going
                    warn!(error = %e, "recoverable decode error, skipping packet");
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(format!("Decode error: {}", e))),
            };

            let spec = *decoded.spec();
            let src_channels = spec.channels.count();

            let capacity = decoded.capacity() as u64;
            let packet_buf = self
                .packet_buf
                .get_or_insert_with(|| SampleBuffer::new(capacity, spec));
            packet_buf.copy_interleaved_ref(decoded);

            let samples = packet_buf.samples();
            if src_channels <= 2 {
                self.carry.extend_from_slice(samples);
            } else {
                for frame in samples.chunks_exact(src_channels) {
                    let (left, right) = fold_to_stereo(frame);
                    self.carry.push(left);
                    self.carry.push(right);
                }
            }
            return Ok(true);
        }
    }
}

/// Fold one interleaved multichannel frame down to stereo
///
/// Assumes the common layouts: 3 = L/R/C, 4 = quad, 5 = 5.0, 6+ = 5.1
/// (FL FR C LFE SL SR). Center, LFE and surrounds mix in at -3 dB.
fn fold_to_stereo(frame: &[f32]) -> (f32, f32) {
    let (left, right) = match frame.len() {
        0 => (0.0, 0.0),
        1 => (frame[0], frame[0]),
        2 => (frame[0], frame[1]),
        3 => {
            let c = frame[2] * DOWNMIX;
            (frame[0] + c, frame[1] + c)
        }
        4 => (
            frame[0] + frame[2] * DOWNMIX,
            frame[1] + frame[3] * DOWNMIX,
        ),
        5 => {
            let c = frame[2] * DOWNMIX;
            (
                frame[0] + c + frame[3] * DOWNMIX,
                frame[1] + c + frame[4] * DOWNMIX,
            )
        }
        _ => {
            let c = frame[2] * DOWNMIX;
            let lfe = frame[3] * DOWNMIX;
            (
                frame[0] + c + lfe + frame[4] * DOWNMIX,
                frame[1] + c + lfe + frame[5] * DOWNMIX,
            )
        }
    };
    (left.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0))
}

impl Source for SymphoniaSource {
    fn decode(&mut self, buffer: &mut [f32]) -> chime_playback::Result<usize> {
        let channels = self.out_channels as usize;
        let capacity = (buffer.len() / channels) * channels;

        while self.carry.len() < capacity && !self.eof {
            if !self.pull_packet().map_err(PlaybackError::from)? {
                break;
            }
        }

        let take = self.carry.len().min(capacity);
        buffer[..take].copy_from_slice(&self.carry[..take]);
        self.carry.drain(..take);

        let frames = take / channels;
        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> chime_playback::Result<u64> {
        let target = if self.total_frames > 0 {
            frame.min(self.total_frames)
        } else {
            frame
        };

        let secs = target / u64::from(self.sample_rate);
        let frac = (target % u64::from(self.sample_rate)) as f64 / f64::from(self.sample_rate);
        let time = Time::new(secs, frac);

        let seeked_to = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| PlaybackError::from(AudioError::SeekError(format!("Seek failed: {}", e))))?;

        // Codec state is stale after a container seek
        self.decoder.reset();
        self.carry.clear();
        self.eof = false;

        let landed = match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(seeked_to.actual_ts);
                (time.seconds as f64 + time.frac) * f64::from(self.sample_rate)
            }
            // No time base: assume sample-count timestamps
            None => seeked_to.actual_ts as f64,
        } as u64;

        self.position = landed;
        Ok(landed)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.out_channels
    }

    fn done(&self) -> bool {
        self.eof && self.carry.is_empty()
    }
}
