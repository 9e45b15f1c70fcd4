//! CPAL-based audio sink
//!
//! A dedicated audio thread owns the CPAL `Stream` (it is not `Send` on
//! every platform) and receives commands over a channel. The device
//! callback drains two fixed sample buffers shared behind a mutex; the
//! render loop on the playback thread fills them through the `AudioSink`
//! trait.

use chime_playback::{AudioSink, BufferState, PlaybackError, SINK_BUFFER_COUNT};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::error;

/// Frames per hardware buffer
const BUFFER_FRAMES: usize = 2048;

/// One shared sample buffer
struct Slot {
    state: BufferState,
    data: Vec<f32>,
    /// Samples consumed by the device callback
    read: usize,
    /// Valid samples in `data`
    len: usize,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: BufferState::Free,
            data: Vec::new(),
            read: 0,
            len: 0,
        }
    }

    fn reset(&mut self, capacity: usize) {
        self.state = BufferState::Free;
        self.data.clear();
        self.data.resize(capacity, 0.0);
        self.read = 0;
        self.len = 0;
    }
}

/// Buffer table shared with the device callback
struct SlotTable {
    slots: [Slot; SINK_BUFFER_COUNT],
    /// Slot the callback plays next; submission order is play order
    play_cursor: usize,
    /// Channels per frame in the slot data (1 or 2)
    src_channels: usize,
}

struct SinkShared {
    table: Mutex<SlotTable>,
    /// Linear gain as f32 bits, written by the playback thread
    gain: AtomicU32,
}

/// Commands sent to the audio thread
enum AudioCommand {
    Configure {
        sample_rate: u32,
        reply: Sender<Result<(), String>>,
    },
    Play {
        reply: Sender<Result<(), String>>,
    },
    Pause,
    Shutdown,
}

/// CPAL audio sink
pub struct CpalSink {
    command_tx: Sender<AudioCommand>,
    shared: Arc<SinkShared>,
    sample_rate: u32,
    voice_playing: bool,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Create a sink on the default output device
    pub fn new() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no default audio output device"))?;

        let shared = Arc::new(SinkShared {
            table: Mutex::new(SlotTable {
                slots: [Slot::new(), Slot::new()],
                play_cursor: 0,
                src_channels: 2,
            }),
            gain: AtomicU32::new(1.0f32.to_bits()),
        });

        let (command_tx, command_rx) = bounded::<AudioCommand>(8);
        let shared_for_thread = shared.clone();
        let audio_thread = thread::spawn(move || {
            audio_thread_run(&device, &shared_for_thread, &command_rx);
        });

        Ok(Self {
            command_tx,
            shared,
            sample_rate: 44100,
            voice_playing: false,
            audio_thread: Some(audio_thread),
        })
    }

    fn roundtrip(
        &self,
        make: impl FnOnce(Sender<Result<(), String>>) -> AudioCommand,
    ) -> chime_playback::Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(make(reply_tx))
            .map_err(|_| PlaybackError::VoiceInit("audio thread gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| PlaybackError::VoiceInit("audio thread gone".to_string()))?
            .map_err(PlaybackError::VoiceInit)
    }
}

impl AudioSink for CpalSink {
    fn configure(&mut self, sample_rate: u32, channels: u16) -> chime_playback::Result<()> {
        {
            let mut table = self.shared.table.lock().unwrap();
            let channels = usize::from(channels.clamp(1, 2));
            for slot in &mut table.slots {
                slot.reset(BUFFER_FRAMES * channels);
            }
            table.play_cursor = 0;
            table.src_channels = channels;
        }

        self.sample_rate = sample_rate;
        self.voice_playing = false;
        self.roundtrip(|reply| AudioCommand::Configure { sample_rate, reply })
    }

    fn start(&mut self) -> chime_playback::Result<()> {
        if self.voice_playing {
            return Ok(());
        }
        self.roundtrip(|reply| AudioCommand::Play { reply })?;
        self.voice_playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Pause);
        self.voice_playing = false;

        let mut table = self.shared.table.lock().unwrap();
        for slot in &mut table.slots {
            slot.state = BufferState::Free;
            slot.read = 0;
            slot.len = 0;
        }
        table.play_cursor = 0;
    }

    fn buffer_frames(&self) -> usize {
        BUFFER_FRAMES
    }

    fn buffer_state(&self, slot: usize) -> BufferState {
        self.shared.table.lock().unwrap().slots[slot].state
    }

    fn submit(&mut self, slot: usize, samples: &[f32]) -> chime_playback::Result<()> {
        let mut table = self.shared.table.lock().unwrap();
        let entry = &mut table.slots[slot];
        if !entry.state.is_ready() {
            return Err(PlaybackError::Source(format!("buffer {slot} not ready")));
        }
        if samples.len() > entry.data.len() {
            return Err(PlaybackError::Source(format!(
                "submission of {} samples exceeds buffer capacity",
                samples.len()
            )));
        }

        entry.data[..samples.len()].copy_from_slice(samples);
        entry.len = samples.len();
        entry.read = 0;
        entry.state = BufferState::Queued;
        Ok(())
    }

    fn tick(&mut self) {
        // Pumping happens in the device callback; nothing to do here
    }

    fn wait_frame(&self) {
        // A quarter of one hardware buffer
        let secs = BUFFER_FRAMES as f64 / 4.0 / f64::from(self.sample_rate.max(1));
        thread::sleep(Duration::from_secs_f64(secs));
    }

    fn set_volume(&mut self, gain: f32) {
        self.shared.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Audio thread main loop; owns the CPAL stream
fn audio_thread_run(device: &Device, shared: &Arc<SinkShared>, command_rx: &Receiver<AudioCommand>) {
    let mut stream: Option<Stream> = None;

    while let Ok(cmd) = command_rx.recv() {
        match cmd {
            AudioCommand::Configure { sample_rate, reply } => {
                stream = None;

                let config = StreamConfig {
                    channels: 2,
                    sample_rate: SampleRate::from(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };
                let shared = shared.clone();
                let built = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        fill_device_buffer(data, 2, &shared);
                    },
                    |err| error!(%err, "audio stream error"),
                    None,
                );

                match built {
                    Ok(s) => {
                        stream = Some(s);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e.to_string()));
                    }
                }
            }
            AudioCommand::Play { reply } => {
                let result = match &stream {
                    Some(s) => s.play().map_err(|e| e.to_string()),
                    None => Err("no stream configured".to_string()),
                };
                let _ = reply.send(result);
            }
            AudioCommand::Pause => {
                if let Some(s) = &stream {
                    let _ = s.pause();
                }
            }
            AudioCommand::Shutdown => break,
        }
    }
}

/// Device callback body: drain the slot table into the device buffer
///
/// Mono slot data is duplicated to both device channels; stereo maps
/// channel 0 left, channel 1 right. Underruns render silence.
fn fill_device_buffer(data: &mut [f32], dev_channels: usize, shared: &SinkShared) {
    let gain = f32::from_bits(shared.gain.load(Ordering::Relaxed));
    let mut table = shared.table.lock().unwrap();
    let src_channels = table.src_channels.max(1);

    for frame in data.chunks_mut(dev_channels) {
        let (left, right) = loop {
            let cursor = table.play_cursor;
            match table.slots[cursor].state {
                BufferState::Queued | BufferState::Playing => {}
                BufferState::Free | BufferState::Done => {
                    // After an underrun the cursor can be parked on a
                    // drained slot while the render loop refilled the
                    // other one; skip ahead rather than starve it
                    let next = (cursor + 1) % SINK_BUFFER_COUNT;
                    if table.slots[next].state == BufferState::Queued {
                        table.play_cursor = next;
                        continue;
                    }
                    break (0.0, 0.0);
                }
            }

            if table.slots[cursor].read >= table.slots[cursor].len {
                table.slots[cursor].state = BufferState::Done;
                table.play_cursor = (cursor + 1) % SINK_BUFFER_COUNT;
                continue;
            }

            table.slots[cursor].state = BufferState::Playing;
            let read = table.slots[cursor].read;
            let slot = &table.slots[cursor];
            let (l, r) = if src_channels == 1 {
                let s = slot.data[read];
                (s, s)
            } else {
                (slot.data[read], slot.data[read + 1])
            };
            table.slots[cursor].read = read + src_channels;
            break (l, r);
        };

        frame.fill(0.0);
        frame[0] = left * gain;
        if frame.len() > 1 {
            frame[1] = right * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_with(src_channels: usize) -> SinkShared {
        let mut slots = [Slot::new(), Slot::new()];
        for slot in &mut slots {
            slot.reset(BUFFER_FRAMES * src_channels);
        }
        SinkShared {
            table: Mutex::new(SlotTable {
                slots,
                play_cursor: 0,
                src_channels,
            }),
            gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    fn queue_samples(shared: &SinkShared, slot: usize, samples: &[f32]) {
        let mut table = shared.table.lock().unwrap();
        table.slots[slot].data[..samples.len()].copy_from_slice(samples);
        table.slots[slot].len = samples.len();
        table.slots[slot].read = 0;
        table.slots[slot].state = BufferState::Queued;
    }

    #[test]
    fn stereo_routes_left_and_right() {
        let shared = shared_with(2);
        queue_samples(&shared, 0, &[0.1, 0.2, 0.3, 0.4]);

        let mut out = [0.0f32; 4];
        fill_device_buffer(&mut out, 2, &shared);

        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(
            shared.table.lock().unwrap().slots[0].state,
            BufferState::Playing
        );
    }

    #[test]
    fn mono_duplicates_to_both_channels() {
        let shared = shared_with(1);
        queue_samples(&shared, 0, &[0.5, -0.5]);

        let mut out = [0.0f32; 4];
        fill_device_buffer(&mut out, 2, &shared);

        assert_eq!(out, [0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn gain_scales_output() {
        let shared = shared_with(2);
        shared.gain.store(0.5f32.to_bits(), Ordering::Relaxed);
        queue_samples(&shared, 0, &[0.8, 0.4]);

        let mut out = [0.0f32; 2];
        fill_device_buffer(&mut out, 2, &shared);

        assert_eq!(out, [0.4, 0.2]);
    }

    #[test]
    fn underrun_renders_silence() {
        let shared = shared_with(2);
        let mut out = [1.0f32; 6];
        fill_device_buffer(&mut out, 2, &shared);
        assert_eq!(out, [0.0; 6]);
    }

    #[test]
    fn cursor_skips_drained_slot_to_reach_queued_audio() {
        let shared = shared_with(2);
        queue_samples(&shared, 0, &[0.1, 0.1]);

        // Drain slot 0 completely; the cursor parks on slot 1 (empty)
        let mut out = [0.0f32; 4];
        fill_device_buffer(&mut out, 2, &shared);
        assert_eq!(shared.table.lock().unwrap().play_cursor, 1);

        // The refill lands back in slot 0; the callback must not starve it
        queue_samples(&shared, 0, &[0.7, 0.8]);
        let mut out = [0.0f32; 2];
        fill_device_buffer(&mut out, 2, &shared);

        assert_eq!(out, [0.7, 0.8]);
        assert_eq!(shared.table.lock().unwrap().play_cursor, 0);
    }

    #[test]
    fn exhausted_slot_flips_done_and_cursor_advances() {
        let shared = shared_with(2);
        queue_samples(&shared, 0, &[0.1, 0.1]);
        queue_samples(&shared, 1, &[0.2, 0.2, 0.3, 0.3]);

        // Drains slot 0 (one frame) then continues into slot 1
        let mut out = [0.0f32; 6];
        fill_device_buffer(&mut out, 2, &shared);

        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        let table = shared.table.lock().unwrap();
        assert_eq!(table.slots[0].state, BufferState::Done);
        assert_eq!(table.slots[1].state, BufferState::Playing);
        assert_eq!(table.play_cursor, 1);
    }
}
