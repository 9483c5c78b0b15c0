//! Hardware stream wiring for the audio bridge
//!
//! cpal exposes capture and playback as two streams with separate
//! callbacks, and the host chooses the period sizes. The input callback
//! only forwards raw samples into a small lock-free sample ring; the output
//! callback hands its period to a [`PeriodAdapter`], which feeds the
//! [`AudioBridge`] one whole block at a time.
//!
//! The streams live on a dedicated thread because `cpal::Stream` is not
//! `Send` on every host.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::bridge::AudioBridge;
use crate::audio::device::{input_device, output_device};
use crate::audio::period::PeriodAdapter;
use crate::config::AudioConfig;
use crate::constants::CHANNELS;
use crate::error::AudioError;
use crate::session::RunFlag;

/// Blocks of raw capture the input side may run ahead of the output side
const DRY_RING_BLOCKS: usize = 4;

/// Dry samples popped per slice of an output period, in blocks
const SCRATCH_BLOCKS: usize = 4;

/// Running capture + playback streams driving an [`AudioBridge`]
pub struct DuplexStream {
    active: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Receiver<AudioError>,
}

impl DuplexStream {
    /// Open both streams and start them
    ///
    /// Returns once the streams are playing, or with the setup error.
    pub fn start<const CAPACITY: usize>(
        config: &AudioConfig,
        bridge: AudioBridge<CAPACITY>,
        running: RunFlag,
    ) -> Result<Self, AudioError> {
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let active = Arc::new(AtomicBool::new(true));
        let thread_active = Arc::clone(&active);
        let config = config.clone();

        let handle = thread::Builder::new()
            .name("audio-bridge".to_string())
            .spawn(move || {
                let streams = match build_streams(&config, bridge, error_tx) {
                    Ok(streams) => streams,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                tracing::info!(
                    "Audio streams started: {} Hz, {} samples/block",
                    config.sample_rate,
                    config.block_size
                );
                let _ = ready_tx.send(Ok(()));

                // Keep thread alive while running
                while thread_active.load(Ordering::Relaxed) && running.is_running() {
                    thread::sleep(Duration::from_millis(10));
                }

                // Streams are dropped here, stopping the hardware
                drop(streams);
                tracing::info!("Audio streams stopped");
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                active,
                thread_handle: Some(handle),
                error_rx,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "audio thread exited during setup".to_string(),
                ))
            }
        }
    }

    /// Stop both streams and join the stream thread
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::Relaxed);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check for errors reported by the backend
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_streams<const CAPACITY: usize>(
    config: &AudioConfig,
    bridge: AudioBridge<CAPACITY>,
    error_tx: Sender<AudioError>,
) -> Result<(cpal::Stream, cpal::Stream), AudioError> {
    let input = input_device(config.input_device.as_deref())?;
    let output = output_device(config.output_device.as_deref())?;
    tracing::info!("Input device: {}, output device: {}", input.name, output.name);

    let block_len = config.block_size;
    let stream_config = StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let (mut dry_tx, dry_rx) = HeapRb::<f32>::new(block_len * DRY_RING_BLOCKS).split();
    let mut adapter = PeriodAdapter::new(bridge, dry_rx, block_len * SCRATCH_BLOCKS);

    let input_errors = error_tx.clone();
    let input_stream = input
        .inner()
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Whatever does not fit is dropped
                let _ = dry_tx.push_slice(data);
            },
            move |err| {
                let _ = input_errors.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::CpalError(e.to_string()))?;

    let output_stream = output
        .inner()
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                adapter.render(data);
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::CpalError(e.to_string()))?;

    input_stream
        .play()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;
    output_stream
        .play()
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok((input_stream, output_stream))
}
