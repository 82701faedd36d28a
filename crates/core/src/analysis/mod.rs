use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

const BEAT_GAIN: f32 = 12.0;
const BEAT_THRESHOLD: f32 = 0.6;
const MIN_BEAT_INTERVAL: f32 = 0.2;

/// Source of per-tick audio features. The scheduler samples it exactly once
/// per tick and hands the snapshot to every component read-only.
pub trait Analyser {
    fn sample(&mut self) -> AnalysisFrame;
}

impl<F> Analyser for F
where
    F: FnMut() -> AnalysisFrame,
{
    fn sample(&mut self) -> AnalysisFrame {
        self()
    }
}

/// Representation of the feature set for a single timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub time: f32,
    pub rms: f32,
    /// Normalised [0, 1] spectral centroid where 1.0 corresponds to the
    /// Nyquist frequency of the analysed block.
    pub spectral_centroid: f32,
    pub beat_confidence: f32,
    /// Set on the frame where a beat onset was registered.
    pub beat: bool,
    pub playing: bool,
    /// Magnitude per FFT bin, scaled by the block length.
    pub spectrum: Vec<f32>,
    pub waveform: Vec<f32>,
}

impl AnalysisFrame {
    /// A frame with nothing playing.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_beat(beat: bool) -> Self {
        Self {
            beat,
            playing: true,
            beat_confidence: if beat { 1.0 } else { 0.0 },
            ..Default::default()
        }
    }
}

/// Reference DSP front end producing [`AnalysisFrame`]s from blocks of mono
/// samples.
///
/// Only the newest frame is kept. Beats are latched until the next
/// [`AnalysisEngine::take_frame`], so a tick still sees an onset that landed
/// in an earlier block than the newest one.
pub struct AnalysisEngine {
    sample_rate: u32,
    latest: Option<AnalysisFrame>,
    beat_pending: bool,
    processed_samples: usize,
    last_rms: f32,
    last_beat: Option<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl AnalysisEngine {
    /// Creates a new engine using the default 48 kHz sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    /// Creates a new engine that operates at the provided sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            latest: None,
            beat_pending: false,
            processed_samples: 0,
            last_rms: 0.0,
            last_beat: None,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    /// Returns the sample rate associated with the engine.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clears the accumulated state while preserving configuration.
    pub fn reset(&mut self) {
        self.latest = None;
        self.beat_pending = false;
        self.processed_samples = 0;
        self.last_rms = 0.0;
        self.last_beat = None;
    }

    /// Consumes audio samples and updates the tracked features.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<AnalysisFrame> {
        if samples.len() < 2 {
            return Err(VisualiserError::msg(
                "analysis requires blocks with at least two samples",
            ));
        }

        let block_size = samples.len();
        let sample_rate = self.sample_rate as f32;
        let start_time = self.processed_samples as f32 / sample_rate;
        let end_time = (self.processed_samples + block_size) as f32 / sample_rate;
        let timestamp = start_time + (end_time - start_time) * 0.5;

        let rms = compute_rms(samples);
        let (beat_confidence, beat) = self.update_beats(timestamp, rms);
        let (centroid_hz, spectrum) = self.compute_spectrum(samples)?;
        let nyquist = (self.sample_rate as f32).max(1.0) * 0.5;
        let spectral_centroid = (centroid_hz / nyquist).clamp(0.0, 1.0);

        self.processed_samples += block_size;
        self.beat_pending |= beat;

        let frame = AnalysisFrame {
            time: timestamp,
            rms,
            spectral_centroid,
            beat_confidence,
            beat,
            playing: true,
            spectrum,
            waveform: samples.to_vec(),
        };
        self.latest = Some(frame.clone());
        Ok(frame)
    }

    /// Returns the latest frame emitted by the engine, if any.
    pub fn latest_frame(&self) -> Option<&AnalysisFrame> {
        self.latest.as_ref()
    }

    /// Returns the newest frame for one tick. Its `beat` flag reports whether
    /// any block since the previous call carried an onset, and is then
    /// cleared.
    pub fn take_frame(&mut self) -> Option<AnalysisFrame> {
        let mut frame = self.latest.clone()?;
        frame.beat = std::mem::take(&mut self.beat_pending);
        Some(frame)
    }

    fn update_beats(&mut self, timestamp: f32, rms: f32) -> (f32, bool) {
        let delta = (rms - self.last_rms).max(0.0);
        self.last_rms = rms;
        let confidence = (delta * BEAT_GAIN).clamp(0.0, 1.0);

        let spaced = self
            .last_beat
            .map(|last| timestamp - last >= MIN_BEAT_INTERVAL)
            .unwrap_or(true);
        let beat = confidence >= BEAT_THRESHOLD && spaced;
        if beat {
            self.last_beat = Some(timestamp);
        }
        (confidence, beat)
    }

    /// Returns the spectral centroid in Hz and the per-bin magnitudes.
    fn compute_spectrum(&mut self, samples: &[f32]) -> Result<(f32, Vec<f32>)> {
        let len = samples.len();
        let sample_rate = self.sample_rate as f32;
        let fft = self.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| VisualiserError::msg(format!("fft failed: {err}")))?;

        let mut magnitude_sum = 0.0;
        let mut weighted_sum = 0.0;
        let bin_hz = sample_rate / len as f32;
        let mut magnitudes = Vec::with_capacity(fft.spectrum.len());

        for (i, bin) in fft.spectrum.iter().enumerate() {
            let magnitude = bin.norm();
            magnitude_sum += magnitude;
            weighted_sum += magnitude * (i as f32 * bin_hz);
            magnitudes.push(magnitude / len as f32);
        }

        let centroid = if magnitude_sum <= f32::EPSILON {
            0.0
        } else {
            weighted_sum / magnitude_sum
        };
        Ok((centroid, magnitudes))
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let planner = &mut self.fft_planner;
        let fft = self.fft.get_or_insert_with(|| FftResources::plan(planner, size));
        if fft.size != size {
            *fft = FftResources::plan(planner, size);
        }
        fft
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("sample_rate", &self.sample_rate)
            .field("processed_samples", &self.processed_samples)
            .field("last_rms", &self.last_rms)
            .field("beat_pending", &self.beat_pending)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
