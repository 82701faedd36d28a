use std::sync::{Arc, Mutex, MutexGuard};

use crate::{AnalysisEngine, AnalysisFrame, Analyser, Result, VisualiserError};

/// High level audio engine façade.
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    analysis: Arc<Mutex<AnalysisEngine>>,
}

impl AudioEngine {
    /// Creates a new audio engine instance at 48 kHz.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    /// Creates a new audio engine instance using an explicit sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            analysis: Arc::new(Mutex::new(AnalysisEngine::with_sample_rate(sample_rate))),
        }
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Resets the analysis pipeline and returns a handle the render loop can
    /// sample from.
    pub fn start(&self) -> Result<AnalysisHandle> {
        self.lock_analysis()?.reset();
        Ok(AnalysisHandle::new(self.analysis.clone()))
    }

    /// Feeds a block of floating point samples into the engine.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut engine = self.lock_analysis()?;
        engine.process_block(samples).map(|_| ())
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, AnalysisEngine>> {
        self.analysis
            .lock()
            .map_err(|_| VisualiserError::msg("analysis pipeline has been poisoned"))
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared view over the analysis engine managed by [`AudioEngine`].
#[derive(Clone)]
pub struct AnalysisHandle {
    shared: Arc<Mutex<AnalysisEngine>>,
}

impl AnalysisHandle {
    pub(crate) fn new(shared: Arc<Mutex<AnalysisEngine>>) -> Self {
        Self { shared }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnalysisEngine>> {
        self.shared
            .lock()
            .map_err(|_| VisualiserError::msg("analysis pipeline has been poisoned"))
    }
}

impl Analyser for AnalysisHandle {
    /// Returns the most recent frame. A beat from any block pushed since the
    /// previous tick is reported on this tick only.
    fn sample(&mut self) -> AnalysisFrame {
        match self.lock() {
            Ok(mut engine) => engine.take_frame().unwrap_or_else(AnalysisFrame::silent),
            Err(err) => {
                tracing::warn!(%err, "analysis unavailable, sampling silence");
                AnalysisFrame::silent()
            }
        }
    }
}

impl std::fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_samples_into_shared_analysis() {
        let audio = AudioEngine::with_sample_rate(100);
        let mut analysis = audio.start().unwrap();

        audio
            .push_samples(&[1.0_f32; 32])
            .expect("pushing samples should succeed");

        let frame = analysis.sample();
        assert!(frame.playing);
        assert!(frame.rms > 0.0);
    }

    #[test]
    fn beat_between_ticks_is_not_lost() {
        let audio = AudioEngine::with_sample_rate(100);
        let mut analysis = audio.start().unwrap();

        audio.push_samples(&[0.0_f32; 25]).unwrap();
        audio.push_samples(&[1.0_f32; 25]).unwrap();
        audio.push_samples(&[1.0_f32; 25]).unwrap();

        assert!(analysis.sample().beat);
        assert!(!analysis.sample().beat);
    }

    #[test]
    fn beat_is_reported_once_per_block() {
        let audio = AudioEngine::with_sample_rate(100);
        let mut analysis = audio.start().unwrap();

        audio.push_samples(&[0.0_f32; 25]).unwrap();
        audio.push_samples(&[1.0_f32; 25]).unwrap();

        assert!(analysis.sample().beat);
        let again = analysis.sample();
        assert!(!again.beat);
        assert!(again.rms > 0.0);
    }

    #[test]
    fn samples_silence_before_any_audio() {
        let audio = AudioEngine::new();
        let mut analysis = audio.start().unwrap();
        assert_eq!(analysis.sample(), AnalysisFrame::silent());
    }
}
