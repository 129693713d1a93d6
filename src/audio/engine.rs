use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use super::clock::AudioClock;
use super::frame::StereoFrame;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, VoiceEvent, VoiceKey};

/// Render side of the output context. Lives on the audio thread (or is driven
/// by hand in headless mode) and never allocates after construction.
pub struct Engine {
    sample_rate: u32,
    voices: Vec<Option<Voice>>, // fixed pool, sized once
    started: Vec<u64>,          // start serial per slot, for stealing the oldest
    serial: u64,
    commands: Receiver<AudioCommand>,
    events: Sender<VoiceEvent>,
    master_gain: f32,
    master_target: f32,
    smoothing: f32, // one-pole coefficient per frame, 0 = jump
    clock: Arc<AudioClock>,
}

impl Engine {
    pub fn new(
        clock: Arc<AudioClock>,
        commands: Receiver<AudioCommand>,
        events: Sender<VoiceEvent>,
        max_voices: usize,
        smoothing_ms: f32,
    ) -> Self {
        let sample_rate = clock.sample_rate();
        Self {
            sample_rate,
            voices: (0..max_voices.max(1)).map(|_| None).collect(),
            started: vec![0; max_voices.max(1)],
            serial: 0,
            commands,
            events,
            master_gain: 1.0,
            master_target: 1.0,
            smoothing: smoothing_coefficient(smoothing_ms, sample_rate),
            clock,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Start(start) => {
                let voice = Voice::new(start, self.sample_rate);
                self.place_voice(voice);
            }
            AudioCommand::Stop(key) => self.stop_voice(key),
            AudioCommand::SetMasterGain(gain) => {
                self.master_target = if gain.is_finite() {
                    gain.clamp(0.0, 1.0)
                } else {
                    0.0
                };
            }
        }
    }

    fn place_voice(&mut self, voice: Voice) {
        // what slot do we write to?
        let slot = match self.voices.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                // pool is full: steal the voice started longest ago and tell its owner it ended
                let oldest = (0..self.started.len())
                    .min_by_key(|&i| self.started[i])
                    .unwrap_or(0);
                if let Some(stolen) = self.voices[oldest].take() {
                    let _ = self.events.try_send(VoiceEvent::Ended(stolen.key));
                }
                oldest
            }
        };
        self.serial += 1;
        self.started[slot] = self.serial;
        self.voices[slot] = Some(voice);
    }

    fn stop_voice(&mut self, key: VoiceKey) {
        for slot in self.voices.iter_mut() {
            if slot.as_ref().is_some_and(|v| v.key == key) {
                *slot = None;
            }
        }
    }

    #[cfg(test)]
    fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    /// Apply pending commands, then render one block into `out` (overwritten).
    pub fn process(&mut self, out: &mut [StereoFrame]) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.handle_cmd(cmd);
        }

        out.fill(StereoFrame::zero());
        for slot in self.voices.iter_mut() {
            let Some(voice) = slot else { continue };
            voice.render_into(out);
            if !voice.is_active() {
                let _ = self.events.try_send(VoiceEvent::Ended(voice.key));
                *slot = None;
            }
        }

        for frame in out.iter_mut() {
            self.master_gain =
                self.master_target + (self.master_gain - self.master_target) * self.smoothing;
            *frame = frame.scaled(self.master_gain);
        }

        self.clock.advance(out.len());
        self.clock.publish_master_gain(self.master_gain);
    }
}

fn smoothing_coefficient(time_constant_ms: f32, sample_rate: u32) -> f32 {
    if !(time_constant_ms > 0.0) || sample_rate == 0 {
        return 0.0;
    }
    let tau_frames = time_constant_ms / 1000.0 * sample_rate as f32;
    (-1.0 / tau_frames).exp()
}
