use std::sync::Arc;

use crate::audio::{MasterBus, SampleBuffer};
use crate::audio_api::{AudioCommand, StartVoice, VoiceKey, VoiceSource};
use crate::shared::{CueId, PadId, SessionId, next_session_id};
use crate::tone::{ToneSpec, db_to_gain};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Playing,
    Paused,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Cue(CueId),
    Pad(PadId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Tone,
    File,
}

#[derive(Clone, Debug)]
enum Source {
    Tone { hz: f64 },
    File { buffer: Arc<SampleBuffer> },
}

// Every voice carries (session, token). The token moves on pause, resume and stop,
// so an Ended from an older voice never finishes the current one.
pub struct PlaybackSession {
    id: SessionId,
    owner: Owner,
    source: Source,
    bus: MasterBus,
    gain: f32,
    pan: f32,
    duration: f64,
    state: SessionState,
    started: bool,      // start() is one-shot, even after stop()
    offset: f64,        // seconds played before the current run segment
    segment_start: f64, // audio clock at the last start/resume
    token: u64,
}

impl PlaybackSession {
    pub fn tone(owner: Owner, spec: ToneSpec, bus: MasterBus) -> Self {
        Self::new(
            owner,
            Source::Tone { hz: spec.hz },
            spec.seconds,
            spec.gain_db,
            spec.pan,
            bus,
        )
    }

    pub fn file(
        owner: Owner,
        buffer: Arc<SampleBuffer>,
        gain_db: f64,
        pan: f64,
        bus: MasterBus,
    ) -> Self {
        let duration = buffer.duration_seconds();
        Self::new(owner, Source::File { buffer }, duration, gain_db, pan, bus)
    }

    fn new(
        owner: Owner,
        source: Source,
        duration: f64,
        gain_db: f64,
        pan: f64,
        bus: MasterBus,
    ) -> Self {
        let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            id: next_session_id(),
            owner,
            source,
            bus,
            gain: db_to_gain(gain_db) as f32,
            pan: pan as f32,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            state: SessionState::Stopped,
            started: false,
            offset: 0.0,
            segment_start: 0.0,
            token: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn kind(&self) -> SourceKind {
        match self.source {
            Source::Tone { .. } => SourceKind::Tone,
            Source::File { .. } => SourceKind::File,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Frequency for tone sessions.
    pub fn tone_hz(&self) -> Option<f64> {
        match self.source {
            Source::Tone { hz } => Some(hz),
            Source::File { .. } => None,
        }
    }

    /// Key of the generator currently (or most recently) started.
    pub fn key(&self) -> VoiceKey {
        VoiceKey {
            session: self.id,
            token: self.token,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Paused)
    }

    /// Stopped -> Playing. Only the first call on a fresh session does
    /// anything.
    pub fn start(&mut self) -> bool {
        if self.started || self.state != SessionState::Stopped {
            return false;
        }
        self.started = true;
        if !self.launch() {
            return false;
        }
        tracing::debug!(
            session = self.id.0,
            kind = ?self.kind(),
            duration = self.duration,
            "session started"
        );
        true
    }

    /// Playing -> Paused, freezing elapsed time into the offset.
    pub fn pause(&mut self) {
        if self.state != SessionState::Playing {
            return;
        }
        self.offset += self.segment_elapsed();
        self.release();
        self.state = SessionState::Paused;
    }

    /// Paused -> Playing from the saved offset, or straight to Finished if
    /// there is nothing left to play.
    pub fn resume(&mut self) {
        if self.state != SessionState::Paused {
            return;
        }
        if self.duration > 0.0 && self.offset >= self.duration {
            self.state = SessionState::Finished;
            return;
        }
        self.launch();
    }

    /// Any live state -> Stopped. Repeated calls do nothing.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Playing => self.release(),
            // generator already gone, just make sure nothing stale matches
            SessionState::Paused => self.token += 1,
            SessionState::Stopped | SessionState::Finished => return,
        }
        self.offset = 0.0;
        self.state = SessionState::Stopped;
        tracing::debug!(session = self.id.0, "session stopped");
    }

    /// The engine reported that generator `key` ran out. Returns `true` when
    /// that finished this session; stale or foreign keys are ignored.
    pub fn on_generator_ended(&mut self, key: VoiceKey) -> bool {
        if key != self.key() || self.state != SessionState::Playing {
            return false;
        }
        self.offset = self.duration;
        self.state = SessionState::Finished;
        true
    }

    /// Fraction played, in [0, 1]. Always 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.state == SessionState::Finished {
            return 1.0;
        }
        if self.duration <= 0.0 {
            return 0.0;
        }
        let played = match self.state {
            SessionState::Playing => self.offset + self.segment_elapsed(),
            SessionState::Paused => self.offset,
            _ => 0.0,
        };
        (played / self.duration).clamp(0.0, 1.0)
    }

    fn segment_elapsed(&self) -> f64 {
        (self.bus.now() - self.segment_start).max(0.0)
    }

    // new generator at the current offset
    fn launch(&mut self) -> bool {
        self.token += 1;
        let source = match &self.source {
            Source::Tone { hz } => VoiceSource::Tone { hz: *hz as f32 },
            Source::File { buffer } => VoiceSource::Buffer(buffer.clone()),
        };
        let length_seconds = match self.source {
            Source::Tone { .. } => Some(self.duration),
            Source::File { .. } => None,
        };
        let sent = self.bus.send(AudioCommand::Start(StartVoice {
            key: self.key(),
            source,
            offset_seconds: self.offset,
            length_seconds,
            gain: self.gain,
            pan: self.pan,
        }));
        if !sent {
            self.state = SessionState::Stopped;
            return false;
        }
        self.segment_start = self.bus.now();
        self.state = SessionState::Playing;
        true
    }

    // tear down the current generator and invalidate its key
    fn release(&mut self) {
        self.bus.send(AudioCommand::Stop(self.key()));
        self.token += 1;
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop();
    }
}
