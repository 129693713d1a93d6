use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::audio::{AudioOutput, OutputContext};
use crate::audio_api::VoiceEvent;
use crate::cache::{DecodeCache, Decoded, EntryState};
use crate::session::{Owner, PlaybackSession, SessionState};
use crate::shared::{CueId, PadId, SessionId};
use crate::show::{Cue, CueSource, Show, format_duration_label};

// selected cue plus this many after it get decoded ahead of time
const UPCOMING_CUES: usize = 2;

/// What a GO or pad hit turned into.
pub enum Launch {
    Started(SessionId),
    /// Still decoding. Await it and hand the result to [`CueRunner::land`].
    Decoding(PendingStart),
    Nothing,
}

pub type PendingStart = LocalBoxFuture<'static, Arrival>;

/// A decoded (or failed) file together with who asked for it.
pub struct Arrival {
    owner: Owner,
    gain_db: f64,
    pan: f64,
    decoded: Decoded,
}

impl Arrival {
    pub fn owner(&self) -> &Owner {
        &self.owner
    }
}

// cue sessions are grouped per cue and GO again overlaps; pad hits live apart
// so they never become a stop target
pub struct CueRunner {
    show: Show,
    cache: Rc<DecodeCache>,
    output: Rc<OutputContext>,
    default_tone_seconds: f64,
    selected: Option<CueId>,
    live: BTreeMap<CueId, Vec<PlaybackSession>>,
    one_shots: Vec<PlaybackSession>,
    last_played: Option<CueId>,
    paused: bool,
    last_latency: Option<Duration>,
}

impl CueRunner {
    pub fn new(
        show: Show,
        cache: Rc<DecodeCache>,
        output: Rc<OutputContext>,
        default_tone_seconds: f64,
    ) -> Self {
        let mut runner = Self {
            show,
            cache,
            output,
            default_tone_seconds,
            selected: None,
            live: BTreeMap::new(),
            one_shots: Vec::new(),
            last_played: None,
            paused: false,
            last_latency: None,
        };
        if let Some(first) = runner.show.first_cue().map(|c| c.id.clone()) {
            runner.select(&first);
        }
        runner
    }

    pub fn show(&self) -> &Show {
        &self.show
    }

    pub fn output(&self) -> &Rc<OutputContext> {
        &self.output
    }

    pub fn selected(&self) -> Option<&CueId> {
        self.selected.as_ref()
    }

    pub fn selected_cue(&self) -> Option<&Cue> {
        self.selected.as_ref().and_then(|id| self.show.cue(id))
    }

    pub fn last_played(&self) -> Option<&CueId> {
        self.last_played.as_ref()
    }

    /// The process-wide pause flag.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Latency estimate captured after the last successful GO or pad hit.
    pub fn latency(&self) -> Option<Duration> {
        self.last_latency
    }

    /// The show's own label, else the tone length, else the length of the
    /// file once it has been decoded.
    pub fn duration_label(&self, cue: &Cue) -> Option<String> {
        if let Some(label) = &cue.duration_label {
            return Some(label.clone());
        }
        let seconds = match cue.source(self.default_tone_seconds)? {
            CueSource::Tone(spec) => spec.seconds,
            CueSource::File { path, .. } => self.cache.duration_seconds(&path)?,
        };
        format_duration_label(seconds)
    }

    /// A file cue whose decode is still running.
    pub fn is_decoding(&self, cue: &Cue) -> bool {
        match cue.source(self.default_tone_seconds) {
            Some(CueSource::File { path, .. }) => {
                self.cache.entry_state(&path) == Some(EntryState::Pending)
            }
            _ => false,
        }
    }

    pub fn sessions(&self, cue: &CueId) -> &[PlaybackSession] {
        self.live.get(cue).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn one_shots(&self) -> &[PlaybackSession] {
        &self.one_shots
    }

    pub fn has_live_sessions(&self) -> bool {
        self.live.values().any(|set| !set.is_empty()) || !self.one_shots.is_empty()
    }

    /// Play the selected cue and move the selection on by one ordinal.
    ///
    /// Tones start right away. Files come back as [`Launch::Decoding`] unless
    /// the cue has nothing usable or the output can't be opened. A file that
    /// won't decode starts nothing and leaves the selection alone.
    pub fn go(&mut self) -> Launch {
        let Some(cue) = self.selected_cue().cloned() else {
            return Launch::Nothing;
        };
        let Some(source) = cue.source(self.default_tone_seconds) else {
            tracing::debug!(cue = %cue.id, "GO on a cue with nothing to play");
            return Launch::Nothing;
        };
        let Some(output) = self.open_output() else {
            return Launch::Nothing;
        };
        let owner = Owner::Cue(cue.id.clone());
        match source {
            CueSource::Tone(spec) => {
                let session = PlaybackSession::tone(owner, spec, output.bus().clone());
                self.launch(session, &output)
                    .map_or(Launch::Nothing, Launch::Started)
            }
            CueSource::File { path, gain_db, pan } => {
                Launch::Decoding(self.fetch(owner, path, gain_db, pan))
            }
        }
    }

    /// Fire a pad's file once at unity gain, centre pan.
    pub fn play_pad(&mut self, pad: &PadId) -> Launch {
        let Some(path) = self.show.pad(pad).and_then(|p| p.media()) else {
            return Launch::Nothing;
        };
        let path = path.to_string();
        if self.open_output().is_none() {
            return Launch::Nothing;
        }
        Launch::Decoding(self.fetch(Owner::Pad(pad.clone()), path, 0.0, 0.0))
    }

    /// Start the session a [`Launch::Decoding`] was waiting for. A cue that
    /// is still selected moves the selection on, same as a tone GO.
    pub fn land(&mut self, arrival: Arrival) -> Option<SessionId> {
        let Arrival {
            owner,
            gain_db,
            pan,
            decoded,
        } = arrival;
        // the cache already logged why
        let buffer = decoded.ok()?;
        let output = self.open_output()?;
        let session = PlaybackSession::file(owner, buffer, gain_db, pan, output.bus().clone());
        self.launch(session, &output)
    }

    /// Which cue a bare "stop" affects: the selected cue if it is playing,
    /// else the last cue played if that still is, else the lowest numbered
    /// cue with anything live.
    pub fn resolve_stop_target(&self) -> Option<CueId> {
        let playing = |id: &CueId| self.live.get(id).is_some_and(|set| !set.is_empty());

        if let Some(sel) = self.selected.as_ref().filter(|id| playing(id)) {
            return Some(sel.clone());
        }
        if let Some(last) = self.last_played.as_ref().filter(|id| playing(id)) {
            return Some(last.clone());
        }
        self.live
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .min_by_key(|(id, _)| (self.show.cue(id).map_or(u32::MAX, |c| c.number), *id))
            .map(|(id, _)| id.clone())
    }

    /// Stop every session of the stop target and nothing else.
    pub fn stop_selected(&mut self) -> Option<CueId> {
        let target = self.resolve_stop_target()?;
        if let Some(mut set) = self.live.remove(&target) {
            for session in &mut set {
                session.stop();
            }
            tracing::info!(cue = %target, sessions = set.len(), "stopped cue");
        }
        Some(target)
    }

    /// Stop everything, forget what was played and drop the pause flag.
    pub fn stop_all(&mut self) {
        let mut stopped = 0;
        for session in self.live.values_mut().flatten().chain(self.one_shots.iter_mut()) {
            if session.is_live() {
                stopped += 1;
            }
            session.stop();
        }
        self.live.clear();
        self.one_shots.clear();
        self.last_played = None;
        self.paused = false;
        tracing::info!(sessions = stopped, "stop all");
    }

    /// Flip the process-wide pause flag. GO keeps working while paused and
    /// starts a fresh session that plays.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        let pausing = self.paused;
        for session in self.live.values_mut().flatten().chain(self.one_shots.iter_mut()) {
            if pausing {
                session.pause();
            } else {
                session.resume();
            }
        }
        tracing::info!(paused = pausing, "pause toggled");
        pausing
    }

    pub fn select(&mut self, id: &CueId) -> bool {
        if self.show.cue(id).is_none() {
            return false;
        }
        if self.selected.as_ref() != Some(id) {
            self.selected = Some(id.clone());
            self.preload_upcoming();
        }
        true
    }

    /// Move the selection up one row, stopping at the top.
    pub fn select_previous(&mut self) -> bool {
        self.step_selection(-1)
    }

    /// Move the selection down one row, stopping at the bottom.
    pub fn select_next(&mut self) -> bool {
        self.step_selection(1)
    }

    fn step_selection(&mut self, delta: isize) -> bool {
        let cues = &self.show.cues;
        if cues.is_empty() {
            return false;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|id| cues.iter().position(|c| &c.id == id));
        let next = match current {
            Some(i) => i.saturating_add_signed(delta).min(cues.len() - 1),
            None => 0,
        };
        let id = cues[next].id.clone();
        let changed = self.selected.as_ref() != Some(&id);
        self.select(&id);
        changed
    }

    /// Apply completion notifications from the engine. Sessions that ended
    /// on their own leave their cue's set right away.
    pub fn pump_voice_events(&mut self) -> usize {
        let Some(output) = self.output.get() else {
            return 0;
        };
        let mut finished = 0;
        for VoiceEvent::Ended(key) in output.drain_events() {
            let session = self
                .live
                .values_mut()
                .flatten()
                .chain(self.one_shots.iter_mut())
                .find(|s| s.id() == key.session);
            if session.is_some_and(|s| s.on_generator_ended(key)) {
                finished += 1;
            }
        }
        if finished > 0 {
            self.detach_finished();
        }
        finished
    }

    /// One progress pass: per cue, the furthest-along session that is still
    /// short of the end. Sessions that reached the end are retired, cues
    /// left with nothing are dropped from the map and the snapshot.
    pub fn retire_and_snapshot(&mut self) -> BTreeMap<CueId, f64> {
        let mut snapshot = BTreeMap::new();
        self.live.retain(|cue, set| {
            set.retain(|s| s.is_live() && s.progress() < 1.0);
            if set.is_empty() {
                return false;
            }
            let max = set.iter().map(PlaybackSession::progress).fold(0.0, f64::max);
            snapshot.insert(cue.clone(), max);
            true
        });
        self.one_shots.retain(|s| s.is_live() && s.progress() < 1.0);
        snapshot
    }

    /// Start decoding the selected cue, the next couple after it, and every
    /// pad.
    pub fn preload_upcoming(&self) {
        let start = self
            .selected
            .as_ref()
            .and_then(|id| self.show.cues.iter().position(|c| &c.id == id))
            .unwrap_or(0);
        let cue_paths = self
            .show
            .cues
            .iter()
            .skip(start)
            .take(UPCOMING_CUES + 1)
            .filter_map(|c| match c.source(self.default_tone_seconds) {
                Some(CueSource::File { path, .. }) => Some(path),
                _ => None,
            });
        let pad_paths = self.show.pads.iter().filter_map(|p| p.media().map(str::to_string));
        for path in cue_paths.chain(pad_paths) {
            self.cache.preload(&path);
        }
    }

    /// Stop everything, drop every decoded buffer and decode the upcoming
    /// files again. Picks up media that changed on disk.
    pub fn reset(&mut self) {
        self.stop_all();
        self.cache.invalidate();
        self.preload_upcoming();
    }

    fn fetch(&self, owner: Owner, path: String, gain_db: f64, pan: f64) -> PendingStart {
        let cache = self.cache.clone();
        async move {
            let decoded = cache.resolve(&path).await;
            Arrival {
                owner,
                gain_db,
                pan,
                decoded,
            }
        }
        .boxed_local()
    }

    fn launch(&mut self, mut session: PlaybackSession, output: &AudioOutput) -> Option<SessionId> {
        if !session.start() {
            return None;
        }
        let id = session.id();
        self.last_latency = output.latency_estimate();
        match session.owner().clone() {
            Owner::Cue(cue) => {
                let number = self.show.cue(&cue).map(|c| c.number);
                tracing::info!(cue = %cue, number, session = id.0, "GO");
                self.live.entry(cue.clone()).or_default().push(session);
                let still_selected = self.selected.as_ref() == Some(&cue);
                self.last_played = Some(cue);
                let next = number
                    .and_then(|n| self.show.cue_after(n))
                    .map(|c| c.id.clone());
                if let Some(next) = next.filter(|_| still_selected) {
                    self.select(&next);
                }
            }
            Owner::Pad(pad) => {
                tracing::info!(pad = %pad, session = id.0, "pad hit");
                self.one_shots.push(session);
            }
        }
        Some(id)
    }

    fn detach_finished(&mut self) {
        self.live.retain(|_, set| {
            set.retain(|s| s.state() != SessionState::Finished);
            !set.is_empty()
        });
        self.one_shots.retain(|s| s.state() != SessionState::Finished);
    }

    fn open_output(&self) -> Option<Rc<AudioOutput>> {
        match self.output.ensure() {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!("audio output unavailable: {e}");
                None
            }
        }
    }
}
