use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::fader::MasterFader;
use crate::poller::ProgressPoller;
use crate::runner::{Arrival, CueRunner, Launch, PendingStart};
use crate::session::Owner;
use crate::shared::{CueRow, DisplayState};

// the whole transport surface; keys (and anything else) map onto these six
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Go,
    StopAll,
    StopSelected,
    TogglePause,
    SelectPrevious,
    SelectNext,
}

pub struct Console {
    runner: CueRunner,
    poller: ProgressPoller,
    fader: MasterFader,
    pending: FuturesUnordered<PendingStart>, // GOs and pad hits waiting on a decode
    status: String,
}

impl Console {
    pub fn new(runner: CueRunner, poller: ProgressPoller, fader: MasterFader) -> Self {
        Self {
            runner,
            poller,
            fader,
            pending: FuturesUnordered::new(),
            status: String::new(),
        }
    }

    pub fn runner(&self) -> &CueRunner {
        &self.runner
    }

    pub fn fader(&mut self) -> &mut MasterFader {
        &mut self.fader
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Run one command. Never waits: a file GO is parked until its decode
    /// comes back through [`Console::next_arrival`].
    pub fn dispatch(&mut self, cmd: Command) {
        match cmd {
            Command::Go => {
                let what = format!(
                    "GO {}",
                    self.runner.selected_cue().map_or(0, |c| c.number)
                );
                let launch = self.runner.go();
                self.accept(launch, what);
            }
            Command::StopAll => {
                self.runner.stop_all();
                // starts still decoding would play after the stop otherwise
                self.pending = FuturesUnordered::new();
                self.poller.clear();
                self.status = "stopped all".to_string();
            }
            Command::StopSelected => match self.runner.stop_selected() {
                Some(cue) => {
                    self.poller.forget(&cue);
                    self.status = format!("stopped {cue}");
                }
                None => self.status = "nothing playing".to_string(),
            },
            Command::TogglePause => {
                let paused = self.runner.toggle_pause();
                self.status = if paused { "paused" } else { "resumed" }.to_string();
                // resumed sessions need progress again
                self.poller.arm();
            }
            Command::SelectPrevious => {
                self.runner.select_previous();
            }
            Command::SelectNext => {
                self.runner.select_next();
            }
        }
    }

    /// Fire the pad at `index` in show order.
    pub fn play_pad(&mut self, index: usize) {
        let Some(pad) = self.runner.show().pads.get(index) else {
            return;
        };
        let (id, what) = (pad.id.clone(), format!("hit {}", pad.label));
        let launch = self.runner.play_pad(&id);
        self.accept(launch, what);
    }

    /// Stop everything and decode the media again from disk.
    pub fn reset(&mut self) {
        self.pending = FuturesUnordered::new();
        self.runner.reset();
        self.poller.clear();
        self.status = "media reloaded".to_string();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The next parked start whose decode finished. `None` right away when
    /// nothing is parked.
    pub async fn next_arrival(&mut self) -> Option<Arrival> {
        self.pending.next().await
    }

    /// Start what a finished decode was waiting for.
    pub fn land(&mut self, arrival: Arrival) {
        let what = self.describe(arrival.owner());
        let started = self.runner.land(arrival);
        self.status = match started {
            Some(_) => {
                self.poller.arm();
                what
            }
            None => format!("{what}: nothing to play"),
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.poller.deadline()
    }

    pub fn tick(&mut self) {
        self.poller.tick(&mut self.runner);
    }

    pub fn display_state(&self) -> DisplayState {
        let show = self.runner.show();
        let stop_target = self.runner.resolve_stop_target();
        let cues = show
            .cues
            .iter()
            .map(|cue| CueRow {
                id: cue.id.clone(),
                number: cue.number,
                title: cue.title.clone(),
                subtitle: cue.subtitle.clone(),
                duration_label: self.runner.duration_label(cue),
                decoding: self.runner.is_decoding(cue),
                source_label: cue.source_label(),
                progress: self.poller.progress(&cue.id),
                selected: self.runner.selected() == Some(&cue.id),
                stop_target: stop_target.as_ref() == Some(&cue.id),
            })
            .collect();
        DisplayState {
            show_title: show.title.clone(),
            cues,
            pads: show.pads.iter().map(|p| p.label.clone()).collect(),
            paused: self.runner.is_paused(),
            master_level: self.fader.level(),
            dimmed: self.fader.is_dimmed(),
            latency_ms: self.runner.latency().map(|d| d.as_secs_f64() * 1000.0),
            status: self.status.clone(),
        }
    }

    fn accept(&mut self, launch: Launch, what: String) {
        self.status = match launch {
            Launch::Started(_) => {
                self.poller.arm();
                what
            }
            Launch::Decoding(pending) => {
                self.pending.push(pending);
                format!("{what} (loading)")
            }
            Launch::Nothing => format!("{what}: nothing to play"),
        };
    }

    fn describe(&self, owner: &Owner) -> String {
        let show = self.runner.show();
        match owner {
            Owner::Cue(id) => format!("GO {}", show.cue(id).map_or(0, |c| c.number)),
            Owner::Pad(id) => format!("hit {}", show.pad(id).map_or("?", |p| p.label.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::audio::testing::context;
    use crate::cache::DecodeCache;
    use crate::cache::testing::FakeDecoder;
    use crate::shared::{CueId, PadId};
    use crate::show::{Cue, Pad, Show, tone_test_show};

    fn console_with(show: Show, fake: FakeDecoder) -> Console {
        let output = context();
        let cache = Rc::new(DecodeCache::new(Arc::new(fake)));
        let runner = CueRunner::new(show, cache, output.clone(), 1.0);
        let poller = ProgressPoller::new(Duration::from_millis(16));
        let fader = MasterFader::new(output, 0.02, 0.3);
        Console::new(runner, poller, fader)
    }

    fn console() -> Console {
        console_with(tone_test_show(), FakeDecoder::default())
    }

    // a long file up front, tones after it, and two pads
    fn big_file_show() -> Show {
        let mut show = tone_test_show();
        show.cues[0] = Cue::file("big", 1, "Big", "big.mp3");
        show.pads = vec![
            Pad {
                id: PadId::new("p1"),
                label: "Applause".to_string(),
                media_path: Some("applause.wav".to_string()),
            },
            Pad {
                id: PadId::new("p2"),
                label: "Boo".to_string(),
                media_path: Some("boo.wav".to_string()),
            },
        ];
        show
    }

    #[tokio::test]
    async fn go_arms_the_poller_and_marks_rows() {
        let mut c = console();
        c.dispatch(Command::Go);
        assert!(c.deadline().is_some());
        assert_eq!(c.status(), "GO 1");

        c.runner.output().get().unwrap().render(0.5);
        c.tick();
        let ds = c.display_state();
        assert_eq!(ds.cues.len(), 8);
        assert!(ds.cues[0].stop_target);
        assert!(ds.cues[1].selected);
        assert!((ds.cues[0].progress.unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(ds.cues[0].duration_label.as_deref(), Some("-00:01,0"));
        assert_eq!(ds.cues[0].source_label, "220 Hz");
    }

    #[tokio::test]
    async fn stop_commands_clear_progress() {
        let mut c = console();
        c.dispatch(Command::Go);
        c.dispatch(Command::Go);
        c.tick();

        c.dispatch(Command::StopSelected);
        let ds = c.display_state();
        assert_eq!(ds.cues.iter().filter(|r| r.progress.is_some()).count(), 1);

        c.dispatch(Command::StopAll);
        let ds = c.display_state();
        assert!(ds.cues.iter().all(|r| r.progress.is_none() && !r.stop_target));
        assert!(c.deadline().is_none());
    }

    #[tokio::test]
    async fn pause_and_selection_commands() {
        let mut c = console();
        c.dispatch(Command::SelectNext);
        c.dispatch(Command::SelectNext);
        c.dispatch(Command::SelectPrevious);
        assert_eq!(c.runner().selected(), Some(&CueId::new("t2")));

        c.dispatch(Command::TogglePause);
        assert!(c.display_state().paused);
        c.dispatch(Command::TogglePause);
        assert!(!c.display_state().paused);
    }

    #[tokio::test]
    async fn stop_all_is_not_held_up_by_a_slow_decode() {
        let fake = FakeDecoder::default()
            .with_file("big.mp3", 2.0)
            .slow("big.mp3", Duration::from_millis(300));
        let mut c = console_with(big_file_show(), fake);

        let pressed = std::time::Instant::now();
        c.dispatch(Command::Go);
        assert!(c.has_pending());
        c.dispatch(Command::StopAll);
        assert!(pressed.elapsed() < Duration::from_millis(300));
        assert_eq!(c.status(), "stopped all");
        assert!(!c.has_pending());

        // the abandoned start never plays, even once the decode is done
        assert!(c.next_arrival().await.is_none());
        tokio::time::sleep(Duration::from_millis(400)).await;
        c.tick();
        assert!(!c.runner().has_live_sessions());
        assert_eq!(c.runner().selected(), Some(&CueId::new("big")));
    }

    #[tokio::test]
    async fn file_go_lands_after_other_input() {
        let fake = FakeDecoder::default()
            .with_file("big.mp3", 2.0)
            .slow("big.mp3", Duration::from_millis(50));
        let mut c = console_with(big_file_show(), fake);

        c.dispatch(Command::Go);
        assert_eq!(c.status(), "GO 1 (loading)");
        assert!(c.deadline().is_none());

        // still taking input while the file decodes
        c.fader().nudge(-1);
        c.dispatch(Command::TogglePause);
        c.dispatch(Command::TogglePause);
        assert_eq!(c.status(), "resumed");

        let arrival = c.next_arrival().await.unwrap();
        c.land(arrival);
        assert_eq!(c.status(), "GO 1");
        assert!(c.deadline().is_some());
        assert_eq!(c.runner().sessions(&CueId::new("big")).len(), 1);
        assert_eq!(c.runner().selected(), Some(&CueId::new("t2")));
        let ds = c.display_state();
        assert_eq!(ds.cues[0].duration_label.as_deref(), Some("-00:02,0"));
    }

    #[tokio::test]
    async fn pad_hits_report_what_happened() {
        let fake = FakeDecoder::default().with_file("applause.wav", 1.0);
        let mut c = console_with(big_file_show(), fake);

        c.play_pad(0);
        assert_eq!(c.status(), "hit Applause (loading)");
        let arrival = c.next_arrival().await.unwrap();
        c.land(arrival);
        assert_eq!(c.status(), "hit Applause");
        assert_eq!(c.runner().one_shots().len(), 1);

        c.play_pad(1);
        let arrival = c.next_arrival().await.unwrap();
        c.land(arrival);
        assert_eq!(c.status(), "hit Boo: nothing to play");
        assert_eq!(c.runner().one_shots().len(), 1);
    }

    #[tokio::test]
    async fn reset_drops_parked_starts() {
        let fake = FakeDecoder::default().with_file("big.mp3", 1.0);
        let mut c = console_with(big_file_show(), fake);
        c.dispatch(Command::Go);
        c.reset();
        assert!(!c.has_pending());
        assert_eq!(c.status(), "media reloaded");
        assert!(!c.runner().has_live_sessions());
    }

    #[tokio::test]
    async fn missing_pad_is_ignored() {
        let mut c = console();
        c.play_pad(0);
        assert!(!c.runner().has_live_sessions());
    }

    #[test]
    fn fader_shows_up_in_display() {
        let mut c = console();
        c.fader().toggle_dim();
        let ds = c.display_state();
        assert!(ds.dimmed);
        assert!((ds.master_level - 0.3).abs() < 1e-6);
    }
}
