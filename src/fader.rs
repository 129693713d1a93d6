use std::rc::Rc;

use crate::audio::OutputContext;

// border cells at each end of the fader track
pub const TRACK_INSET: f32 = 1.0;

// drag, keyboard nudges and dim all end up as the output's master volume

pub struct MasterFader {
    output: Rc<OutputContext>,
    level: f32,
    step: f32,
    dim_level: f32,
    undimmed: Option<f32>, // level to go back to when dim is released
}

impl MasterFader {
    pub fn new(output: Rc<OutputContext>, step: f32, dim_level: f32) -> Self {
        Self {
            output,
            level: 1.0,
            step: if step.is_finite() { step.abs() } else { 0.02 },
            dim_level: clamp01(dim_level),
            undimmed: None,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_dimmed(&self) -> bool {
        self.undimmed.is_some()
    }

    /// Move the fader. Any explicit move releases dim.
    pub fn set_level(&mut self, level: f32) -> f32 {
        self.undimmed = None;
        self.apply(level)
    }

    /// Pointer `pos` cells along a track `track_len` long, counted from the
    /// silent end.
    pub fn drag_to(&mut self, pos: f32, track_len: f32) -> f32 {
        match level_from_position(pos, track_len) {
            Some(level) => self.set_level(level),
            None => self.level,
        }
    }

    /// One keyboard step up (`steps > 0`) or down.
    pub fn nudge(&mut self, steps: i32) -> f32 {
        self.set_level(self.level + self.step * steps as f32)
    }

    /// Drop to the dim level, or come back from it.
    pub fn toggle_dim(&mut self) -> f32 {
        match self.undimmed.take() {
            Some(previous) => self.apply(previous),
            None => {
                let previous = self.level;
                let level = self.apply(self.dim_level.min(previous));
                self.undimmed = Some(previous);
                level
            }
        }
    }

    fn apply(&mut self, level: f32) -> f32 {
        self.level = clamp01(level);
        if self.output.set_master_volume(self.level).is_none() {
            tracing::warn!(level = self.level, "fader moved without an output");
        }
        self.level
    }
}

/// Fader level for a pointer position measured from the silent end.
/// `None` when the track is too short to have a usable range.
pub fn level_from_position(pos: f32, track_len: f32) -> Option<f32> {
    let usable = track_len - 2.0 * TRACK_INSET;
    if !(usable > 0.0) || !pos.is_finite() {
        return None;
    }
    let pos = pos.clamp(TRACK_INSET, track_len - TRACK_INSET);
    Some((pos - TRACK_INSET) / usable)
}

fn clamp01(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::context;

    fn fader() -> (MasterFader, Rc<OutputContext>) {
        let ctx = context();
        (MasterFader::new(ctx.clone(), 0.02, 0.3), ctx)
    }

    fn settled_gain(ctx: &OutputContext) -> f32 {
        let output = ctx.get().unwrap();
        output.render(0.2);
        output.master_gain()
    }

    #[test]
    fn positions_map_onto_the_inset_track() {
        assert_eq!(level_from_position(1.0, 21.0), Some(0.0));
        assert_eq!(level_from_position(20.0, 21.0), Some(1.0));
        assert_eq!(level_from_position(10.5, 21.0), Some(0.5));
        assert_eq!(level_from_position(-5.0, 21.0), Some(0.0));
        assert_eq!(level_from_position(50.0, 21.0), Some(1.0));
        assert_eq!(level_from_position(1.0, 2.0), None);
    }

    #[test]
    fn drag_sets_master_gain() {
        let (mut f, ctx) = fader();
        assert_eq!(f.drag_to(10.5, 21.0), 0.5);
        assert!((settled_gain(&ctx) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn nudges_are_clamped() {
        let (mut f, ctx) = fader();
        assert_eq!(f.nudge(1), 1.0);
        assert!((f.nudge(-5) - 0.9).abs() < 1e-6);
        f.set_level(0.01);
        assert_eq!(f.nudge(-1), 0.0);
        assert!(settled_gain(&ctx) < 1e-4);
    }

    #[test]
    fn dim_and_back() {
        let (mut f, ctx) = fader();
        f.set_level(0.8);
        assert!((f.toggle_dim() - 0.3).abs() < 1e-6);
        assert!(f.is_dimmed());
        assert!((settled_gain(&ctx) - 0.3).abs() < 1e-4);

        assert!((f.toggle_dim() - 0.8).abs() < 1e-6);
        assert!(!f.is_dimmed());
    }

    #[test]
    fn dim_never_raises_the_level() {
        let (mut f, _) = fader();
        f.set_level(0.1);
        assert!((f.toggle_dim() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn moving_the_fader_releases_dim() {
        let (mut f, _) = fader();
        f.toggle_dim();
        f.nudge(1);
        assert!(!f.is_dimmed());
        assert!((f.level() - 0.32).abs() < 1e-6);
    }
}
