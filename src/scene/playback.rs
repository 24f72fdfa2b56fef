//! Playback state: current timestep, range, rate and looping.

/// Slowest selectable playback rate.
pub const MIN_TIME_RATE: f64 = 0.01;
/// Fastest selectable playback rate.
pub const MAX_TIME_RATE: f64 = 1.99;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackController {
    timestep: f64,
    begin: f64,
    end: f64,
    time_rate: f64,
    /// Ticks per second of the driving timer.
    refresh_rate: f64,
    /// Equals `refresh_rate` while playing and 0 while paused.
    frame_rate: f64,
    loop_enabled: bool,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl PlaybackController {
    pub fn new(refresh_rate: f64) -> Self {
        let refresh_rate = if refresh_rate > 0.0 { refresh_rate } else { 60.0 };
        Self {
            timestep: 0.0,
            begin: 0.0,
            end: 0.0,
            time_rate: 1.0,
            refresh_rate,
            frame_rate: refresh_rate,
            loop_enabled: false,
        }
    }

    /// Set the playable range and move the timestep into it.
    pub fn set_range(&mut self, begin: f64, end: f64) {
        self.begin = begin;
        self.end = end.max(begin);
        self.timestep = self.timestep.clamp(self.begin, self.end);
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn begin(&self) -> f64 {
        self.begin
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn time_rate(&self) -> f64 {
        self.time_rate
    }

    pub fn refresh_rate(&self) -> f64 {
        self.refresh_rate
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn is_paused(&self) -> bool {
        self.frame_rate == 0.0
    }

    /// Simulation time covered by one tick.
    pub fn step(&self) -> f64 {
        self.time_rate / self.refresh_rate
    }

    /// Advance one tick. Past the end the timestep wraps exactly to `begin`
    /// when looping (the overshoot is dropped), otherwise it stays at `end`.
    /// Does nothing while paused.
    pub fn advance(&mut self) {
        if self.is_paused() {
            return;
        }
        self.advance_by(self.step());
    }

    /// Advance by an explicit amount regardless of the paused state. Used by
    /// video export, which drives time itself.
    pub fn advance_by(&mut self, dt: f64) {
        if !dt.is_finite() {
            return;
        }
        let next = self.timestep + dt;
        self.timestep = if next > self.end {
            if self.loop_enabled {
                self.begin
            } else {
                self.end
            }
        } else {
            next
        };
        self.timestep = self.timestep.clamp(self.begin, self.end);
    }

    pub fn play_pause(&mut self) {
        self.frame_rate = if self.is_paused() { self.refresh_rate } else { 0.0 };
        log::debug!("Playback {}", if self.is_paused() { "paused" } else { "resumed" });
    }

    pub fn play(&mut self) {
        self.frame_rate = self.refresh_rate;
    }

    pub fn pause(&mut self) {
        self.frame_rate = 0.0;
    }

    pub fn restart(&mut self) {
        self.timestep = self.begin;
    }

    pub fn go_to_end(&mut self) {
        self.pause();
        self.timestep = self.end;
    }

    pub fn seek(&mut self, t: f64) {
        if !t.is_finite() {
            return;
        }
        self.timestep = t.clamp(self.begin, self.end);
    }

    /// Map a slider position in [0, 1] linearly onto [begin, end].
    /// Non-finite positions are ignored.
    pub fn set_from_normalized_slider(&mut self, s: f64) {
        if !s.is_finite() {
            return;
        }
        let s = s.clamp(0.0, 1.0);
        self.timestep = self.begin + s * (self.end - self.begin);
    }

    /// Inverse of [`set_from_normalized_slider`](Self::set_from_normalized_slider).
    /// An empty range reports 0.
    pub fn normalized_position(&self) -> f64 {
        let span = self.end - self.begin;
        if span <= 0.0 {
            0.0
        } else {
            (self.timestep - self.begin) / span
        }
    }

    /// Map a slider position in [0, 1] onto [MIN_TIME_RATE, MAX_TIME_RATE].
    pub fn set_rate_from_slider(&mut self, s: f64) {
        if !s.is_finite() {
            return;
        }
        let s = s.clamp(0.0, 1.0);
        self.time_rate = MIN_TIME_RATE + s * (MAX_TIME_RATE - MIN_TIME_RATE);
    }

    pub fn set_time_rate(&mut self, rate: f64) {
        if !rate.is_finite() {
            return;
        }
        self.time_rate = rate.clamp(MIN_TIME_RATE, MAX_TIME_RATE);
    }

    /// Nudge the rate, staying within the selectable range.
    pub fn step_rate(&mut self, delta: f64) {
        self.set_time_rate(self.time_rate + delta);
    }

    pub fn toggle_loop(&mut self) {
        self.loop_enabled = !self.loop_enabled;
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Change the tick frequency, keeping the paused state.
    pub fn set_refresh_rate(&mut self, refresh_rate: f64) {
        if !refresh_rate.is_finite() || refresh_rate <= 0.0 {
            return;
        }
        let paused = self.is_paused();
        self.refresh_rate = refresh_rate;
        self.frame_rate = if paused { 0.0 } else { refresh_rate };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn controller(begin: f64, end: f64) -> PlaybackController {
        let mut playback = PlaybackController::new(10.0);
        playback.set_range(begin, end);
        playback
    }

    #[test]
    fn test_loop_wraps_exactly_to_begin() {
        let mut playback = controller(0.0, 10.0);
        playback.set_loop(true);
        playback.seek(9.95);
        playback.advance();
        assert_eq!(playback.timestep(), 0.0);
    }

    #[test]
    fn test_no_loop_clamps_to_end() {
        let mut playback = controller(0.0, 10.0);
        playback.seek(9.95);
        playback.advance();
        assert_eq!(playback.timestep(), 10.0);
        playback.advance();
        assert_eq!(playback.timestep(), 10.0);
    }

    #[test]
    fn test_advance_stays_in_range() {
        let mut playback = controller(2.0, 3.0);
        playback.set_time_rate(MAX_TIME_RATE);
        for _ in 0..100 {
            playback.advance();
            assert!(playback.timestep() >= 2.0 && playback.timestep() <= 3.0);
        }
    }

    #[test]
    fn test_pause_stops_advance() {
        let mut playback = controller(0.0, 10.0);
        playback.play_pause();
        assert!(playback.is_paused());
        playback.advance();
        assert_eq!(playback.timestep(), 0.0);

        playback.play_pause();
        playback.advance();
        assert_relative_eq!(playback.timestep(), 0.1);
    }

    #[test]
    fn test_go_to_end_pauses() {
        let mut playback = controller(1.0, 5.0);
        playback.go_to_end();
        assert!(playback.is_paused());
        assert_eq!(playback.timestep(), 5.0);
        playback.restart();
        assert_eq!(playback.timestep(), 1.0);
    }

    #[test]
    fn test_slider_mapping() {
        let mut playback = controller(2.0, 6.0);
        playback.set_from_normalized_slider(0.25);
        assert_relative_eq!(playback.timestep(), 3.0);
        assert_relative_eq!(playback.normalized_position(), 0.25);
        playback.set_from_normalized_slider(4.0);
        assert_eq!(playback.timestep(), 6.0);
    }

    #[test]
    fn test_rate_limits() {
        let mut playback = controller(0.0, 1.0);
        playback.set_rate_from_slider(0.0);
        assert_relative_eq!(playback.time_rate(), MIN_TIME_RATE);
        playback.set_rate_from_slider(1.0);
        assert_relative_eq!(playback.time_rate(), MAX_TIME_RATE);
        playback.set_time_rate(0.0);
        assert_relative_eq!(playback.time_rate(), MIN_TIME_RATE);
        playback.step_rate(10.0);
        assert_relative_eq!(playback.time_rate(), MAX_TIME_RATE);
    }

    #[test]
    fn test_non_finite_input_is_ignored() {
        let mut playback = controller(2.0, 6.0);
        playback.set_from_normalized_slider(0.5);
        playback.set_time_rate(1.5);

        playback.set_from_normalized_slider(f64::NAN);
        playback.seek(f64::NAN);
        playback.advance_by(f64::INFINITY);
        assert_relative_eq!(playback.timestep(), 4.0);

        playback.set_rate_from_slider(f64::NAN);
        playback.set_time_rate(f64::NAN);
        assert_relative_eq!(playback.time_rate(), 1.5);

        playback.set_refresh_rate(f64::NAN);
        assert!(playback.refresh_rate().is_finite());
    }

    #[test]
    fn test_refresh_rate_change_keeps_pause() {
        let mut playback = controller(0.0, 1.0);
        playback.pause();
        playback.set_refresh_rate(30.0);
        assert!(playback.is_paused());
        playback.play();
        assert_eq!(playback.frame_rate(), 30.0);
    }
}
