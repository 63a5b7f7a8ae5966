//! Playback navigator.
//!
//! A small state machine over a caller-supplied playlist: which index is
//! current, whether shuffle and repeat are on, and which index comes next on a
//! transport command or when a track runs out. It owns the [`Transport`] and
//! is the only thing that tells it to play.
//!
//! Position reporting is also done here. Transports commonly read `0` for a
//! moment after a seek or a restart, so for a short grace window the
//! navigator extrapolates from the seek target and wall-clock time instead of
//! trusting the raw value. Callers are expected to poll on a fixed cadence
//! (about once a second) with [`Navigator::poll`].

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::track::Track;
use crate::transport::Transport;

/// Raw positions below this are suspicious once playback is under way.
const STALL_THRESHOLD_SECS: f64 = 2.0;

/// Tunables for position smoothing and auto-advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorSettings {
    /// How long after a seek the seek target plus elapsed time is reported.
    pub seek_grace: Duration,
    /// Advance once the position is within this many seconds of the end.
    pub end_of_track_margin: f64,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            seek_grace: Duration::from_millis(1500),
            end_of_track_margin: 0.5,
        }
    }
}

/// Process-lifetime playback state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSession {
    /// Supplied by the caller; may contain duplicates.
    pub playlist: Vec<Track>,
    /// `None` when nothing is loaded or the playlist ran out.
    pub current: Option<usize>,
    pub shuffle: bool,
    pub repeat: bool,
}

/// Snapshot returned by [`Navigator::poll_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub index: Option<usize>,
    /// Smoothed elapsed seconds.
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    /// True when this poll moved to another track.
    pub advanced: bool,
}

pub struct Navigator<T: Transport> {
    transport: T,
    session: PlaybackSession,
    settings: NavigatorSettings,
    rng: StdRng,
    /// Path the transport was last successfully told to play.
    loaded_path: Option<String>,
    paused: bool,
    last_seek: Option<(Instant, f64)>,
    last_sample: Option<(Instant, f64)>,
}

impl<T: Transport> Navigator<T> {
    pub fn new(transport: T) -> Self {
        Self::with_rng(transport, StdRng::from_entropy())
    }

    /// Navigator whose shuffle sequence is fixed by `seed`.
    pub fn with_seed(transport: T, seed: u64) -> Self {
        Self::with_rng(transport, StdRng::seed_from_u64(seed))
    }

    fn with_rng(transport: T, rng: StdRng) -> Self {
        Self {
            transport,
            session: PlaybackSession::default(),
            settings: NavigatorSettings::default(),
            rng,
            loaded_path: None,
            paused: false,
            last_seek: None,
            last_sample: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: NavigatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn current(&self) -> Option<usize> {
        self.session.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.session
            .current
            .and_then(|index| self.session.playlist.get(index))
    }

    pub fn is_shuffle(&self) -> bool {
        self.session.shuffle
    }

    pub fn is_repeat(&self) -> bool {
        self.session.repeat
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Replace the playlist and start playing `start`.
    ///
    /// If the track at `start` is the one already playing, only the index
    /// moves and the transport is left alone.
    pub fn load(&mut self, playlist: Vec<Track>, start: usize) -> Result<()> {
        if playlist.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        if start >= playlist.len() {
            return Err(Error::InvalidIndex {
                index: start,
                len: playlist.len(),
            });
        }
        debug!("Loaded playlist of {} tracks at {start}", playlist.len());
        self.session.playlist = playlist;
        self.play_index(start)
    }

    /// Move forward. `Ok(None)` means the playlist ended; playback is stopped
    /// and the playlist kept so `next` or `previous` can start it again.
    pub fn next(&mut self) -> Result<Option<usize>> {
        let len = self.session.playlist.len();
        if len == 0 {
            return Ok(None);
        }

        let target = if self.session.shuffle {
            Some(self.random_index(len))
        } else {
            match self.session.current {
                None => Some(0),
                Some(index) if index + 1 < len => Some(index + 1),
                Some(_) if self.session.repeat => Some(0),
                Some(_) => None,
            }
        };

        match target {
            Some(index) => self.play_index(index).map(|()| Some(index)),
            None => {
                debug!("End of playlist");
                self.halt();
                Ok(None)
            }
        }
    }

    /// Move back. Never ends the playlist: before the first entry it wraps to the last.
    pub fn previous(&mut self) -> Result<Option<usize>> {
        let len = self.session.playlist.len();
        if len == 0 {
            return Ok(None);
        }

        let index = if self.session.shuffle {
            self.random_index(len)
        } else {
            match self.session.current {
                Some(index) if index > 0 => index - 1,
                _ => len - 1,
            }
        };
        self.play_index(index).map(|()| Some(index))
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.session.shuffle = !self.session.shuffle;
        debug!("Shuffle {}", if self.session.shuffle { "on" } else { "off" });
        self.session.shuffle
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.session.repeat = !self.session.repeat;
        debug!("Repeat {}", if self.session.repeat { "on" } else { "off" });
        self.session.repeat
    }

    /// Pause or resume. Returns whether audio is now playing.
    ///
    /// After a transport failure the current track is retried.
    pub fn toggle_pause(&mut self) -> Result<bool> {
        let Some(index) = self.session.current else {
            return Ok(false);
        };

        if self.loaded_path.is_none() {
            self.play_index(index)?;
        } else if self.transport.is_playing() {
            self.transport.pause();
            self.paused = true;
        } else {
            self.transport.resume();
            self.paused = false;
        }
        Ok(self.transport.is_playing())
    }

    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.seek_at(seconds, Instant::now())
    }

    /// Seek within the current track, clamped to its length.
    pub fn seek_at(&mut self, seconds: f64, now: Instant) -> Result<()> {
        let Some(track) = self.current_track() else {
            return Ok(());
        };
        let path = track.path.clone();
        let duration = self.effective_duration();

        let mut target = seconds.max(0.0);
        if duration > 0.0 {
            target = target.min(duration);
        }

        self.transport.seek(Path::new(&path), target)?;
        self.loaded_path = Some(path);
        self.last_seek = Some((now, target));
        self.last_sample = Some((now, target));
        trace!("Seek to {target:.1}s");
        Ok(())
    }

    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    /// Smoothed elapsed seconds as of `now`.
    ///
    /// Within the grace window after a seek this is the seek target plus the
    /// time since. Afterwards a raw `0` following a position past a couple of
    /// seconds is treated as a stall and extrapolated from the last sample.
    pub fn position_at(&self, now: Instant) -> f64 {
        if let Some((at, target)) = self.last_seek {
            let since = now.saturating_duration_since(at);
            if since < self.settings.seek_grace {
                return target + self.elapsed_while_playing(since);
            }
        }

        let raw = self.transport.position();
        match self.last_sample {
            Some((at, last)) if raw <= 0.0 && last > STALL_THRESHOLD_SECS => {
                last + self.elapsed_while_playing(now.saturating_duration_since(at))
            }
            _ => raw,
        }
    }

    pub fn poll(&mut self) -> Result<PlaybackStatus> {
        self.poll_at(Instant::now())
    }

    /// Sample the position and advance if the current track is done.
    ///
    /// A track is done once the position reaches its end minus the margin, or
    /// when the transport drained it without being paused. Nothing advances
    /// after a transport failure.
    pub fn poll_at(&mut self, now: Instant) -> Result<PlaybackStatus> {
        if self.session.current.is_none() {
            return Ok(self.status(0.0, false));
        }

        let duration = self.effective_duration();
        let position = self.position_at(now);
        let playing = self.transport.is_playing();

        let near_end =
            playing && duration > 0.0 && position >= duration - self.settings.end_of_track_margin;
        let drained = !playing;
        let finished = self.loaded_path.is_some() && !self.paused && (near_end || drained);

        if finished {
            trace!("Track finished at {position:.1}s of {duration:.1}s");
            self.next()?;
            return Ok(self.status(0.0, true));
        }

        if playing {
            self.last_sample = Some((now, position));
        }
        let position = if duration > 0.0 {
            position.min(duration)
        } else {
            position
        };
        Ok(self.status(position, false))
    }

    fn status(&self, position: f64, advanced: bool) -> PlaybackStatus {
        PlaybackStatus {
            index: self.session.current,
            position,
            duration: self.effective_duration(),
            playing: self.transport.is_playing(),
            advanced,
        }
    }

    fn effective_duration(&self) -> f64 {
        self.transport
            .duration()
            .filter(|d| *d > 0.0)
            .or_else(|| self.current_track().map(|track| track.duration))
            .unwrap_or(0.0)
    }

    fn elapsed_while_playing(&self, since: Duration) -> f64 {
        if self.paused {
            0.0
        } else {
            since.as_secs_f64()
        }
    }

    /// Uniform index in `0..len`, never the current one when there is a choice.
    fn random_index(&mut self, len: usize) -> usize {
        match self.session.current {
            Some(current) if len > 1 && current < len => {
                let pick = self.rng.gen_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            _ => self.rng.gen_range(0..len),
        }
    }

    fn play_index(&mut self, index: usize) -> Result<()> {
        let path = self.session.playlist[index].path.clone();
        self.session.current = Some(index);

        if self.loaded_path.as_deref() == Some(path.as_str()) && self.transport.is_playing() {
            trace!("`{path}` already playing, index moved to {index}");
            return Ok(());
        }

        self.last_seek = None;
        self.last_sample = None;
        self.paused = false;
        self.loaded_path = None;

        match self.transport.play(Path::new(&path)) {
            Ok(()) => {
                debug!("Playing [{index}] {path}");
                self.loaded_path = Some(path);
                Ok(())
            }
            Err(err) => {
                warn!("Playback of `{path}` failed, staying at index {index}: {err}");
                Err(err)
            }
        }
    }

    fn halt(&mut self) {
        self.transport.stop();
        self.session.current = None;
        self.loaded_path = None;
        self.paused = false;
        self.last_seek = None;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RecordingTransport, TransportCommand};
    use std::path::PathBuf;

    fn playlist(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("/m/{i}.mp3")).with_duration(180.0))
            .collect()
    }

    fn navigator() -> Navigator<RecordingTransport> {
        Navigator::with_seed(RecordingTransport::new(), 7)
    }

    #[test]
    fn test_load_rejects_empty_and_out_of_range() {
        let mut nav = navigator();
        assert!(matches!(nav.load(Vec::new(), 0), Err(Error::EmptyPlaylist)));
        assert!(matches!(
            nav.load(playlist(2), 2),
            Err(Error::InvalidIndex { index: 2, len: 2 })
        ));
        assert!(nav.transport().commands().is_empty());
    }

    #[test]
    fn test_next_without_repeat_ends_playlist() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(3), 2)?;
        assert_eq!(nav.next()?, None);
        assert_eq!(nav.current(), None);
        assert_eq!(nav.session().playlist.len(), 3);
        assert_eq!(nav.transport().commands().last(), Some(&TransportCommand::Stop));

        // Starting over from the ended state begins at the top.
        assert_eq!(nav.next()?, Some(0));
        Ok(())
    }

    #[test]
    fn test_next_with_repeat_wraps() -> Result<()> {
        let mut nav = navigator();
        nav.toggle_repeat();
        nav.load(playlist(3), 2)?;
        assert_eq!(nav.next()?, Some(0));
        Ok(())
    }

    #[test]
    fn test_previous_wraps_to_last_without_repeat() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(3), 0)?;
        assert_eq!(nav.previous()?, Some(2));
        assert_eq!(nav.previous()?, Some(1));
        Ok(())
    }

    #[test]
    fn test_shuffle_two_tracks_always_alternates() -> Result<()> {
        let mut nav = navigator();
        nav.toggle_shuffle();
        nav.load(playlist(2), 0)?;
        for _ in 0..50 {
            let before = nav.current();
            let after = nav.next()?;
            assert_ne!(before, after);
        }
        Ok(())
    }

    #[test]
    fn test_shuffle_never_repeats_and_stays_in_range() -> Result<()> {
        let mut nav = navigator();
        nav.toggle_shuffle();
        nav.load(playlist(5), 3)?;
        let mut seen = [false; 5];
        for _ in 0..200 {
            let before = nav.current();
            let after = nav.previous()?.expect("shuffle always picks");
            assert!(after < 5);
            assert_ne!(before, Some(after));
            seen[after] = true;
        }
        assert!(seen.iter().all(|s| *s));
        Ok(())
    }

    #[test]
    fn test_single_track_shuffle_replays_it() -> Result<()> {
        let mut nav = navigator();
        nav.toggle_shuffle();
        nav.load(playlist(1), 0)?;
        assert_eq!(nav.next()?, Some(0));
        Ok(())
    }

    #[test]
    fn test_load_same_path_does_not_restart() -> Result<()> {
        let mut nav = navigator();
        let mut tracks = playlist(2);
        tracks.push(tracks[0].clone());
        nav.load(tracks.clone(), 0)?;
        nav.load(tracks, 2)?;
        assert_eq!(nav.current(), Some(2));
        assert_eq!(nav.transport().played().len(), 1);
        Ok(())
    }

    #[test]
    fn test_transport_error_stays_at_failing_index() -> Result<()> {
        let mut transport = RecordingTransport::new();
        transport.fail_on("/m/1.mp3");
        let mut nav = Navigator::with_seed(transport, 1);
        nav.load(playlist(3), 0)?;

        assert!(matches!(nav.next(), Err(Error::Transport { .. })));
        assert_eq!(nav.current(), Some(1));

        // A failed track is not auto-advanced past.
        let status = nav.poll()?;
        assert!(!status.advanced);
        assert_eq!(status.index, Some(1));
        Ok(())
    }

    #[test]
    fn test_position_extrapolates_after_seek() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(1), 0)?;
        let t0 = Instant::now();
        nav.seek_at(60.0, t0)?;

        // Transport reads 0 right after the seek.
        let during = nav.position_at(t0 + Duration::from_millis(1000));
        assert!((during - 61.0).abs() < 1e-6);

        // Past the grace window the raw value is trusted again.
        nav.transport_mut().set_position(63.0);
        let after = nav.position_at(t0 + Duration::from_secs(3));
        assert_eq!(after, 63.0);
        Ok(())
    }

    #[test]
    fn test_position_covers_raw_zero_stall() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(1), 0)?;
        let t0 = Instant::now();
        nav.transport_mut().set_position(30.0);
        nav.poll_at(t0)?;

        nav.transport_mut().set_position(0.0);
        let stalled = nav.position_at(t0 + Duration::from_secs(1));
        assert!((stalled - 31.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_poll_auto_advances_near_end() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(2), 0)?;
        nav.transport_mut().set_position(179.6);
        let status = nav.poll()?;
        assert!(status.advanced);
        assert_eq!(status.index, Some(1));
        assert_eq!(
            nav.transport().played(),
            [PathBuf::from("/m/0.mp3"), PathBuf::from("/m/1.mp3")]
        );
        Ok(())
    }

    #[test]
    fn test_transport_duration_overrides_tagged_length() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(2), 0)?;
        nav.transport_mut().set_position(59.6);

        // An unknown (zero) length from the decoder falls back to the tags.
        nav.transport_mut().set_duration(Some(0.0));
        let status = nav.poll()?;
        assert!(!status.advanced);
        assert_eq!(status.duration, 180.0);

        nav.transport_mut().set_duration(Some(60.0));
        let status = nav.poll()?;
        assert!(status.advanced);
        assert_eq!(status.index, Some(1));
        Ok(())
    }

    #[test]
    fn test_poll_advances_when_stream_drains() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(2), 1)?;
        nav.transport_mut().finish();
        let status = nav.poll()?;
        assert!(status.advanced);
        assert_eq!(status.index, None);
        Ok(())
    }

    #[test]
    fn test_paused_track_does_not_advance() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(2), 0)?;
        assert!(!nav.toggle_pause()?);
        let status = nav.poll()?;
        assert!(!status.advanced);
        assert!(!status.playing);
        assert!(nav.toggle_pause()?);
        Ok(())
    }

    #[test]
    fn test_seek_clamps_to_duration() -> Result<()> {
        let mut nav = navigator();
        nav.load(playlist(1), 0)?;
        nav.seek(500.0)?;
        assert_eq!(
            nav.transport().commands().last(),
            Some(&TransportCommand::Seek(PathBuf::from("/m/0.mp3"), 180.0))
        );
        Ok(())
    }
}
