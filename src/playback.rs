use crate::types::Episode;

const UNMUTE_FALLBACK_VOLUME: f32 = 0.5;

/// Single source of truth for what plays next. Rendering surfaces observe
/// this state and reconcile toward it; they never keep their own copy of the
/// queue or the play/pause intent.
pub struct PlaybackController {
    queue: Vec<Episode>,
    current_index: Option<usize>,
    is_playing: bool,
    volume: f32,
    is_muted: bool,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            current_index: None,
            is_playing: false,
            volume: UNMUTE_FALLBACK_VOLUME,
            is_muted: false,
        }
    }

    pub fn with_volume(volume: f32) -> Self {
        let mut controller = Self::new();
        controller.set_volume(volume);
        controller
    }

    /// Replaces the entire queue and starts playing at `start_index`.
    /// An out-of-range index is a caller error: the request is logged and
    /// dropped, leaving the prior state untouched.
    pub fn set_queue_and_play(&mut self, episodes: Vec<Episode>, start_index: usize) {
        if start_index >= episodes.len() {
            log::warn!(
                "set_queue_and_play: start index {} out of range for queue of {}",
                start_index,
                episodes.len()
            );
            return;
        }

        self.queue = episodes;
        self.current_index = Some(start_index);
        self.is_playing = true;
    }

    /// Advances to the next queued episode. At the last entry the queue is
    /// exhausted: playback stops where it is, it does not wrap to the front.
    pub fn play_next(&mut self) {
        let Some(index) = self.current_index else {
            return;
        };

        if index + 1 < self.queue.len() {
            self.current_index = Some(index + 1);
            self.is_playing = true;
        } else {
            self.is_playing = false;
        }
    }

    /// Retreats to the previous queued episode. At the front this is a no-op
    /// rather than a restart of the current episode.
    pub fn play_previous(&mut self) {
        let Some(index) = self.current_index else {
            return;
        };

        if index > 0 {
            self.current_index = Some(index - 1);
            self.is_playing = true;
        }
    }

    pub fn toggle_play_pause(&mut self) {
        if self.current_index.is_none() {
            return;
        }
        self.is_playing = !self.is_playing;
    }

    /// Reconciliation entry point for the rendering surface: a native pause,
    /// or a playback start failure, is reported back here so the state never
    /// claims to be playing while the surface is silent.
    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.current_index.is_none() {
            return;
        }
        self.is_playing = playing;
    }

    pub fn set_volume(&mut self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.volume = clamped;
        self.is_muted = clamped == 0.0;
    }

    pub fn set_muted(&mut self, muted: bool) {
        if !muted && self.volume == 0.0 {
            // Unmuting at zero volume would be inaudible forever; reset to
            // something the listener can hear.
            self.volume = UNMUTE_FALLBACK_VOLUME;
        }
        self.is_muted = muted;
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.is_muted);
    }

    pub fn queue(&self) -> &[Episode] {
        &self.queue
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.current_index.map(|i| &self.queue[i])
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Volume the rendering surface should actually apply.
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted { 0.0 } else { self.volume }
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}
