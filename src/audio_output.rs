use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::time::Duration;

use crate::blob_cache::BlobCache;
use crate::playback::PlaybackController;
use crate::types::Episode;

/// Rodio-backed rendering surface. The controller is authoritative: each
/// `sync` tick reconciles the sink toward the controller's state, and the
/// only writes flowing the other way are end-of-media (`play_next`) and
/// start failures (`set_playing(false)`).
pub struct AudioOutput {
    sink: Option<(Sink, OutputStream)>,
    loaded_episode_id: Option<String>,
}

impl AudioOutput {
    pub fn new() -> Self {
        Self {
            sink: None,
            loaded_episode_id: None,
        }
    }

    /// Drive the surface toward the controller's state. Call from the host
    /// loop; every mutation of the controller between ticks is picked up here.
    pub fn sync(&mut self, control: &mut PlaybackController, cache: &BlobCache) {
        let desired = control.current_episode().cloned();
        let desired_id = desired.as_ref().map(|episode| episode.id.clone());

        if desired_id != self.loaded_episode_id {
            self.loaded_episode_id = desired_id;

            if let Some((old_sink, _)) = self.sink.take() {
                old_sink.stop();
            }

            if let Some(episode) = desired {
                match self.load(&episode, cache) {
                    Ok(pair) => self.sink = Some(pair),
                    Err(err) => {
                        log::error!("could not start playback for {}: {}", episode.id, err);
                        control.set_playing(false);
                    }
                }
            }
        }

        if let Some((sink, _)) = self.sink.as_ref() {
            // Natural end of media advances the queue; at the end of the
            // queue play_next flips is_playing off and we fall through to
            // the pause branch below.
            if sink.empty() && control.is_playing() {
                control.play_next();
            }

            if control.is_playing() {
                sink.play();
            } else {
                sink.pause();
            }

            sink.set_volume(control.effective_volume());
        }
    }

    fn load(&self, episode: &Episode, cache: &BlobCache) -> Result<(Sink, OutputStream), String> {
        let (_stream, stream_handle) = OutputStream::try_default().map_err(|e| e.to_string())?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| e.to_string())?;

        match cache.path(&episode.id) {
            Some(path) => {
                let file = File::open(&path).map_err(|e| e.to_string())?;
                let source = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
                sink.append(source);
            }
            None => {
                log::debug!("no local blob for {}, streaming from source", episode.id);
                let response =
                    reqwest::blocking::get(&episode.audio_url).map_err(|e| e.to_string())?;
                if !response.status().is_success() {
                    return Err(format!("audio source answered {}", response.status()));
                }
                let bytes = response.bytes().map_err(|e| e.to_string())?;
                let source = Decoder::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
                sink.append(source);
            }
        }

        // Paused until the reconcile pass applies the controller's intent.
        sink.pause();
        Ok((sink, _stream))
    }

    pub fn stop(&mut self) {
        if let Some((sink, _)) = self.sink.take() {
            sink.stop();
        }
        self.loaded_episode_id = None;
    }

    pub fn seek(&self, position: Duration) {
        if let Some((sink, _)) = self.sink.as_ref() {
            sink.try_seek(position).ok();
        }
    }

    pub fn skip_forward(&self, seconds: i32) {
        if let Some((sink, _)) = self.sink.as_ref() {
            let current = sink.get_pos();
            let new_pos = current + Duration::from_secs(seconds as u64);
            sink.try_seek(new_pos).ok();
        }
    }

    pub fn skip_backward(&self, seconds: i32) {
        if let Some((sink, _)) = self.sink.as_ref() {
            let current = sink.get_pos();
            let new_pos = current.saturating_sub(Duration::from_secs(seconds as u64));
            sink.try_seek(new_pos).ok();
        }
    }

    pub fn position(&self) -> Duration {
        if let Some((sink, _)) = self.sink.as_ref() {
            sink.get_pos()
        } else {
            Duration::from_secs(0)
        }
    }

    /// True once the loaded episode has played to the end.
    pub fn is_drained(&self) -> bool {
        match self.sink.as_ref() {
            Some((sink, _)) => sink.empty(),
            None => false,
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}
