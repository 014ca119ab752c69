//! Alert sound output

use tracing::info;

use crate::alert::AlertSound;

pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &AlertSound);
}

/// Writes every emitted sound to the log instead of a sound card
#[derive(Debug, Default)]
pub struct LogPlayer;

impl SoundPlayer for LogPlayer {
    fn play(&self, sound: &AlertSound) {
        info!(state = %sound.state, url = ?sound.url, volume = sound.volume, "Alert sound");
    }
}

/// Best player available in this build
pub fn default_player(server_url: &str) -> Box<dyn SoundPlayer> {
    #[cfg(feature = "audio")]
    {
        Box::new(rodio_player::RodioPlayer::new(server_url))
    }
    #[cfg(not(feature = "audio"))]
    {
        let _ = server_url;
        Box::new(LogPlayer)
    }
}

#[cfg(feature = "audio")]
mod rodio_player {
    use rodio::{Decoder, OutputStream, Sink};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Sender};
    use std::thread;
    use tracing::{error, warn};

    use super::SoundPlayer;
    use crate::alert::AlertSound;

    struct PlayCommand {
        url: String,
        volume: f32,
    }

    /// Plays sounds on a dedicated audio thread holding the non-Send output stream
    pub struct RodioPlayer {
        base_url: String,
        tx: Mutex<Option<Sender<PlayCommand>>>,
    }

    impl RodioPlayer {
        pub fn new(base_url: &str) -> Self {
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                tx: Mutex::new(None),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<PlayCommand>, String> {
            let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<PlayCommand>();
            thread::Builder::new()
                .name("alert-audio".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "Failed to open audio output");
                            return;
                        }
                    };
                    while let Ok(cmd) = rx.recv() {
                        if let Err(e) = play_one(&handle, &cmd) {
                            warn!(url = %cmd.url, error = %e, "Failed to play alert sound");
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            *guard = Some(tx.clone());
            Ok(tx)
        }

        fn absolute(&self, url: &str) -> String {
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("{}/{}", self.base_url, url.trim_start_matches('/'))
            }
        }

        fn send(&self, cmd: PlayCommand) {
            let tx = match self.ensure_thread() {
                Ok(tx) => tx,
                Err(e) => {
                    error!(error = %e, "Failed to start audio thread");
                    return;
                }
            };
            if tx.send(cmd).is_err() {
                // Output could not be opened; the next alert starts a fresh thread
                error!("Audio thread is gone, restarting on next alert");
                if let Ok(mut guard) = self.tx.lock() {
                    guard.take();
                }
            }
        }
    }

    fn play_one(handle: &rodio::OutputStreamHandle, cmd: &PlayCommand) -> Result<(), String> {
        let bytes = reqwest::blocking::get(&cmd.url)
            .and_then(|res| res.error_for_status())
            .and_then(|res| res.bytes())
            .map_err(|e| e.to_string())?;
        let source = Decoder::new(Cursor::new(bytes.to_vec())).map_err(|e| e.to_string())?;
        let sink = Sink::try_new(handle).map_err(|e| e.to_string())?;
        sink.set_volume(cmd.volume.clamp(0.0, 1.0));
        sink.append(source);
        sink.detach();
        Ok(())
    }

    impl SoundPlayer for RodioPlayer {
        fn play(&self, sound: &AlertSound) {
            let Some(url) = sound.url.as_deref() else {
                warn!(state = %sound.state, "No sound configured for alert");
                return;
            };
            let cmd = PlayCommand {
                url: self.absolute(url),
                volume: sound.volume,
            };
            self.send(cmd);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::check_state::CheckState;

        #[test]
        fn test_dead_audio_thread_is_forgotten() {
            let player = RodioPlayer::new("http://meerkat.local:8585");
            let (tx, rx) = mpsc::channel();
            drop(rx);
            *player.tx.lock().unwrap() = Some(tx);

            player.play(&AlertSound {
                state: CheckState::Critical,
                url: Some("/dashboards-data/critical.mp3".to_string()),
                volume: 0.0,
            });
            assert!(player.tx.lock().unwrap().is_none());
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::SoundPlayer;
    use crate::alert::AlertSound;

    /// Records every sound it is asked to play
    #[derive(Debug, Default)]
    pub struct RecordingPlayer {
        pub played: Mutex<Vec<AlertSound>>,
    }

    impl RecordingPlayer {
        pub fn played(&self) -> Vec<AlertSound> {
            self.played.lock().unwrap().clone()
        }
    }

    impl SoundPlayer for RecordingPlayer {
        fn play(&self, sound: &AlertSound) {
            self.played.lock().unwrap().push(sound.clone());
        }
    }
}
