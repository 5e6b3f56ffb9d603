//! Piper-backed speech service with a WAV cache and rodio playback.
//!
//! Each utterance is synthesized once into `cache_dir` (keyed by model, text
//! and speed) and played back on the calling thread through one shared audio
//! output. `stop` cuts the active sink from any thread.

use anyhow::{Context, Result};
use narrator_core::{SpeechError, SpeechService, Voice, VoiceId};
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const PLAYBACK_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct PiperOptions {
    pub model_path: PathBuf,
    pub voices_dir: Option<PathBuf>,
    pub espeak_path: PathBuf,
    pub cache_dir: PathBuf,
    pub speed: f32,
    pub volume: f32,
}

struct LoadedModel {
    path: PathBuf,
    synth: PiperSpeechSynthesizer,
}

/// The `OutputStream` is not `Send`, so it lives on its own thread until the
/// keepalive sender is dropped; only the handle is shared.
struct AudioOutput {
    handle: OutputStreamHandle,
    _keepalive: mpsc::Sender<()>,
}

impl AudioOutput {
    fn open() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputStreamHandle>>();
        let (keepalive, closed) = mpsc::channel::<()>();
        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        let _ = closed.recv();
                    }
                    debug!("Closing audio output");
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(anyhow::Error::new(err)));
                }
            })
            .context("Spawning audio output thread")?;
        let handle = ready_rx
            .recv()
            .context("Audio output thread exited early")?
            .context("Opening audio output")?;
        info!("Opened audio output");
        Ok(Self {
            handle,
            _keepalive: keepalive,
        })
    }
}

pub struct PiperSpeech {
    options: PiperOptions,
    model_path: Mutex<PathBuf>,
    loaded: Mutex<Option<LoadedModel>>,
    output: Mutex<Option<AudioOutput>>,
    sink: Mutex<Option<Arc<Sink>>>,
    /// Bumped on every `stop`; playback loops compare against their snapshot.
    stops: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PiperSpeech {
    pub fn new(options: PiperOptions) -> Self {
        let espeak_path = sanitize_espeak_root(options.espeak_path.clone());
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because we set a deterministic value early in process startup.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }
        info!(
            model = %options.model_path.display(),
            espeak_root = %espeak_path.display(),
            speed = options.speed,
            "Initializing speech service"
        );
        Self {
            model_path: Mutex::new(options.model_path.clone()),
            options,
            loaded: Mutex::new(None),
            output: Mutex::new(None),
            sink: Mutex::new(None),
            stops: AtomicU64::new(0),
        }
    }

    /// Synthesize `text` into the cache unless it is already there.
    fn prepare(&self, text: &str) -> Result<PathBuf, SpeechError> {
        let model_path = lock(&self.model_path).clone();
        let path = cache_path(&self.options.cache_dir, &model_path, text, self.options.speed);
        if path.exists() {
            debug!(path = %path.display(), "Using cached utterance");
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                SpeechError::engine_unavailable(format!("creating TTS cache directory: {err}"))
            })?;
        }

        let mut loaded = lock(&self.loaded);
        if loaded.as_ref().is_none_or(|model| model.path != model_path) {
            let synth = load_synthesizer(&model_path)
                .map_err(|err| SpeechError::engine_unavailable(format!("{err:#}")))?;
            *loaded = Some(LoadedModel {
                path: model_path.clone(),
                synth,
            });
        }
        let Some(model) = loaded.as_ref() else {
            return Err(SpeechError::engine_unavailable("Piper model not loaded"));
        };
        synth_with_piper(&model.synth, &path, text, self.options.speed)
            .map_err(|err| SpeechError::utterance(format!("{err:#}")))?;
        Ok(path)
    }

    fn stopped_since(&self, generation: u64) -> bool {
        self.stops.load(Ordering::SeqCst) != generation
    }

    fn new_sink(&self) -> Result<Sink, SpeechError> {
        let mut output = lock(&self.output);
        if output.is_none() {
            let opened = AudioOutput::open()
                .map_err(|err| SpeechError::engine_unavailable(format!("{err:#}")))?;
            *output = Some(opened);
        }
        let Some(audio) = output.as_ref() else {
            return Err(SpeechError::engine_unavailable("audio output not open"));
        };
        match Sink::try_new(&audio.handle) {
            Ok(sink) => Ok(sink),
            Err(err) => {
                // Reopen on the next utterance; the device may have gone away.
                output.take();
                Err(SpeechError::engine_unavailable(format!("creating sink: {err}")))
            }
        }
    }

    /// Play `path` unless `stop` was called after `generation` was taken.
    fn play(&self, path: &Path, generation: u64) -> Result<(), SpeechError> {
        if self.stopped_since(generation) {
            debug!(path = %path.display(), "Stopped during synthesis; skipping playback");
            return Ok(());
        }
        let file = File::open(path)
            .map_err(|err| SpeechError::utterance(format!("opening {}: {err}", path.display())))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|err| SpeechError::utterance(format!("decoding {}: {err}", path.display())))?;
        let sink = self.new_sink()?;
        sink.set_volume(self.options.volume);
        sink.append(source);

        let sink = Arc::new(sink);
        *lock(&self.sink) = Some(Arc::clone(&sink));
        if self.stopped_since(generation) {
            sink.stop();
        }
        while !sink.empty() && !self.stopped_since(generation) {
            thread::sleep(PLAYBACK_POLL);
        }
        lock(&self.sink).take();
        Ok(())
    }
}

impl SpeechService for PiperSpeech {
    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let mut models = vec![self.options.model_path.clone()];
        if let Some(dir) = &self.options.voices_dir {
            let entries = fs::read_dir(dir).map_err(|err| {
                SpeechError::engine_unavailable(format!("reading {}: {err}", dir.display()))
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_onnx(path))
                .collect();
            found.sort();
            models.extend(found.into_iter().filter(|path| *path != self.options.model_path));
        }
        Ok(models.iter().map(|path| voice_from_model(path)).collect())
    }

    fn select_voice(&self, id: &VoiceId) -> Result<(), SpeechError> {
        let path = PathBuf::from(id.as_str());
        if !is_onnx(&path) || !path.exists() || !resolve_piper_config(&path).exists() {
            return Err(SpeechError::unknown_voice(id.as_str()));
        }
        info!(model = %path.display(), "Switching Piper voice");
        *lock(&self.model_path) = path;
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let generation = self.stops.load(Ordering::SeqCst);
        let path = self.prepare(text)?;
        self.play(&path, generation)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(sink) = lock(&self.sink).take() {
            debug!("Stopping playback");
            sink.stop();
        }
    }
}

fn load_synthesizer(model_path: &Path) -> Result<PiperSpeechSynthesizer> {
    let config_path = resolve_piper_config(model_path);
    if !config_path.exists() {
        anyhow::bail!(
            "Piper config not found at {} (expected from {})",
            config_path.display(),
            model_path.display()
        );
    }
    info!(model = %model_path.display(), "Loading Piper model");
    let model = from_config_path(&config_path).context("Loading Piper model")?;
    PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")
}

fn is_onnx(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "onnx")
}

/// Piper voice files are named `<locale>-<speaker>-<quality>.onnx`.
fn voice_from_model(path: &Path) -> Voice {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tags: Vec<String> = stem
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    Voice::new(path.to_string_lossy(), stem).with_tags(tags)
}

fn cache_path(base: &Path, model_path: &Path, sentence: &str, speed: f32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(sentence.as_bytes());
    hasher.update(speed.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("tts-{hash}.wav"))
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path.file_name().is_some_and(|n| n == "espeak-ng-data") {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

fn synth_with_piper(
    piper: &PiperSpeechSynthesizer,
    path: &Path,
    sentence: &str,
    speed: f32,
) -> Result<()> {
    debug!(
        path = %path.display(),
        speed,
        chars = sentence.len(),
        "Synthesizing utterance with Piper"
    );
    let output_config = if (speed - 1.0).abs() <= f32::EPSILON {
        None
    } else {
        Some(AudioOutputConfig {
            rate: Some(speed_to_rate_percent(speed)),
            volume: None,
            pitch: None,
            appended_silence_ms: None,
        })
    };
    if let Err(err) = piper.synthesize_to_file(path, sentence.to_string(), output_config) {
        // Do not leave a truncated file behind to be replayed from cache.
        if fs::remove_file(path).is_ok() {
            warn!(path = %path.display(), "Removed partial utterance");
        }
        return Err(err).context("Synthesizing audio");
    }
    Ok(())
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if is_onnx(model_path) {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

fn speed_to_rate_percent(speed: f32) -> u8 {
    let clamped = speed.clamp(0.5, 5.5);
    let percent = ((clamped - 0.5) / 5.0) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_depends_on_model_text_and_speed() {
        let base = Path::new("/tmp/cache");
        let a = cache_path(base, Path::new("a.onnx"), "Hello.", 1.0);
        assert_eq!(a, cache_path(base, Path::new("a.onnx"), "Hello.", 1.0));
        assert_ne!(a, cache_path(base, Path::new("b.onnx"), "Hello.", 1.0));
        assert_ne!(a, cache_path(base, Path::new("a.onnx"), "Hello!", 1.0));
        assert_ne!(a, cache_path(base, Path::new("a.onnx"), "Hello.", 1.5));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("tts-"));
    }

    #[test]
    fn espeak_root_trims_data_suffix() {
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share/espeak-ng-data")),
            PathBuf::from("/usr/share")
        );
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share")),
            PathBuf::from("/usr/share")
        );
    }

    #[test]
    fn piper_config_sits_next_to_model() {
        assert_eq!(
            resolve_piper_config(Path::new("/v/en_US-amy-low.onnx")),
            PathBuf::from("/v/en_US-amy-low.onnx.json")
        );
        assert_eq!(
            resolve_piper_config(Path::new("/v/config.json")),
            PathBuf::from("/v/config.json")
        );
    }

    #[test]
    fn speed_maps_onto_rate_percent() {
        assert_eq!(speed_to_rate_percent(0.5), 0);
        assert_eq!(speed_to_rate_percent(3.0), 50);
        assert_eq!(speed_to_rate_percent(9.0), 100);
    }

    #[test]
    fn voices_are_named_after_model_files() {
        let voice = voice_from_model(Path::new("/v/ru_RU-irina-medium.onnx"));
        assert_eq!(voice.id.as_str(), "/v/ru_RU-irina-medium.onnx");
        assert_eq!(voice.display_name, "ru_RU-irina-medium");
        assert_eq!(voice.tags, vec!["ru", "RU", "irina", "medium"]);
    }

    fn offline_speech() -> PiperSpeech {
        PiperSpeech::new(PiperOptions {
            model_path: PathBuf::from("/nonexistent/a.onnx"),
            voices_dir: None,
            espeak_path: PathBuf::from("/usr/share"),
            cache_dir: std::env::temp_dir().join("pdf-narrator-test-cache"),
            speed: 1.0,
            volume: 1.0,
        })
    }

    #[test]
    fn stop_during_synthesis_skips_playback() {
        let speech = offline_speech();
        let generation = speech.stops.load(Ordering::SeqCst);
        speech.stop();
        // Returns before touching the file or the audio device.
        let result = speech.play(Path::new("/nonexistent/tts-unit.wav"), generation);
        assert_eq!(result, Ok(()));
        assert!(lock(&speech.output).is_none());
    }

    #[test]
    fn playback_without_stop_reads_the_clip() {
        let speech = offline_speech();
        let generation = speech.stops.load(Ordering::SeqCst);
        let err = speech
            .play(Path::new("/nonexistent/tts-unit.wav"), generation)
            .unwrap_err();
        assert!(matches!(err, SpeechError::Utterance(_)), "{err:?}");
        assert!(lock(&speech.output).is_none());
    }

    #[test]
    fn unknown_model_is_rejected() {
        let speech = offline_speech();
        let err = speech
            .select_voice(&VoiceId::from("/nonexistent/b.onnx"))
            .unwrap_err();
        assert_eq!(err, SpeechError::unknown_voice("/nonexistent/b.onnx"));
        assert_eq!(speech.list_voices().unwrap().len(), 1);
        // Stopping with nothing playing is a no-op.
        speech.stop();
    }
}
