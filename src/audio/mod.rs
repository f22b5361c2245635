use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    EndReached,
    LengthChanged(u64),
}

pub trait AudioEngine {
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    fn time_ms(&self) -> u64;
    fn set_time_ms(&mut self, ms: u64) -> Result<()>;
    fn length_ms(&self) -> Option<u64>;
    fn volume(&self) -> u8;
    fn set_volume(&mut self, volume: u8);
    fn current_track(&self) -> Option<&Path>;
    fn poll_events(&mut self) -> Vec<PlayerEvent>;
    fn release(&mut self);
    fn output_name(&self) -> String;

    fn position(&self) -> f64 {
        match self.length_ms() {
            Some(length) if length > 0 => (self.time_ms() as f64 / length as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn set_position(&mut self, fraction: f64) -> Result<()> {
        let length = self
            .length_ms()
            .filter(|length| *length > 0)
            .context("track length is unknown")?;
        let target = (fraction.clamp(0.0, 1.0) * length as f64).round() as u64;
        self.set_time_ms(target)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn sink_volume(volume: u8) -> f32 {
    f32::from(volume.min(MAX_VOLUME)) / f32::from(MAX_VOLUME)
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: u8,
    stopped: bool,
    end_reported: bool,
    pending: Vec<PlayerEvent>,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;
        sink.pause();

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 70,
            stopped: true,
            end_reported: false,
            pending: Vec::new(),
        })
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            let host = rodio::cpal::default_host();
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    log::warn!("default output failed, probing other devices: {default_err:#}");
                    let mut devices: Vec<_> = host
                        .output_devices()
                        .ok()
                        .into_iter()
                        .flatten()
                        .collect();
                    devices.sort_by_cached_key(|device| {
                        let lower = device.name().unwrap_or_default().to_ascii_lowercase();
                        let rank = if lower.contains("pulse") {
                            0_u8
                        } else if lower.contains("pipewire") {
                            1_u8
                        } else if lower.contains("default") {
                            2_u8
                        } else {
                            3_u8
                        };
                        (rank, lower)
                    });

                    devices
                        .into_iter()
                        .find_map(|device| {
                            OutputStreamBuilder::from_device(device)
                                .ok()?
                                .with_error_callback(|_| {})
                                .open_stream_or_fallback()
                                .ok()
                        })
                        .with_context(|| {
                            format!(
                                "unable to start any audio output stream after default failed: {default_err:#}"
                            )
                        })
                }
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }

    fn decode_into_fresh_sink(&mut self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.track_duration = source.total_duration().filter(|d| !d.is_zero());
        self.sink.append(source);
        self.sink.set_volume(sink_volume(self.volume));
        Ok(())
    }
}

impl AudioEngine for RodioAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.decode_into_fresh_sink(path)?;
        self.current = Some(path.to_path_buf());
        self.stopped = false;
        self.end_reported = false;
        if let Some(duration) = self.track_duration {
            self.pending
                .push(PlayerEvent::LengthChanged(duration_ms(duration)));
        }
        log::debug!("loaded {}", path.display());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.stopped {
            let path = self.current.clone().context("no track loaded")?;
            self.load(&path)?;
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.stopped = true;
    }

    fn is_playing(&self) -> bool {
        !self.stopped && !self.sink.is_paused() && !self.sink.empty()
    }

    fn time_ms(&self) -> u64 {
        if self.current.is_none() || self.stopped {
            return 0;
        }
        duration_ms(self.sink.get_pos())
    }

    fn set_time_ms(&mut self, ms: u64) -> Result<()> {
        if self.current.is_none() || self.stopped {
            anyhow::bail!("no active track");
        }
        let mut target = Duration::from_millis(ms);
        if let Some(duration) = self.track_duration {
            target = target.min(duration);
        }
        self.sink
            .try_seek(target)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        Ok(())
    }

    fn length_ms(&self) -> Option<u64> {
        self.track_duration.map(duration_ms)
    }

    fn volume(&self) -> u8 {
        self.volume
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        self.sink.set_volume(sink_volume(self.volume));
    }

    fn current_track(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn poll_events(&mut self) -> Vec<PlayerEvent> {
        let finished = self.current.is_some()
            && !self.stopped
            && !self.sink.is_paused()
            && self.sink.empty();
        if finished && !self.end_reported {
            self.end_reported = true;
            self.pending.push(PlayerEvent::EndReached);
        }
        std::mem::take(&mut self.pending)
    }

    fn release(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
        self.stopped = true;
        self.pending.clear();
    }

    fn output_name(&self) -> String {
        let channels = self.stream.config().channel_count();
        format!("System default output ({channels} ch)")
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

pub struct NullAudioEngine {
    current: Option<PathBuf>,
    playing: bool,
    volume: u8,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    end_reported: bool,
    pending: Vec<PlayerEvent>,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            current: None,
            playing: false,
            volume: 70,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            end_reported: false,
            pending: Vec::new(),
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if self.playing
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for NullAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.current = Some(path.to_path_buf());
        self.playing = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        self.end_reported = false;
        if let Some(duration) = self.track_duration {
            self.pending
                .push(PlayerEvent::LengthChanged(duration_ms(duration)));
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no track loaded");
        }
        if !self.playing {
            self.started_at = Some(Instant::now());
            self.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.end_reported = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn time_ms(&self) -> u64 {
        if self.current.is_none() {
            return 0;
        }
        duration_ms(self.current_position())
    }

    fn set_time_ms(&mut self, ms: u64) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }

        let target = Duration::from_millis(ms);
        self.position_offset = self
            .track_duration
            .map_or(target, |duration| target.min(duration));
        self.started_at = self.playing.then(Instant::now);
        Ok(())
    }

    fn length_ms(&self) -> Option<u64> {
        self.track_duration.map(duration_ms)
    }

    fn volume(&self) -> u8 {
        self.volume
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
    }

    fn current_track(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn poll_events(&mut self) -> Vec<PlayerEvent> {
        if let Some(duration) = self.track_duration
            && self.playing
            && !self.end_reported
            && self.current_position() >= duration
        {
            self.end_reported = true;
            self.playing = false;
            self.position_offset = duration;
            self.started_at = None;
            self.pending.push(PlayerEvent::EndReached);
        }
        std::mem::take(&mut self.pending)
    }

    fn release(&mut self) {
        self.stop();
        self.current = None;
        self.track_duration = None;
        self.pending.clear();
    }

    fn output_name(&self) -> String {
        "Null audio engine".to_string()
    }
}
