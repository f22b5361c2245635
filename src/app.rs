use crate::art::AlbumArtCache;
use crate::audio::{AudioEngine, NullAudioEngine, PlayerEvent, RodioAudioEngine};
use crate::config;
use crate::core::{PlayerCore, TrackEnd};
use crate::library;
use crate::model::{RepeatMode, Settings};
use crate::sleep::{self, SleepMode, SleepTimer};
use crate::theme::{PRESETS, ThemeState};
use crate::ui::{self, Screen};
use crate::worker::{MetadataWorker, WorkerEvent};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use image::DynamicImage;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use ratatui::{Frame, Terminal};
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(33);
const SEEK_STEP_MS: i64 = 5_000;
const VOLUME_STEP: u8 = 5;

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub inputs: Vec<PathBuf>,
    pub mini: bool,
    pub shuffle: bool,
    pub repeat: Option<RepeatMode>,
    pub volume: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Full,
    Mini,
}

pub struct App {
    pub core: PlayerCore,
    audio: Box<dyn AudioEngine>,
    art_cache: AlbumArtCache,
    current_art: Option<Arc<DynamicImage>>,
    pub theme: ThemeState,
    pub sleep: SleepTimer,
    worker: MetadataWorker,
    settings: Settings,
    pub view: View,
    command: Option<String>,
    show_help: bool,
    length_ms: Option<u64>,
    quit: bool,
}

pub fn run(options: LaunchOptions) -> Result<()> {
    let settings = config::load_settings().unwrap_or_else(|err| {
        log::warn!("settings unreadable, using defaults: {err:#}");
        Settings::default()
    });

    let audio: Box<dyn AudioEngine> = match RodioAudioEngine::new() {
        Ok(engine) => {
            log::info!("audio output: {}", engine.output_name());
            Box::new(engine)
        }
        Err(err) => {
            log::warn!("no audio output, continuing silently: {err:#}");
            Box::new(NullAudioEngine::new())
        }
    };

    let mut app = App::new(settings, audio, options);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.shutdown();
    let save_result = config::save_settings(app.persist_settings());
    result?;
    save_result?;
    Ok(())
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let mut playlist_area = Rect::default();
    let mut last_tick = Instant::now();
    app.tick(last_tick);

    loop {
        if last_tick.elapsed() >= TICK {
            last_tick = Instant::now();
            app.tick(last_tick);
        }

        if app.core.dirty {
            terminal.draw(|frame| {
                playlist_area = ui::playlist_rect(frame.area());
                app.draw(frame);
            })?;
            app.core.dirty = false;
        }

        if app.quit {
            return Ok(());
        }

        if !event::poll(POLL)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
            Event::Mouse(mouse) => app.handle_mouse(mouse, playlist_area),
            Event::Resize(..) => app.core.dirty = true,
            _ => {}
        }
    }
}

impl App {
    pub fn new(settings: Settings, mut audio: Box<dyn AudioEngine>, options: LaunchOptions) -> Self {
        let mut core = PlayerCore::new();
        core.shuffle = settings.shuffle || options.shuffle;
        core.repeat = options.repeat.unwrap_or(settings.repeat_mode);
        audio.set_volume(options.volume.unwrap_or(settings.volume));

        let mut app = Self {
            core,
            audio,
            art_cache: AlbumArtCache::new(),
            current_art: None,
            theme: ThemeState::from_settings(&settings),
            sleep: SleepTimer::new(),
            worker: MetadataWorker::spawn(),
            settings,
            view: if options.mini { View::Mini } else { View::Full },
            command: None,
            show_help: false,
            length_ms: None,
            quit: false,
        };

        let mut inputs = options.inputs;
        if inputs.is_empty()
            && let Some(folder) = app.settings.last_folder.clone().filter(|dir| dir.is_dir())
        {
            inputs.push(folder);
        }
        if let Some(folder) = inputs.iter().find(|input| input.is_dir()) {
            app.settings.last_folder = Some(config::normalize_path(folder));
        }

        let tracks = library::expand_inputs(&inputs);
        if !tracks.is_empty() {
            app.core.set_playlist(tracks);
            app.enqueue_metadata();
        }
        app
    }

    pub fn draw(&self, frame: &mut Frame) {
        let now = Instant::now();
        let screen = Screen {
            core: &self.core,
            audio: self.audio.as_ref(),
            theme: &self.theme.theme,
            length_ms: self.length_ms,
            sleep_label: self.sleep.label(now),
            has_art: self.current_art.is_some(),
            command: self.command.as_deref(),
            show_help: self.show_help,
        };
        match self.view {
            View::Full => ui::draw(frame, &screen),
            View::Mini => ui::draw_mini(frame, &screen),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        for event in self.audio.poll_events() {
            match event {
                PlayerEvent::LengthChanged(ms) => self.length_ms = Some(ms),
                PlayerEvent::EndReached => self.handle_track_end(),
            }
        }

        for WorkerEvent::Metadata(path, info) in self.worker.try_events() {
            if self.length_ms.is_none() && self.core.current_path() == Some(path.as_path()) {
                self.length_ms = info.duration_secs.map(|secs| secs * 1000);
            }
            self.core.set_track_info(path, info);
        }

        if self.sleep.check_expired(now) {
            self.audio.pause();
            self.core.set_status("Sleep timer ended, playback paused");
        }

        self.core.dirty = true;
    }

    pub fn shutdown(&mut self) {
        self.worker.cancel();
        self.audio.release();
    }

    pub fn persist_settings(&mut self) -> &Settings {
        self.theme.write_to(&mut self.settings);
        self.settings.volume = self.audio.volume();
        self.settings.shuffle = self.core.shuffle;
        self.settings.repeat_mode = self.core.repeat;
        &self.settings
    }

    fn enqueue_metadata(&mut self) {
        let missing: Vec<PathBuf> = self
            .core
            .playlist
            .iter()
            .filter(|path| self.core.track_info(path).is_none())
            .cloned()
            .collect();
        for path in missing {
            self.worker.enqueue(path);
        }
    }

    fn play_path(&mut self, path: PathBuf) {
        self.length_ms = None;
        match self.audio.load(&path).and_then(|()| self.audio.play()) {
            Ok(()) => {
                let name = self
                    .core
                    .track_info(&path)
                    .map(|info| info.title.clone())
                    .unwrap_or_else(|| library::display_name(&path));
                self.core.set_status(&format!("Playing {name}"));
            }
            Err(err) => {
                log::warn!("playback failed for {}: {err:#}", path.display());
                self.core.set_status(&format!("playback error: {err:#}"));
            }
        }

        self.current_art = self.art_cache.get_or_load(&path);
        self.theme.apply_album_art(self.current_art.as_deref());
        if self.core.track_info(&path).is_none() {
            self.worker.enqueue(path);
        }
    }

    fn stop_playback(&mut self) {
        self.audio.stop();
        self.length_ms = None;
        self.core.dirty = true;
    }

    fn handle_track_end(&mut self) {
        if self.sleep.mode() == Some(SleepMode::EndOfSong) {
            self.sleep.cancel();
            self.stop_playback();
            self.core.set_status("Sleep timer ended, playback stopped");
            return;
        }

        match self.core.on_track_end() {
            TrackEnd::Play(path) => self.play_path(path),
            TrackEnd::Stop => self.stop_playback(),
        }
    }

    fn toggle_play_pause(&mut self) {
        if self.audio.is_playing() {
            self.audio.pause();
            self.core.set_status("Paused");
            return;
        }

        let loaded = self.core.current_path();
        if loaded.is_some() && loaded == self.audio.current_track() {
            match self.audio.play() {
                Ok(()) => self.core.set_status("Playing"),
                Err(err) => self.core.set_status(&format!("playback error: {err:#}")),
            }
            return;
        }

        let target = self.core.current.or((!self.core.is_empty()).then_some(0));
        match target.and_then(|idx| self.core.select(idx)) {
            Some(path) => self.play_path(path),
            None => self.core.set_status("Playlist is empty"),
        }
    }

    fn skip(&mut self, forward: bool) {
        let next = if forward {
            self.core.skip_next()
        } else {
            self.core.skip_previous()
        };
        if let Some(path) = next {
            self.play_path(path);
        }
    }

    fn seek_by(&mut self, delta_ms: i64) {
        let target = (self.audio.time_ms() as i64).saturating_add(delta_ms).max(0) as u64;
        self.seek_to(target);
    }

    fn seek_to(&mut self, target_ms: u64) {
        match self.audio.set_time_ms(target_ms) {
            Ok(()) => self
                .core
                .set_status(&format!("Seek {}", library::format_time(target_ms / 1000))),
            Err(err) => self.core.set_status(&format!("seek failed: {err:#}")),
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.audio.set_volume(volume);
        let applied = self.audio.volume();
        self.core.set_status(&format!("Volume: {applied}%"));
    }

    fn remove_selected(&mut self) {
        if self.core.is_empty() {
            self.core.set_status("Playlist is empty");
            return;
        }
        if self.core.remove(&[self.core.selected]) {
            self.stop_playback();
            self.current_art = None;
        }
    }

    fn move_selected(&mut self, down: bool) {
        let from = self.core.selected;
        let to = if down {
            from + 1
        } else {
            match from.checked_sub(1) {
                Some(to) => to,
                None => return,
            }
        };
        self.core.move_row(from, to);
    }

    fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Full => View::Mini,
            View::Mini => View::Full,
        };
        self.core.dirty = true;
    }

    fn quick_sleep(&mut self, now: Instant) {
        if self.sleep.is_active() {
            self.sleep.cancel();
            self.core.set_status("Sleep timer cancelled");
        } else {
            let minutes = self.sleep.start_minutes(sleep::DEFAULT_MINUTES, now);
            self.core
                .set_status(&format!("Sleep timer: {minutes} min"));
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if let Some(buffer) = self.command.as_mut() {
            match key.code {
                KeyCode::Esc => self.command = None,
                KeyCode::Enter => {
                    let input = std::mem::take(buffer);
                    self.command = None;
                    self.run_command(&input);
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) => buffer.push(ch),
                _ => {}
            }
            self.core.dirty = true;
            return;
        }

        if self.show_help {
            self.show_help = false;
            self.core.dirty = true;
            if key.code == KeyCode::Esc {
                return;
            }
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit = true,
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => self.move_selected(true),
            KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => self.move_selected(false),
            KeyCode::Down => self.core.select_next_row(),
            KeyCode::Up => self.core.select_prev_row(),
            KeyCode::Enter => {
                if let Some(path) = self.core.activate_selected() {
                    self.play_path(path);
                }
            }
            KeyCode::Char(' ') => self.toggle_play_pause(),
            KeyCode::Char('n') => self.skip(true),
            KeyCode::Char('b') | KeyCode::Char('p') => self.skip(false),
            KeyCode::Char('s') => {
                self.core.toggle_shuffle();
            }
            KeyCode::Char('r') => {
                self.core.cycle_repeat();
            }
            KeyCode::Right => self.seek_by(SEEK_STEP_MS),
            KeyCode::Left => self.seek_by(-SEEK_STEP_MS),
            KeyCode::Char(digit @ '0'..='9') => {
                let fraction = f64::from(digit as u8 - b'0') / 10.0;
                if let Err(err) = self.audio.set_position(fraction) {
                    self.core.set_status(&format!("seek failed: {err:#}"));
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.set_volume(self.audio.volume().saturating_add(VOLUME_STEP));
            }
            KeyCode::Char('-') => {
                self.set_volume(self.audio.volume().saturating_sub(VOLUME_STEP));
            }
            KeyCode::Delete => self.remove_selected(),
            KeyCode::Char('m') => self.toggle_view(),
            KeyCode::Esc if self.view == View::Mini => self.toggle_view(),
            KeyCode::Char('t') => self.quick_sleep(Instant::now()),
            KeyCode::Char(':') => {
                self.command = Some(String::new());
                self.core.dirty = true;
            }
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, playlist_area: Rect) {
        if self.view != View::Full || !point_in_rect(mouse.column, mouse.row, playlist_area) {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => self.core.select_next_row(),
            MouseEventKind::ScrollUp => self.core.select_prev_row(),
            _ => {}
        }
    }

    pub fn run_command(&mut self, raw: &str) {
        self.run_command_at(raw, Instant::now());
    }

    fn run_command_at(&mut self, raw: &str, now: Instant) {
        let input = raw.trim();
        if input.is_empty() {
            self.core.set_status("No command");
            return;
        }

        let mut command_split = input.splitn(2, char::is_whitespace);
        let command = command_split.next().unwrap_or_default();
        let rest = command_split.next().unwrap_or("").trim();

        match command {
            "help" => {
                self.show_help = true;
                self.core.dirty = true;
            }
            "add" => {
                if rest.is_empty() {
                    self.core.set_status("Usage: add <file|folder>");
                    return;
                }
                let input = PathBuf::from(rest);
                if input.is_dir() {
                    self.settings.last_folder = Some(config::normalize_path(&input));
                }
                let tracks = library::expand_inputs(std::slice::from_ref(&input));
                if tracks.is_empty() {
                    self.core
                        .set_status(&format!("No audio files found in {}", input.display()));
                    return;
                }
                self.core.append(tracks);
                self.enqueue_metadata();
            }
            "remove" => self.remove_selected(),
            "clear" => {
                self.core.clear();
                self.worker.cancel();
                self.stop_playback();
                self.current_art = None;
                self.art_cache.clear();
            }
            "shuffle" => {
                self.core.toggle_shuffle();
            }
            "repeat" => {
                if rest.is_empty() {
                    self.core.cycle_repeat();
                } else if let Some(mode) = RepeatMode::parse(rest) {
                    self.core.set_repeat(mode);
                } else {
                    self.core.set_status("Usage: repeat [off|one|all]");
                }
            }
            "sleep" => self.sleep_command(rest, now),
            "color" => self.color_command(rest),
            "seek" => match library::parse_time(rest) {
                Some(secs) => self.seek_to(secs * 1000),
                None => self.core.set_status("Usage: seek <m:ss>"),
            },
            "volume" => match rest.parse::<u16>() {
                Ok(volume) => self.set_volume(volume.min(100) as u8),
                Err(_) => self.core.set_status("Usage: volume <0-100>"),
            },
            "mini" => self.toggle_view(),
            "q" | "quit" => self.quit = true,
            _ => self.core.set_status("Unknown command. Use :help"),
        }
    }

    fn sleep_command(&mut self, rest: &str, now: Instant) {
        match rest {
            "" => {
                let minutes = self.sleep.start_minutes(sleep::DEFAULT_MINUTES, now);
                self.core.set_status(&format!("Sleep timer: {minutes} min"));
            }
            "end" => {
                let length = self.length_ms.or_else(|| self.audio.length_ms());
                match self
                    .sleep
                    .start_end_of_song(self.audio.time_ms(), length, now)
                {
                    Some(secs) => self.core.set_status(&format!(
                        "Sleep at end of song ({})",
                        sleep::format_clock(secs)
                    )),
                    None => self.core.set_status("Track length unknown"),
                }
            }
            "cancel" | "off" => {
                self.sleep.cancel();
                self.core.set_status("Sleep timer cancelled");
            }
            "+" | "-" => {
                let delta = if rest == "+" {
                    sleep::ADJUST_STEP_SECS
                } else {
                    -sleep::ADJUST_STEP_SECS
                };
                if !self.sleep.is_active() {
                    self.core.set_status("No sleep timer running");
                    return;
                }
                match self.sleep.adjust(delta, now) {
                    Some(secs) => self
                        .core
                        .set_status(&format!("Sleep in {}", sleep::format_clock(secs))),
                    None => self.core.set_status("Sleep timer cancelled"),
                }
            }
            minutes => match minutes.parse::<u64>() {
                Ok(minutes) => {
                    let applied = self.sleep.start_minutes(minutes, now);
                    self.core.set_status(&format!("Sleep timer: {applied} min"));
                }
                Err(_) => self
                    .core
                    .set_status("Usage: sleep <minutes|end|cancel|+|->"),
            },
        }
    }

    fn color_command(&mut self, rest: &str) {
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("reset"), None) => {
                self.theme.reset();
                self.core.set_status("Colors reset to default");
            }
            (Some("auto"), Some("on")) => {
                self.theme.set_auto(true, self.current_art.as_deref());
                self.core.set_status("Album colors on");
            }
            (Some("auto"), Some("off")) => {
                self.theme.set_auto(false, None);
                self.core.set_status("Album colors off");
            }
            (Some("preset"), Some(index)) => {
                match index.parse::<usize>().ok().and_then(|idx| self.theme.apply_preset(idx)) {
                    Some(name) => self.core.set_status(&format!("Color: {name}")),
                    None => self
                        .core
                        .set_status(&format!("Preset must be 1-{}", PRESETS.len())),
                }
            }
            (Some(hex), None) if hex.starts_with('#') => match self.theme.set_custom_hex(hex) {
                Ok(color) => self.core.set_status(&format!("Color: {color}")),
                Err(err) => self.core.set_status(&err.to_string()),
            },
            _ => self
                .core
                .set_status("Usage: color <#hex|reset|auto on|auto off|preset N>"),
        }
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }

    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Default)]
    struct EngineLog {
        loaded: Vec<PathBuf>,
        events: Vec<PlayerEvent>,
        playing: bool,
        stopped: bool,
        time_ms: u64,
        length_ms: Option<u64>,
    }

    struct TestAudioEngine {
        log: Rc<RefCell<EngineLog>>,
        current: Option<PathBuf>,
        volume: u8,
    }

    impl AudioEngine for TestAudioEngine {
        fn load(&mut self, path: &Path) -> Result<()> {
            let mut log = self.log.borrow_mut();
            log.loaded.push(path.to_path_buf());
            log.stopped = false;
            log.playing = false;
            self.current = Some(path.to_path_buf());
            Ok(())
        }

        fn play(&mut self) -> Result<()> {
            self.log.borrow_mut().playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.log.borrow_mut().playing = false;
        }

        fn stop(&mut self) {
            let mut log = self.log.borrow_mut();
            log.playing = false;
            log.stopped = true;
        }

        fn is_playing(&self) -> bool {
            self.log.borrow().playing
        }

        fn time_ms(&self) -> u64 {
            self.log.borrow().time_ms
        }

        fn set_time_ms(&mut self, ms: u64) -> Result<()> {
            self.log.borrow_mut().time_ms = ms;
            Ok(())
        }

        fn length_ms(&self) -> Option<u64> {
            self.log.borrow().length_ms
        }

        fn volume(&self) -> u8 {
            self.volume
        }

        fn set_volume(&mut self, volume: u8) {
            self.volume = volume.min(100);
        }

        fn current_track(&self) -> Option<&Path> {
            self.current.as_deref()
        }

        fn poll_events(&mut self) -> Vec<PlayerEvent> {
            std::mem::take(&mut self.log.borrow_mut().events)
        }

        fn release(&mut self) {
            self.current = None;
        }

        fn output_name(&self) -> String {
            String::from("test")
        }
    }

    fn test_app(tracks: &[&str]) -> (App, Rc<RefCell<EngineLog>>) {
        let log = Rc::new(RefCell::new(EngineLog::default()));
        let engine = TestAudioEngine {
            log: Rc::clone(&log),
            current: None,
            volume: 0,
        };
        let mut app = App::new(Settings::default(), Box::new(engine), LaunchOptions::default());
        app.core
            .set_playlist(tracks.iter().map(PathBuf::from).collect());
        (app, log)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn settings_volume_reaches_engine() {
        let (app, _log) = test_app(&[]);
        assert_eq!(app.audio.volume(), 70);
    }

    #[test]
    fn unknown_command_is_reported() {
        let (mut app, _log) = test_app(&[]);
        app.run_command("wat");
        assert!(app.core.status.contains("Unknown command"));
    }

    #[test]
    fn add_command_accepts_paths_with_spaces() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("Music Folder");
        fs::create_dir(&folder).expect("folder");
        fs::write(folder.join("a.mp3"), b"x").expect("track");

        let (mut app, _log) = test_app(&[]);
        app.run_command(&format!("add {}", folder.display()));

        assert_eq!(app.core.len(), 1);
        assert!(app.settings.last_folder.is_some());
    }

    #[test]
    fn end_of_track_advances() {
        let (mut app, log) = test_app(&["a.mp3", "b.mp3"]);
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(log.borrow().loaded, vec![PathBuf::from("a.mp3")]);

        log.borrow_mut().events.push(PlayerEvent::EndReached);
        app.tick(Instant::now());

        assert_eq!(log.borrow().loaded.last(), Some(&PathBuf::from("b.mp3")));
        assert_eq!(app.core.current, Some(1));
        assert!(log.borrow().playing);
    }

    #[test]
    fn end_of_last_track_stops() {
        let (mut app, log) = test_app(&["a.mp3"]);
        press(&mut app, KeyCode::Enter);

        log.borrow_mut().events.push(PlayerEvent::EndReached);
        app.tick(Instant::now());

        assert!(log.borrow().stopped);
        assert_eq!(app.core.status, "End of playlist");
    }

    #[test]
    fn repeat_one_reloads_current_track() {
        let (mut app, log) = test_app(&["a.mp3", "b.mp3"]);
        app.run_command("repeat one");
        press(&mut app, KeyCode::Enter);

        log.borrow_mut().events.push(PlayerEvent::EndReached);
        app.tick(Instant::now());

        assert_eq!(
            log.borrow().loaded,
            vec![PathBuf::from("a.mp3"), PathBuf::from("a.mp3")]
        );
    }

    #[test]
    fn length_events_are_tracked() {
        let (mut app, log) = test_app(&["a.mp3"]);
        press(&mut app, KeyCode::Enter);
        log.borrow_mut().events.push(PlayerEvent::LengthChanged(90_000));
        app.tick(Instant::now());
        assert_eq!(app.length_ms, Some(90_000));
    }

    #[test]
    fn sleep_expiry_pauses_playback() {
        let (mut app, log) = test_app(&["a.mp3"]);
        press(&mut app, KeyCode::Enter);
        let now = Instant::now();
        app.run_command_at("sleep 5", now);
        assert_eq!(app.core.status, "Sleep timer: 5 min");

        app.tick(now + Duration::from_secs(301));
        assert!(!log.borrow().playing);
        assert!(!app.sleep.is_active());
    }

    #[test]
    fn end_of_song_sleep_stops_instead_of_advancing() {
        let (mut app, log) = test_app(&["a.mp3", "b.mp3"]);
        press(&mut app, KeyCode::Enter);

        let now = Instant::now();
        app.run_command_at("sleep end", now);
        assert_eq!(app.core.status, "Track length unknown");

        log.borrow_mut().length_ms = Some(60_000);
        log.borrow_mut().time_ms = 30_000;
        app.run_command_at("sleep end", now);
        assert!(app.core.status.contains("00:30"));

        log.borrow_mut().events.push(PlayerEvent::EndReached);
        app.tick(now + Duration::from_secs(5));
        assert!(log.borrow().stopped);
        assert_eq!(log.borrow().loaded.len(), 1);
        assert!(!app.sleep.is_active());
    }

    #[test]
    fn sleep_adjust_requires_running_timer() {
        let (mut app, _log) = test_app(&[]);
        let now = Instant::now();
        app.run_command_at("sleep +", now);
        assert_eq!(app.core.status, "No sleep timer running");

        app.run_command_at("sleep 10", now);
        app.run_command_at("sleep +", now);
        assert_eq!(app.core.status, "Sleep in 11:00");
        app.run_command_at("sleep cancel", now);
        assert!(!app.sleep.is_active());
    }

    #[test]
    fn color_commands_update_theme() {
        let (mut app, _log) = test_app(&[]);
        app.run_command("color #ff0000");
        assert_eq!(app.theme.theme.primary.to_hex(), "#ff0000");
        assert!(!app.theme.auto_from_album);

        app.run_command("color preset 99");
        assert_eq!(app.core.status, "Preset must be 1-18");

        app.run_command("color #zzzzzz");
        assert!(app.core.status.contains("#rrggbb"));

        app.run_command("color auto on");
        assert!(app.theme.auto_from_album);
        assert_eq!(app.theme.theme.primary, crate::color::FALLBACK_GREEN);
    }

    #[test]
    fn clear_command_drops_playlist_and_art() {
        let (mut app, log) = test_app(&["a.mp3", "b.mp3"]);
        press(&mut app, KeyCode::Enter);
        let cover = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        app.current_art = Some(app.art_cache.insert(PathBuf::from("a.mp3"), cover));

        app.run_command("clear");

        assert!(app.core.is_empty());
        assert!(app.current_art.is_none());
        assert_eq!(app.art_cache.len(), 0);
        assert!(log.borrow().stopped);
    }

    #[test]
    fn removing_playing_row_stops_audio() {
        let (mut app, log) = test_app(&["a.mp3", "b.mp3"]);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Delete);

        assert!(log.borrow().stopped);
        assert_eq!(app.core.current, None);
        assert_eq!(app.core.len(), 1);

        press(&mut app, KeyCode::Char(' '));
        assert_eq!(log.borrow().loaded.last(), Some(&PathBuf::from("b.mp3")));
    }

    #[test]
    fn volume_and_seek_commands() {
        let (mut app, log) = test_app(&["a.mp3"]);
        app.run_command("volume 250");
        assert_eq!(app.audio.volume(), 100);
        app.run_command("volume loud");
        assert_eq!(app.core.status, "Usage: volume <0-100>");

        app.run_command("seek 1:30");
        assert_eq!(log.borrow().time_ms, 90_000);
        press(&mut app, KeyCode::Left);
        assert_eq!(log.borrow().time_ms, 85_000);

        press(&mut app, KeyCode::Char('5'));
        assert!(app.core.status.contains("track length is unknown"));
        log.borrow_mut().length_ms = Some(200_000);
        press(&mut app, KeyCode::Char('5'));
        assert_eq!(log.borrow().time_ms, 100_000);
    }

    #[test]
    fn keys_toggle_modes_and_view() {
        let (mut app, _log) = test_app(&["a.mp3"]);
        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('r'));
        assert!(app.core.shuffle);
        assert_eq!(app.core.repeat, RepeatMode::One);

        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.view, View::Mini);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view, View::Full);
    }

    #[test]
    fn shift_arrows_reorder_rows() {
        let (mut app, _log) = test_app(&["a.mp3", "b.mp3", "c.mp3"]);
        app.handle_key(KeyEvent::new(KeyCode::Down, KeyModifiers::SHIFT));
        assert_eq!(app.core.playlist[1], PathBuf::from("a.mp3"));
        assert_eq!(app.core.selected, 1);
        assert_eq!(app.core.current, Some(1));

        app.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT));
        app.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT));
        assert_eq!(app.core.playlist[0], PathBuf::from("a.mp3"));
        assert_eq!(app.core.selected, 0);
    }

    #[test]
    fn command_prompt_collects_input() {
        let (mut app, _log) = test_app(&["a.mp3"]);
        press(&mut app, KeyCode::Char(':'));
        for ch in "repeat all".chars() {
            press(&mut app, KeyCode::Char(ch));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.core.repeat, RepeatMode::All);
        assert!(app.command.is_none());
    }

    #[test]
    fn persisted_settings_reflect_session() {
        let (mut app, _log) = test_app(&[]);
        app.run_command("shuffle");
        app.run_command("volume 40");
        app.run_command("color preset 1");

        let settings = app.persist_settings().clone();
        assert!(settings.shuffle);
        assert_eq!(settings.volume, 40);
        assert_eq!(settings.primary_color, "#4caf50");
        assert!(!settings.auto_color_from_album);
    }

    #[test]
    fn scroll_outside_playlist_is_ignored() {
        let (mut app, _log) = test_app(&["a.mp3", "b.mp3"]);
        let area = Rect::new(0, 0, 10, 10);
        let scroll = |column| MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column,
            row: 2,
            modifiers: KeyModifiers::NONE,
        };

        app.handle_mouse(scroll(50), area);
        assert_eq!(app.core.selected, 0);
        app.handle_mouse(scroll(5), area);
        assert_eq!(app.core.selected, 1);
    }
}
