use crate::audio::AudioEngine;
use crate::color::Rgb;
use crate::core::PlayerCore;
use crate::library;
use crate::theme::ColorTheme;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "SAS Player  ";
const KEY_HINTS: &str = "Enter play, Space pause, n/b next/prev, s shuffle, r repeat, \u{2190}/\u{2192} seek, 0-9 jump, Shift+\u{2191}/\u{2193} move, +/- vol, t sleep, m mini, : cmd, q quit";
const HELP_LINES: &[&str] = &[
    "add <file|folder>      append tracks",
    "remove                 remove selected row",
    "clear                  empty the playlist",
    "shuffle / repeat [m]   playback modes",
    "seek <m:ss>            jump within the track",
    "volume <0-100>         set volume",
    "sleep <min|end|cancel|+|->  sleep timer",
    "color <#hex|reset|auto on|auto off|preset N>",
    "mini                   toggle mini player",
];

pub struct Screen<'a> {
    pub core: &'a PlayerCore,
    pub audio: &'a dyn AudioEngine,
    pub theme: &'a ColorTheme,
    pub length_ms: Option<u64>,
    pub sleep_label: String,
    pub has_art: bool,
    pub command: Option<&'a str>,
    pub show_help: bool,
}

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    primary: Color,
    accent: Color,
    selected_bg: Color,
    art_empty: Color,
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn palette(theme: &ColorTheme) -> ThemePalette {
    let variants = theme.variants();
    ThemePalette {
        bg: Color::Rgb(18, 18, 18),
        panel_bg: Color::Rgb(24, 24, 24),
        panel_alt_bg: Color::Rgb(32, 32, 32),
        border: rgb(theme.primary),
        text: Color::Rgb(235, 235, 235),
        muted: Color::Rgb(150, 150, 150),
        primary: rgb(theme.primary),
        accent: rgb(theme.accent),
        selected_bg: rgb(variants.dark),
        art_empty: Color::Rgb(30, 30, 30),
    }
}

pub fn playlist_rect(area: Rect) -> Rect {
    body_split(full_split(area)[1])[0]
}

fn full_split(area: Rect) -> [Rect; 4] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2], chunks[3]]
}

fn body_split(area: Rect) -> [Rect; 2] {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(area);
    [chunks[0], chunks[1]]
}

pub fn draw(frame: &mut Frame, screen: &Screen) {
    let colors = palette(screen.theme);
    let core = screen.core;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = full_split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", core.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        mode_span("Shuffle", if core.shuffle { "ON" } else { "OFF" }, core.shuffle, &colors),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        mode_span(
            "Repeat",
            core.repeat.label(),
            core.repeat != crate::model::RepeatMode::Off,
            &colors,
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        mode_span(
            "Sleep",
            &screen.sleep_label,
            screen.sleep_label != "--",
            &colors,
        ),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(header, vertical[0]);

    let body = body_split(vertical[1]);

    let items: Vec<ListItem> = (0..core.len())
        .map(|idx| {
            let playing = core.current == Some(idx);
            let marker = if playing { "  > " } else { "    " };
            let style = if playing {
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(core.row_label(idx), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!core.is_empty()).then_some(core.selected));

    let list = List::new(items)
        .block(panel_block(
            "Playlist",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, body[0], &mut state);

    draw_now_playing(frame, screen, body[1], &colors);

    let timeline = Paragraph::new(Span::styled(
        timeline_line(screen.audio, screen.length_ms, 30, 12),
        Style::default().fg(colors.text),
    ))
    .block(panel_block(
        "Timeline",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(timeline, vertical[2]);

    let footer = match screen.command {
        Some(buffer) => Paragraph::new(Line::from(vec![
            Span::styled(
                ":",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(buffer, Style::default().fg(colors.text)),
        ])),
        None => Paragraph::new(Line::from(vec![
            Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(KEY_HINTS, Style::default().fg(colors.muted)),
        ])),
    }
    .block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, vertical[3]);

    if screen.show_help {
        draw_help(frame, &colors);
    }
}

fn draw_now_playing(frame: &mut Frame, screen: &Screen, area: Rect, colors: &ThemePalette) {
    let block = panel_block(
        "Now Playing",
        colors.panel_alt_bg,
        colors.text,
        colors.border,
    );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let split = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(4)])
        .split(inner);

    let swatch_color = if screen.has_art {
        colors.primary
    } else {
        colors.art_empty
    };
    let swatch_label = if screen.has_art { "" } else { "no album art" };
    frame.render_widget(
        Paragraph::new(Span::styled(swatch_label, Style::default().fg(colors.muted)))
            .alignment(Alignment::Center)
            .style(Style::default().bg(swatch_color)),
        split[0].inner(Margin {
            vertical: 0,
            horizontal: 2,
        }),
    );

    let core = screen.core;
    let info = core.current_info();
    let title = info
        .map(|info| info.title.clone())
        .or_else(|| core.current_path().map(library::display_name))
        .unwrap_or_else(|| String::from("-"));
    let artist = info.map_or("-", |info| info.artist.as_str());
    let album = info.map_or("-", |info| info.album.as_str());
    let position = core
        .current
        .map(|idx| format!("{}/{}", idx + 1, core.len()))
        .unwrap_or_else(|| format!("-/{}", core.len()));

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Artist  {artist}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Album   {album}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Track   {position}"),
            Style::default().fg(colors.text),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), split[1]);
}

pub fn draw_mini(frame: &mut Frame, screen: &Screen) {
    let colors = palette(screen.theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let area = centered_rect(frame.area(), 70, 50);
    let core = screen.core;
    let info = core.current_info();
    let title = info
        .map(|info| info.title.clone())
        .or_else(|| core.current_path().map(library::display_name))
        .unwrap_or_else(|| String::from("Nothing playing"));
    let artist = info.map_or("", |info| info.artist.as_str());
    let state = if screen.audio.is_playing() {
        "\u{25b6} playing"
    } else {
        "\u{23f8} paused"
    };

    let lines = vec![
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(artist, Style::default().fg(colors.muted))),
        Line::from(""),
        Line::from(vec![
            Span::styled(state, Style::default().fg(colors.primary)),
            Span::styled(
                format!("   sleep {}", screen.sleep_label),
                Style::default().fg(colors.muted),
            ),
        ]),
        Line::from(Span::styled(
            timeline_line(screen.audio, screen.length_ms, 24, 0),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "m full view  Space pause  n/b skip  q quit",
            Style::default().fg(colors.muted),
        )),
    ];

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(panel_block(
                "Mini Player",
                colors.panel_alt_bg,
                colors.text,
                colors.border,
            )),
        area,
    );
}

fn draw_help(frame: &mut Frame, colors: &ThemePalette) {
    let popup = centered_rect(frame.area(), 60, 60);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = HELP_LINES
        .iter()
        .map(|line| ListItem::new(Span::styled(*line, Style::default().fg(colors.text))))
        .collect();
    frame.render_widget(
        List::new(items).block(panel_block(
            "Commands (Esc to close)",
            colors.panel_alt_bg,
            colors.text,
            colors.accent,
        )),
        popup,
    );
}

fn mode_span<'a>(name: &str, value: &str, active: bool, colors: &ThemePalette) -> Span<'a> {
    let style = if active {
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(colors.muted)
    };
    Span::styled(format!("{name} {value}"), style)
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn progress_bar(ratio: f64, width: usize) -> String {
    let clamped = ratio.clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(
    audio: &dyn AudioEngine,
    length_ms: Option<u64>,
    timeline_bar_width: usize,
    volume_bar_width: usize,
) -> String {
    let elapsed_ms = audio.time_ms();
    let length_ms = length_ms.or_else(|| audio.length_ms());
    let ratio = length_ms
        .filter(|length| *length > 0)
        .map_or(0.0, |length| elapsed_ms as f64 / length as f64);

    let mut line = format!(
        "{} / {} {}",
        library::format_time(elapsed_ms / 1000),
        length_ms
            .map(|length| library::format_time(length / 1000))
            .unwrap_or_else(|| String::from("-:--")),
        progress_bar(ratio, timeline_bar_width),
    );
    if volume_bar_width > 0 {
        let volume = audio.volume();
        line.push_str(&format!(
            "  |  Vol {} {volume:>3}%",
            progress_bar(f64::from(volume) / 100.0, volume_bar_width)
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioEngine;
    use ratatui::backend::TestBackend;
    use std::path::PathBuf;

    fn rendered(screen: &Screen, mini: bool) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).expect("terminal");
        terminal
            .draw(|frame| {
                if mini {
                    draw_mini(frame, screen);
                } else {
                    draw(frame, screen);
                }
            })
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.5, 4), "[##--]");
        assert_eq!(progress_bar(2.0, 3), "[###]");
        assert_eq!(progress_bar(-1.0, 2), "[--]");
    }

    #[test]
    fn timeline_without_length_shows_placeholder() {
        let audio = NullAudioEngine::new();
        let line = timeline_line(&audio, None, 4, 0);
        assert_eq!(line, "0:00 / -:-- [----]");
    }

    #[test]
    fn full_view_lists_tracks_and_modes() {
        let mut core = PlayerCore::with_seed(3);
        core.set_playlist(vec![PathBuf::from("intro.mp3"), PathBuf::from("outro.mp3")]);
        core.toggle_shuffle();
        let audio = NullAudioEngine::new();
        let theme = ColorTheme::default();
        let screen = Screen {
            core: &core,
            audio: &audio,
            theme: &theme,
            length_ms: None,
            sleep_label: String::from("--"),
            has_art: false,
            command: None,
            show_help: false,
        };

        let text = rendered(&screen, false);
        assert!(text.contains("intro.mp3"));
        assert!(text.contains("Shuffle ON"));
        assert!(text.contains("Repeat OFF"));
        assert!(text.contains("no album art"));
    }

    #[test]
    fn mini_view_shows_current_track() {
        let mut core = PlayerCore::with_seed(3);
        core.set_playlist(vec![PathBuf::from("single.flac")]);
        let audio = NullAudioEngine::new();
        let theme = ColorTheme::default();
        let screen = Screen {
            core: &core,
            audio: &audio,
            theme: &theme,
            length_ms: Some(200_000),
            sleep_label: String::from("12"),
            has_art: true,
            command: None,
            show_help: false,
        };

        let text = rendered(&screen, true);
        assert!(text.contains("single.flac"));
        assert!(text.contains("sleep 12"));
        assert!(text.contains("3:20"));
    }
}
