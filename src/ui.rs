use crate::audio::AudioOutput;
use crate::core::PlayerCore;
use crate::model::Theme;
use crate::player::PlayerState;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE_WITH_VERSION: &str = concat!("cazic v", env!("CARGO_PKG_VERSION"), "  ");

/// What the footer shows while the user is typing a `:` command.
pub struct CommandLineView<'a> {
    pub buffer: &'a str,
}

/// Screen areas the event loop hit-tests mouse input against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Regions {
    pub queue: Rect,
    pub timeline: Rect,
}

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
    playing: Color,
}

fn palette(theme: Theme) -> ThemePalette {
    match theme {
        Theme::Dark => ThemePalette {
            bg: Color::Rgb(10, 15, 24),
            panel_bg: Color::Rgb(19, 29, 43),
            panel_alt_bg: Color::Rgb(24, 38, 58),
            border: Color::Rgb(69, 121, 176),
            text: Color::Rgb(214, 228, 248),
            muted: Color::Rgb(149, 173, 204),
            accent: Color::Rgb(100, 203, 184),
            alert: Color::Rgb(249, 174, 88),
            selected_bg: Color::Rgb(34, 55, 82),
            playing: Color::Rgb(156, 186, 255),
        },
        Theme::Amoled => ThemePalette {
            bg: Color::Rgb(0, 0, 0),
            panel_bg: Color::Rgb(0, 0, 0),
            panel_alt_bg: Color::Rgb(8, 8, 8),
            border: Color::Rgb(74, 74, 74),
            text: Color::Rgb(242, 242, 242),
            muted: Color::Rgb(150, 150, 150),
            accent: Color::Rgb(212, 212, 212),
            alert: Color::Rgb(235, 176, 97),
            selected_bg: Color::Rgb(26, 26, 26),
            playing: Color::Rgb(178, 195, 220),
        },
        Theme::RosePine => ThemePalette {
            bg: Color::Rgb(25, 23, 36),
            panel_bg: Color::Rgb(31, 29, 46),
            panel_alt_bg: Color::Rgb(38, 35, 58),
            border: Color::Rgb(110, 106, 134),
            text: Color::Rgb(224, 222, 244),
            muted: Color::Rgb(144, 140, 170),
            accent: Color::Rgb(235, 188, 186),
            alert: Color::Rgb(246, 193, 119),
            selected_bg: Color::Rgb(64, 61, 82),
            playing: Color::Rgb(196, 167, 231),
        },
        Theme::Dracula => ThemePalette {
            bg: Color::Rgb(30, 31, 41),
            panel_bg: Color::Rgb(40, 42, 54),
            panel_alt_bg: Color::Rgb(48, 50, 64),
            border: Color::Rgb(98, 114, 164),
            text: Color::Rgb(248, 248, 242),
            muted: Color::Rgb(160, 166, 196),
            accent: Color::Rgb(80, 250, 123),
            alert: Color::Rgb(255, 184, 108),
            selected_bg: Color::Rgb(68, 71, 90),
            playing: Color::Rgb(255, 121, 198),
        },
    }
}

pub fn regions(area: Rect) -> Regions {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(vertical[1]);

    Regions {
        queue: body[0],
        timeline: vertical[2],
    }
}

pub fn draw<O: AudioOutput>(
    frame: &mut Frame,
    core: &PlayerCore<O>,
    command_line: Option<&CommandLineView<'_>>,
) {
    let colors = palette(core.settings.theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, core, vertical[0], &colors);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(vertical[1]);

    draw_queue(frame, core, body[0], &colors);
    draw_now_playing(frame, core, body[1], &colors);

    let timeline_block = Paragraph::new(Span::styled(
        timeline_line(core, 26, 14),
        Style::default().fg(colors.text),
    ))
    .block(panel_block(
        "Timeline",
        colors.panel_bg,
        colors.text,
        colors.border,
    ))
    .wrap(Wrap { trim: true });
    frame.render_widget(timeline_block, vertical[2]);

    let footer_line = match command_line {
        Some(command) => Line::from(vec![
            Span::styled(
                ":",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(command.buffer, Style::default().fg(colors.text)),
            Span::styled("_", Style::default().fg(colors.muted)),
        ]),
        None => Line::from(vec![
            Span::styled(
                "Keys: Space play/pause, Enter play, n/p next/prev, s shuffle, r repeat, d remove, t theme, : command, q quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
        ]),
    };
    let footer = Paragraph::new(footer_line).block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, vertical[3]);
}

fn draw_header<O: AudioOutput>(
    frame: &mut Frame,
    core: &PlayerCore<O>,
    area: Rect,
    colors: &ThemePalette,
) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );

    let header_inner = area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    });
    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(header_inner);

    let header_left = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", core.queue.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            core.player.state().label(),
            Style::default().fg(colors.alert),
        ),
    ]));
    frame.render_widget(header_left, header_chunks[0]);

    let header_right = Paragraph::new(Line::from(vec![
        flag_span("Shuffle", core.queue.is_shuffle(), colors),
        Span::styled("  ", Style::default()),
        flag_span("Repeat one", core.queue.is_repeat_one(), colors),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Theme {}", core.settings.theme.key()),
            Style::default().fg(colors.muted),
        ),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(header_right, header_chunks[1]);
}

fn flag_span(label: &'static str, enabled: bool, colors: &ThemePalette) -> Span<'static> {
    if enabled {
        Span::styled(
            label,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(label, Style::default().fg(colors.muted))
    }
}

fn draw_queue<O: AudioOutput>(
    frame: &mut Frame,
    core: &PlayerCore<O>,
    area: Rect,
    colors: &ThemePalette,
) {
    let cursor = core.queue.cursor();
    let items: Vec<ListItem> = core
        .queue
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let is_current = cursor == Some(index);
            let marker = if is_current { "  > " } else { "    " };
            let title_style = if is_current {
                Style::default().fg(colors.playing)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.title.as_str(), title_style),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!core.queue.is_empty()).then_some(core.selected));

    let title = if core.queue.is_empty() {
        String::from("Queue (empty, :add <path>)")
    } else {
        String::from("Queue")
    };

    let list = List::new(items)
        .block(panel_block(
            &title,
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
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_now_playing<O: AudioOutput>(
    frame: &mut Frame,
    core: &PlayerCore<O>,
    area: Rect,
    colors: &ThemePalette,
) {
    let current = core.queue.current();
    let title = current.map(|track| track.title.as_str()).unwrap_or("-");
    let artist = current.map(|track| track.artist.as_str()).unwrap_or("-");
    let album = current.map(|track| track.album.as_str()).unwrap_or("-");
    let artwork = current
        .and_then(|track| track.image)
        .and_then(|handle| core.queue.artwork().describe(handle))
        .unwrap_or_else(|| String::from("none"));
    let position = core
        .queue
        .cursor()
        .map(|index| format!("{}/{}", index + 1, core.queue.len()))
        .unwrap_or_else(|| format!("-/{}", core.queue.len()));

    let state_color = match core.player.state() {
        PlayerState::Playing => colors.accent,
        PlayerState::Paused => colors.alert,
        PlayerState::Idle => colors.muted,
    };

    let info_text = vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {title}"), Style::default().fg(colors.text)),
        ]),
        Line::from(Span::styled(
            format!("Artist  {artist}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Album   {album}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Cover   {artwork}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Queue   {position}"),
            Style::default().fg(colors.alert),
        )),
        Line::from(""),
        Line::from(Span::styled(
            core.player.state().label(),
            Style::default().fg(state_color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Output  {}", core.player.output().output_name()),
            Style::default().fg(colors.muted),
        )),
    ];
    let info_block = Paragraph::new(info_text)
        .block(panel_block(
            "Now Playing",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(info_block, area);
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

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line<O: AudioOutput>(
    core: &PlayerCore<O>,
    timeline_bar_width: usize,
    volume_bar_width: usize,
) -> String {
    let (elapsed, total, ratio) = core.player.progress();
    let volume = core.player.volume();
    let volume_percent = (volume * 100.0).round() as u16;

    format!(
        "{} / {} {}  |  Vol {} {:>3}%  +/- adjust  Left/Right seek",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(f64::from(volume)), volume_bar_width),
        volume_percent
    )
}
