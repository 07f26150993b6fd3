use crate::audio::{AudioOutput, NullOutput, RodioOutput};
use crate::config;
use crate::core::{PlayerCore, PlayerEvent, SeekTarget, VOLUME_STEP};
use crate::library::{self, LoftyTagReader, TagLoader};
use crate::model::{Settings, Theme};
use crate::queue::QueueStore;
use crate::ui::{self, CommandLineView};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SEEK_STEP_SECONDS: f64 = 5.0;

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    pub paths: Vec<PathBuf>,
    pub settings: Settings,
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let output: Box<dyn AudioOutput> = match RodioOutput::new() {
        Ok(output) => Box::new(output),
        Err(err) => {
            log::warn!("no audio device, falling back to silent output: {err:#}");
            Box::new(NullOutput::new())
        }
    };
    log::info!("audio output: {}", output.output_name());

    let mut core = PlayerCore::new(QueueStore::new(), output, options.settings);
    let mut loader = TagLoader::new(Arc::new(LoftyTagReader));
    enqueue_paths(&mut core, &mut loader, &options.paths);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut command_mode = false;
    let mut command_buffer = String::new();
    let mut last_tick = Instant::now();
    let mut regions = ui::Regions::default();

    let result: Result<()> = loop {
        for tag_event in loader.drain() {
            core.handle(tag_event.into());
        }
        core.poll_output();

        if core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                regions = ui::regions(frame.area());
                let command_line = command_mode.then_some(CommandLineView {
                    buffer: &command_buffer,
                });
                ui::draw(frame, &core, command_line.as_ref())
            })?;
            core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let event = event::read()?;
        if let Event::Mouse(mouse) = event {
            handle_mouse(&mut core, mouse, regions);
            continue;
        }

        let Event::Key(key) = event else {
            continue;
        };

        if key.kind != KeyEventKind::Press {
            continue;
        }

        if command_mode {
            match key.code {
                KeyCode::Esc => {
                    command_mode = false;
                    command_buffer.clear();
                    core.dirty = true;
                }
                KeyCode::Enter => {
                    run_command(&mut core, &mut loader, &command_buffer);
                    command_mode = false;
                    command_buffer.clear();
                    core.dirty = true;
                }
                KeyCode::Backspace => {
                    command_buffer.pop();
                    core.dirty = true;
                }
                KeyCode::Char(ch) => {
                    command_buffer.push(ch);
                    core.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break Ok(()),
            KeyCode::Char('q') => break Ok(()),
            KeyCode::Down => core.select_next(),
            KeyCode::Up => core.select_prev(),
            KeyCode::Enter => core.handle(PlayerEvent::PlayIndex(core.selected)),
            KeyCode::Char(' ') => core.handle(PlayerEvent::TogglePlayback),
            KeyCode::Char('n') => core.handle(PlayerEvent::Next),
            KeyCode::Char('p') => core.handle(PlayerEvent::Prev),
            KeyCode::Left => core.handle(PlayerEvent::UserSeek(SeekTarget::Relative(
                -SEEK_STEP_SECONDS,
            ))),
            KeyCode::Right => core.handle(PlayerEvent::UserSeek(SeekTarget::Relative(
                SEEK_STEP_SECONDS,
            ))),
            KeyCode::Char('s') => core.handle(PlayerEvent::ToggleShuffle),
            KeyCode::Char('r') => core.handle(PlayerEvent::ToggleRepeatOne),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                core.handle(PlayerEvent::AdjustVolume(VOLUME_STEP))
            }
            KeyCode::Char('-') => core.handle(PlayerEvent::AdjustVolume(-VOLUME_STEP)),
            KeyCode::Char('d') | KeyCode::Delete => {
                if !core.queue.is_empty() {
                    core.handle(PlayerEvent::Remove(core.selected));
                }
            }
            KeyCode::Char('t') => core.handle(PlayerEvent::CycleTheme),
            KeyCode::Char(':') => {
                command_mode = true;
                core.dirty = true;
            }
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    core.player.stop();
    if loader.pending() > 0 {
        log::debug!("exiting with {} tag reads in flight", loader.pending());
    }
    result
}

fn handle_mouse<O: AudioOutput>(
    core: &mut PlayerCore<O>,
    mouse: MouseEvent,
    regions: ui::Regions,
) {
    let inside_queue = point_in_rect(mouse.column, mouse.row, regions.queue);
    match mouse.kind {
        MouseEventKind::ScrollDown if inside_queue => core.select_next(),
        MouseEventKind::ScrollUp if inside_queue => core.select_prev(),
        MouseEventKind::Down(MouseButton::Left)
            if point_in_rect(mouse.column, mouse.row, regions.timeline) =>
        {
            if let Some(fraction) = fraction_in_rect(mouse.column, regions.timeline) {
                core.handle(PlayerEvent::UserSeek(SeekTarget::Fraction(fraction)));
            }
        }
        _ => {}
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

/// Horizontal click position inside the bordered panel, as a fraction of
/// its inner width.
fn fraction_in_rect(x: u16, rect: Rect) -> Option<f64> {
    let inner_width = rect.width.saturating_sub(2);
    if inner_width == 0 {
        return None;
    }
    let offset = x.saturating_sub(rect.x.saturating_add(1)).min(inner_width);
    Some(f64::from(offset) / f64::from(inner_width))
}

fn enqueue_paths<O: AudioOutput>(
    core: &mut PlayerCore<O>,
    loader: &mut TagLoader,
    selections: &[PathBuf],
) {
    let mut requested = 0usize;
    let mut last_error = None;
    for selection in selections {
        let selection = config::normalize_path(selection);
        match library::collect_audio_files(&selection) {
            Ok(files) => {
                requested += files.len();
                for file in files {
                    loader.request(file);
                }
            }
            Err(err) => {
                log::warn!("cannot queue {}: {err:#}", selection.display());
                last_error = Some(err);
            }
        }
    }

    match (requested, last_error) {
        (0, Some(err)) => core.set_status(&format!("add error: {err:#}")),
        (0, None) if !selections.is_empty() => core.set_status("No audio files found"),
        (0, None) => {}
        (count, _) => core.set_status(&format!("Reading tags of {count} file(s)")),
    }
}

fn run_command<O: AudioOutput>(core: &mut PlayerCore<O>, loader: &mut TagLoader, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        core.set_status("No command");
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => core.set_status(
            "Commands: add <path> | theme <dark|amoled|rose-pine|dracula> | save | clear | seek <0-100> | volume <0-100>",
        ),
        "add" => {
            if rest.is_empty() {
                core.set_status("Usage: add <path>");
            } else {
                enqueue_paths(core, loader, &[PathBuf::from(rest)]);
            }
        }
        "theme" => match Theme::parse(rest) {
            Some(theme) => core.handle(PlayerEvent::SetTheme(theme)),
            None => {
                let names: Vec<&str> = Theme::ALL.iter().map(|theme| theme.key()).collect();
                core.set_status(&format!("Usage: theme <{}>", names.join("|")));
            }
        },
        "save" => core.handle(PlayerEvent::SaveSettings),
        "clear" => core.handle(PlayerEvent::ClearQueue),
        "seek" => match parse_percent(rest) {
            Some(percent) => core.handle(PlayerEvent::UserSeek(SeekTarget::Fraction(
                percent / 100.0,
            ))),
            None => core.set_status("Usage: seek <0-100>"),
        },
        "volume" => match parse_percent(rest) {
            Some(percent) => core.handle(PlayerEvent::SetVolume((percent / 100.0) as f32)),
            None => core.set_status("Usage: volume <0-100>"),
        },
        _ => core.set_status("Unknown command. Use :help"),
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim_end_matches('%').trim().parse().ok()?;
    value.is_finite().then_some(value.clamp(0.0, 100.0))
}
