//! Interactive two-pane TUI over a queue session

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::config::{ClientConfig, SessionState};
use crate::queue::entry::Entry;
use crate::queue::pane::Pane;
use crate::queue::window::WindowStore;
use crate::queue::{
    EngineEvent, Notice, NoticeLevel, Notifier, QueueSession, ScrollCommand, Side,
};
use crate::remote::{PushEvent, RemoteGateway, events};
use crate::utils::tui_log;

/// How long a notice stays on the status line
const NOTICE_TIMEOUT: Duration = Duration::from_secs(4);

/// Log lines shown in the log strip
const LOG_LINES: usize = 5;

/// Cursor and viewport of one pane
#[derive(Debug, Default)]
struct PaneView {
    selected: usize,
    offset: usize,
    height: usize,
    /// Last range reported to the session
    reported: Option<Range<usize>>,
}

impl PaneView {
    fn visible(&self) -> Range<usize> {
        self.offset..self.offset + self.height
    }

    /// Clamp the cursor to `count` rows and keep it inside the viewport
    fn settle(&mut self, count: usize) {
        self.selected = self.selected.min(count.saturating_sub(1));
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.height > 0 && self.selected >= self.offset + self.height {
            self.offset = self.selected + 1 - self.height;
        }
    }

    fn reset(&mut self) {
        self.selected = 0;
        self.offset = 0;
    }
}

struct BrowserState {
    focus: Side,
    left: PaneView,
    right: PaneView,
    filter_mode: bool,
    /// Row held by a move in progress
    grabbed: Option<usize>,
    show_help: bool,
    show_log: bool,
    notice: Option<Notice>,
    /// Language tag names are shown in
    tag_language: String,
}

impl BrowserState {
    fn new(tag_language: String) -> Self {
        Self {
            focus: Side::Left,
            left: PaneView::default(),
            right: PaneView::default(),
            filter_mode: false,
            grabbed: None,
            show_help: false,
            show_log: false,
            notice: None,
            tag_language,
        }
    }

    fn view(&self, side: Side) -> &PaneView {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn view_mut(&mut self, side: Side) -> &mut PaneView {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::info(message));
    }

    /// Clear the notice once it has been shown long enough
    fn check_status_timeout(&mut self) {
        if let Some(notice) = &self.notice
            && notice.at.elapsed() > NOTICE_TIMEOUT
        {
            self.notice = None;
        }
    }
}

/// Run the interactive browser. Returns the state to restore next time.
pub async fn run_browser(
    gateway: Arc<dyn RemoteGateway>,
    config: &ClientConfig,
    saved: &SessionState,
    events_url: Option<Url>,
    token: Option<String>,
) -> Result<SessionState> {
    let (notifier, mut notices) = Notifier::channel();
    let (mut session, mut engine_events) =
        QueueSession::start(gateway, config, saved, notifier)
            .await
            .map_err(|e| e.into_report("Failed to open the queue"))?;

    let mut push = events_url.map(|url| events::subscribe(url, token));

    // Enable TUI mode to divert logging away from the terminal
    tui_log::set_tui_mode(true);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = BrowserState::new(config.tag_language.clone());
    let result = run_browser_loop(
        &mut terminal,
        &mut state,
        &mut session,
        &mut engine_events,
        &mut notices,
        push.as_mut().map(|(rx, _)| rx),
    )
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    tui_log::set_tui_mode(false);

    if let Some((_, handle)) = push {
        handle.abort();
    }

    result.map(|_| session.session_state())
}

async fn run_browser_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut BrowserState,
    session: &mut QueueSession,
    engine_events: &mut mpsc::UnboundedReceiver<EngineEvent>,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
    mut push: Option<&mut mpsc::UnboundedReceiver<PushEvent>>,
) -> Result<()> {
    loop {
        // Collect first, the session is borrowed while handling
        let mut pending: Vec<EngineEvent> = Vec::new();
        while let Ok(event) = engine_events.try_recv() {
            pending.push(event);
        }
        if let Some(rx) = push.as_deref_mut() {
            while let Ok(event) = rx.try_recv() {
                pending.push(EngineEvent::Push(event));
            }
        }
        for event in pending {
            let scrolls = session.handle(event, Instant::now());
            apply_scrolls(state, session, scrolls);
        }
        while let Ok(notice) = notices.try_recv() {
            state.notice = Some(notice);
        }

        session.tick(Instant::now());
        state.check_status_timeout();

        let area = terminal.size()?;
        let layout = ScreenLayout::new(Rect::new(0, 0, area.width, area.height), state.show_log);
        sync_viewports(state, session, &layout);

        terminal.draw(|f| draw_ui(f, state, session))?;

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if state.show_help {
                state.show_help = false;
                continue;
            }

            if state.filter_mode {
                handle_filter_key(state, session, key);
                continue;
            }

            if !handle_key(state, session, key) {
                return Ok(());
            }
        }
    }
}

/// Scroll the widget as the session asks, then report the scroll back the
/// way a widget does, so the session sees its own echo
fn apply_scrolls(state: &mut BrowserState, session: &mut QueueSession, scrolls: Vec<ScrollCommand>) {
    for ScrollCommand { side, row } in scrolls {
        let view = state.view_mut(side);
        view.selected = row;
        view.offset = row.saturating_sub(view.height / 2);
        session.on_user_scroll(side, row, Instant::now());
    }
}

/// Report viewport changes so missing rows get fetched
fn sync_viewports(state: &mut BrowserState, session: &mut QueueSession, layout: &ScreenLayout) {
    for side in Side::BOTH {
        let count = session.pane(side).store().count();
        let view = state.view_mut(side);
        view.height = layout.list_height(side);
        view.settle(count);

        let visible = view.visible();
        if view.reported.as_ref() != Some(&visible) {
            view.reported = Some(visible.clone());
            session.on_visible_range(side, visible);
        }
    }
}

/// Move the focused cursor by `delta` rows, reporting it as user scrolling
fn move_cursor(state: &mut BrowserState, session: &mut QueueSession, delta: isize) {
    let side = state.focus;
    let count = session.pane(side).store().count();
    if count == 0 {
        return;
    }

    let target = state
        .view(side)
        .selected
        .saturating_add_signed(delta)
        .min(count - 1);

    if state.grabbed.is_some() {
        if session.move_grabbed(target) {
            state.grabbed = Some(target);
            state.view_mut(side).selected = target;
        }
        return;
    }

    let view = state.view_mut(side);
    view.selected = target;
    view.settle(count);
    session.on_user_scroll(side, target, Instant::now());
}

fn handle_filter_key(state: &mut BrowserState, session: &mut QueueSession, key: KeyEvent) {
    let side = state.focus;
    let mut text = session.pane(side).filter_input().to_string();

    match key.code {
        KeyCode::Esc => {
            text.clear();
            state.filter_mode = false;
        }
        KeyCode::Enter => {
            state.filter_mode = false;
            return;
        }
        KeyCode::Backspace => {
            text.pop();
        }
        KeyCode::Char(c) => text.push(c),
        _ => return,
    }

    session.set_filter(side, &text);
    state.view_mut(side).reset();
}

/// Handle one key press. Returns false to quit.
fn handle_key(state: &mut BrowserState, session: &mut QueueSession, key: KeyEvent) -> bool {
    let side = state.focus;
    let row = state.view(side).selected;
    let page = state.view(side).height.max(1) as isize;

    match key.code {
        KeyCode::Char('q') => {
            if state.grabbed.is_some() {
                release_grab(state, session);
            }
            return false;
        }
        KeyCode::Tab => {
            if state.grabbed.is_none() {
                state.focus = side.opposite();
            }
        }
        KeyCode::Down | KeyCode::Char('j') => move_cursor(state, session, 1),
        KeyCode::Up | KeyCode::Char('k') => move_cursor(state, session, -1),
        KeyCode::PageDown => move_cursor(state, session, page),
        KeyCode::PageUp => move_cursor(state, session, -page),
        KeyCode::Home | KeyCode::Char('g') => move_cursor(state, session, -(row as isize)),
        KeyCode::End | KeyCode::Char('G') => move_cursor(state, session, isize::MAX / 2),
        KeyCode::Char(' ') => {
            session.toggle_check(side, row);
        }
        KeyCode::Char('a') => {
            let n = session.select_all(side, true);
            state.set_status(format!("{} loaded entries selected", n));
        }
        KeyCode::Char('A') => {
            session.select_all(side, false);
        }
        KeyCode::Char('d') => {
            let ids = session.selection(side, Some(row));
            session.delete(side, &ids);
        }
        KeyCode::Char('c') => {
            let ids = session.selection(side, Some(row));
            if session.add_to_opposite(side, &ids) {
                let target = &session.pane(side.opposite()).playlist().name;
                state.set_status(format!("Adding {} to {}", ids.len(), target));
            }
        }
        KeyCode::Char('t') => {
            let ids = session.selection(side, Some(row));
            session.transfer_to_opposite(side, &ids);
        }
        KeyCode::Char('m') | KeyCode::Enter if state.grabbed.is_some() => {
            release_grab(state, session);
        }
        KeyCode::Char('m') => {
            if session.grab(side, row) {
                state.grabbed = Some(row);
            }
        }
        KeyCode::Esc if state.grabbed.is_some() => release_grab(state, session),
        KeyCode::Char('/') => {
            state.filter_mode = true;
        }
        KeyCode::Char('o') => {
            let order = session.pane(side).mode().order.next();
            session.set_order(side, order);
            state.view_mut(side).reset();
        }
        KeyCode::Char('p') => {
            match session.go_to_playing(side, Instant::now()) {
                Some(scroll) => apply_scrolls(state, session, vec![scroll]),
                None => state.set_status("Nothing playing in view"),
            }
        }
        KeyCode::Char('[') => cycle_playlist(state, session, -1),
        KeyCode::Char(']') => cycle_playlist(state, session, 1),
        KeyCode::Char('f') => {
            session.toggle_favorite(side, row);
        }
        KeyCode::Char('u') => {
            session.upvote(side, row);
        }
        KeyCode::Char('L') => state.show_log = !state.show_log,
        KeyCode::Char('?') => state.show_help = !state.show_help,
        _ => {}
    }
    true
}

fn release_grab(state: &mut BrowserState, session: &mut QueueSession) {
    state.grabbed = None;
    if let Some(scroll) = session.drop_grabbed(Instant::now()) {
        apply_scrolls(state, session, vec![scroll]);
    }
}

/// Show the previous or next known playlist on the focused side
fn cycle_playlist(state: &mut BrowserState, session: &mut QueueSession, step: isize) {
    if state.grabbed.is_some() {
        return;
    }
    let side = state.focus;
    let playlists = session.playlists();
    if playlists.is_empty() {
        return;
    }

    let current = &session.pane(side).playlist().id;
    let index = playlists
        .iter()
        .position(|playlist| &playlist.id == current)
        .unwrap_or(0);
    let next = (index as isize + step).rem_euclid(playlists.len() as isize) as usize;
    let playlist = playlists[next].clone();

    debug!("Cycling {:?} side to {}", side, playlist.id);
    session.switch_playlist(side, playlist);
    state.left.reset();
    state.right.reset();
}

/// Screen areas shared by drawing and viewport sizing
struct ScreenLayout {
    left: Rect,
    right: Rect,
    log: Option<Rect>,
    status: Rect,
    footer: Rect,
}

impl ScreenLayout {
    fn new(area: Rect, show_log: bool) -> Self {
        let log_height = if show_log { LOG_LINES as u16 + 2 } else { 0 };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),             // Panes
                Constraint::Length(log_height), // Log strip
                Constraint::Length(1),          // Status
                Constraint::Length(2),          // Footer/help
            ])
            .split(area);

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        Self {
            left: panes[0],
            right: panes[1],
            log: show_log.then_some(rows[1]),
            status: rows[2],
            footer: rows[3],
        }
    }

    fn pane(&self, side: Side) -> Rect {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Rows inside the pane border
    fn list_height(&self, side: Side) -> usize {
        self.pane(side).height.saturating_sub(2) as usize
    }
}

fn draw_ui(f: &mut Frame, state: &BrowserState, session: &QueueSession) {
    let layout = ScreenLayout::new(f.area(), state.show_log);

    for side in Side::BOTH {
        draw_pane(f, layout.pane(side), state, side, session.pane(side));
    }

    if let Some(area) = layout.log {
        let lines: Vec<Line> = tui_log::recent_lines(LOG_LINES)
            .into_iter()
            .map(Line::from)
            .collect();
        let log = Paragraph::new(lines)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Log"));
        f.render_widget(log, area);
    }

    if let Some(notice) = &state.notice {
        let color = match notice.level {
            NoticeLevel::Info => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        f.render_widget(
            Paragraph::new(notice.message.clone()).style(Style::default().fg(color)),
            layout.status,
        );
    }

    let help_text = if state.grabbed.is_some() {
        "j/k: Move entry | m/Enter/Esc: Drop"
    } else if state.filter_mode {
        "Type to filter | Enter: Done | Esc: Clear"
    } else {
        "j/k: Navigate | Tab: Switch side | Space: Select | c/t: Copy/Move across | d: Delete | m: Reorder | /: Filter | o: Order | p: Playing | [/]: Playlist | ?: Help | q: Quit"
    };
    let footer = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, layout.footer);

    if state.show_help {
        draw_help(f);
    }
}

fn draw_pane(f: &mut Frame, area: Rect, state: &BrowserState, side: Side, pane: &Pane) {
    let view = state.view(side);
    let store = pane.store();
    let focused = state.focus == side;

    let mut title = vec![Span::styled(
        format!(" {} ", pane.playlist().name),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    title.push(Span::raw(format!("({}) ", store.count())));
    if let Some(order) = pane.mode().order.as_param() {
        title.push(Span::styled(format!("by {} ", order), Style::default().fg(Color::Cyan)));
    }
    if !pane.filter_input().is_empty() || (focused && state.filter_mode) {
        let cursor = if focused && state.filter_mode { "█" } else { "" };
        title.push(Span::styled(
            format!("/{}{} ", pane.filter_input(), cursor),
            Style::default().fg(Color::Yellow),
        ));
    }
    if pane.is_fetching() {
        title.push(Span::styled("… ", Style::default().fg(Color::DarkGray)));
    }
    if !pane.cursor().follow_playing() && pane.cursor().playing().is_some() {
        title.push(Span::styled("[p] ", Style::default().fg(Color::DarkGray)));
    }

    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let end = (view.offset + view.height).min(store.count());
    let items: Vec<ListItem> = (view.offset..end)
        .map(|row| {
            let selected = focused && row == view.selected;
            let grabbed = focused && state.grabbed == Some(row);
            match store.row(row) {
                Some(entry) => entry_item(entry, store, &state.tag_language, selected, grabbed),
                None => ListItem::new("    ...").style(Style::default().fg(Color::DarkGray)),
            }
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Line::from(title)),
    );
    f.render_widget(list, area);
}

fn entry_item(
    entry: &Entry,
    store: &WindowStore,
    language: &str,
    selected: bool,
    grabbed: bool,
) -> ListItem<'static> {
    let check = if entry.checked { "[x] " } else { "[ ] " };
    let marker = if entry.playing { "▶ " } else { "  " };

    let mut text = format!("{}{}{}", check, marker, entry.title);
    if let Some(artist) = &entry.artist {
        text.push_str(&format!(" - {}", artist));
    }
    if !entry.tags.is_empty() {
        let names: Vec<&str> = entry.tags.iter().map(|tid| store.tag_name(tid, language)).collect();
        text.push_str(&format!(" [{}]", names.join(", ")));
    }
    if let Some(nickname) = &entry.requested_by {
        text.push_str(&format!(" ({})", nickname));
    }
    if entry.favorite {
        text.push_str(" ♥");
    }
    if entry.upvote_count > 0 {
        text.push_str(&format!(" +{}", entry.upvote_count));
    }

    let mut style = if entry.playing {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else if entry.checked {
        Style::default().fg(Color::Green)
    } else if entry.dejavu || !entry.visible {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    if grabbed {
        style = style.bg(Color::Blue);
    } else if selected {
        style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
    }

    ListItem::new(text).style(style)
}

fn draw_help(f: &mut Frame) {
    let help_lines = vec![
        Line::from("Keyboard Shortcuts"),
        Line::from(""),
        Line::styled("Navigation", Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  ↑/k, ↓/j    Move up/down"),
        Line::from("  PgUp/PgDn   Page up/down"),
        Line::from("  g/G         First/last entry"),
        Line::from("  Tab         Switch side"),
        Line::from("  [ / ]       Previous/next playlist"),
        Line::from("  p           Go to playing entry"),
        Line::from(""),
        Line::styled("Selection", Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Space       Toggle selection"),
        Line::from("  a / A       Select/deselect all loaded"),
        Line::from(""),
        Line::styled("Editing", Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  c           Copy to other side"),
        Line::from("  t           Move to other side"),
        Line::from("  d           Remove"),
        Line::from("  m           Grab entry, j/k to move, m to drop"),
        Line::from("  f / u       Favorite / upvote"),
        Line::from(""),
        Line::styled("View", Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  /           Filter"),
        Line::from("  o           Cycle sort order"),
        Line::from("  L           Toggle log"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::styled("Press any key to close", Style::default().fg(Color::DarkGray)),
    ];
    let help_popup = Paragraph::new(help_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Help")
            .style(Style::default().bg(Color::Black)),
    );
    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);
    f.render_widget(help_popup, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_keeps_cursor_in_viewport() {
        let mut view = PaneView {
            selected: 40,
            offset: 0,
            height: 10,
            reported: None,
        };
        view.settle(100);
        assert_eq!(view.visible(), 31..41);

        view.selected = 5;
        view.settle(100);
        assert_eq!(view.offset, 5);
    }

    #[test]
    fn test_settle_clamps_to_count() {
        let mut view = PaneView {
            selected: 80,
            offset: 75,
            height: 10,
            reported: None,
        };
        view.settle(20);
        assert_eq!(view.selected, 19);
        assert_eq!(view.offset, 19);
    }

    #[test]
    fn test_layout_heights() {
        let layout = ScreenLayout::new(Rect::new(0, 0, 100, 30), false);
        assert_eq!(layout.list_height(Side::Left), 25);
        assert!(layout.log.is_none());

        let layout = ScreenLayout::new(Rect::new(0, 0, 100, 30), true);
        assert_eq!(layout.list_height(Side::Right), 18);
    }
}
