use std::collections::HashMap;
use std::io;
use std::sync::OnceLock;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Terminal;

use runlens_core::actions::{ConsoleAction, FeedAction, UserAction};
use runlens_core::config::{Config, ReviewConfig};
use runlens_core::connection::HealthProbe;
use runlens_core::poll_state::{BackoffSchedule, PollPhase};
use runlens_core::records::{Availability, RunRecord};
use runlens_core::reducer::{reduce, ConsoleEffect};
use runlens_core::state::{ConsoleState, ConsoleTab, DetailPane, LogLevel, RunDetail, RunScope};
use runlens_core::timeformat::{format_timestamp, PLACEHOLDER};
use runlens_feed::{
    load_bundle, probe_health, FeedClient, Observation, ObservationEvent, PollingController,
    RunQuery,
};

use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

use crate::report::{self, Tone};

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

const DIFF_THEME: &str = "base16-ocean.dark";
const RECENT_ERRORS_SHOWN: usize = 3;
const PROPOSALS_SHOWN: usize = 10;
const NOTES_SHOWN: usize = 5;
const STALE_FILES_SHOWN: usize = 10;
const TOUCHED_FILES_SHOWN: usize = 30;
const FILE_READS_SHOWN: usize = 20;
const EXTENSIONS_SHOWN: usize = 8;
const SCROLL_STEP: u16 = 10;

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn get_theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

pub fn run(
    config: Config,
    client: Arc<dyn FeedClient>,
    source: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = ConsoleState::new(&config);
    let mut workers = Workers::new(client, &config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!(source = %source, "console started");
    let result = run_app(&mut terminal, &mut state, &mut workers, &source);
    workers.shutdown();
    result.map_err(|e| e.into())
}

/// Background fetch threads and per-run observation workers. Every result
/// comes back through one channel as a [`FeedAction`].
struct Workers {
    client: Arc<dyn FeedClient>,
    tx: mpsc::Sender<FeedAction>,
    rx: mpsc::Receiver<FeedAction>,
    schedule: BackoffSchedule,
    tick: Duration,
    runs_limit: usize,
    replay_limit: usize,
    probe_pending: bool,
    next_probe: Instant,
    active: HashMap<String, Observation>,
    /// Cancelled workers that may still be finishing a fetch.
    stopping: Vec<Observation>,
    /// Controllers of stopped observations, kept with their trace cursor.
    parked: HashMap<String, PollingController>,
    /// Resumes waiting for a stopping worker to hand back its controller,
    /// with the trace count the view held when asked.
    pending: HashMap<String, usize>,
}

impl Workers {
    fn new(client: Arc<dyn FeedClient>, config: &Config) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            client,
            tx,
            rx,
            schedule: config.backoff_schedule(),
            tick: config.tick(),
            runs_limit: config.console.runs_limit,
            replay_limit: config.console.replay_limit,
            probe_pending: false,
            next_probe: Instant::now(),
            active: HashMap::new(),
            stopping: Vec::new(),
            parked: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    fn spawn_fetch<F>(&self, fetch: F)
    where
        F: FnOnce(&dyn FeedClient) -> FeedAction + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(fetch(client.as_ref()));
        });
    }

    fn probe_due(&self, now: Instant) -> bool {
        !self.probe_pending && now >= self.next_probe
    }

    fn probe_finished(&mut self, retry_in: Duration) {
        self.probe_pending = false;
        self.next_probe = Instant::now() + retry_in;
    }

    fn apply(&mut self, effect: ConsoleEffect) {
        match effect {
            ConsoleEffect::RequestFrame | ConsoleEffect::Quit => {}
            ConsoleEffect::ProbeHealth => {
                if self.probe_pending {
                    return;
                }
                self.probe_pending = true;
                self.spawn_fetch(|client| {
                    let (probe, detail) = probe_health(client);
                    let summary = match probe {
                        HealthProbe::Healthy => client.health_summary().ok(),
                        _ => None,
                    };
                    FeedAction::HealthProbed {
                        probe,
                        summary,
                        detail,
                    }
                });
            }
            ConsoleEffect::FetchRuns(scope) => {
                let limit = match scope {
                    RunScope::Console => self.runs_limit,
                    RunScope::Replay => self.replay_limit,
                };
                self.spawn_fetch(move |client| match client.runs_list(&RunQuery::limit(limit)) {
                    Ok(runs) => FeedAction::RunsLoaded { scope, runs },
                    Err(err) => FeedAction::RunsFailed {
                        scope,
                        message: err.to_string(),
                    },
                });
            }
            ConsoleEffect::FetchStats => {
                self.spawn_fetch(|client| FeedAction::StatsLoaded {
                    runs: client.runs_stats().ok(),
                    workspace: client.workspace_stats().ok(),
                });
            }
            ConsoleEffect::LoadRun(run_id) => {
                self.spawn_fetch(move |client| match load_bundle(client, &run_id) {
                    Ok(bundle) => FeedAction::DetailLoaded(Box::new(bundle)),
                    Err(err) => FeedAction::DetailFailed {
                        run_id,
                        message: err.to_string(),
                    },
                });
            }
            ConsoleEffect::SubmitReview { run_id, decision } => {
                self.spawn_fetch(move |client| {
                    match client.review_submit(&run_id, decision, None) {
                        Ok(()) => FeedAction::ReviewSubmitted { run_id, decision },
                        Err(err) => FeedAction::ReviewFailed {
                            run_id,
                            message: err.to_string(),
                        },
                    }
                });
            }
            ConsoleEffect::ExecuteRun(run_id) => {
                self.spawn_fetch(move |client| match client.execute_run(&run_id) {
                    Ok(accepted) => FeedAction::ExecuteAccepted {
                        run_id,
                        job_id: accepted.job_id,
                    },
                    Err(err) => FeedAction::ExecuteFailed {
                        run_id,
                        message: err.to_string(),
                    },
                });
            }
            ConsoleEffect::StartObservation {
                run_id,
                known_traces,
            } => self.start_observation(run_id, known_traces),
            ConsoleEffect::StopObservation(run_id) => {
                self.pending.remove(&run_id);
                if let Some(observation) = self.active.remove(&run_id) {
                    observation.cancel();
                    self.stopping.push(observation);
                }
            }
            ConsoleEffect::CopyToClipboard(text) => {
                if let Ok(mut clipboard) = arboard::Clipboard::new() {
                    let _ = clipboard.set_text(text);
                }
            }
        }
    }

    /// Starts or resumes observing `run_id`. A worker for the same run that is
    /// still stopping is never joined here; the resume waits for [`Self::reap`].
    fn start_observation(&mut self, run_id: String, known_traces: usize) {
        self.reap();
        if self.active.contains_key(&run_id) {
            return;
        }
        if self.is_stopping(&run_id) {
            self.pending.insert(run_id, known_traces);
            return;
        }
        self.launch(run_id, known_traces);
    }

    fn is_stopping(&self, run_id: &str) -> bool {
        self.stopping
            .iter()
            .any(|observation| observation.run_id() == run_id)
    }

    fn launch(&mut self, run_id: String, known_traces: usize) {
        let controller = match self.parked.remove(&run_id) {
            Some(mut controller) if controller.phase() != PollPhase::Terminal => {
                controller.skip_to(known_traces);
                controller
            }
            _ => PollingController::resume(&run_id, known_traces, self.schedule),
        };

        let tx = self.tx.clone();
        let observation = Observation::spawn(
            Arc::clone(&self.client),
            controller,
            self.tick,
            move |event| {
                for action in forward(event) {
                    let _ = tx.send(action);
                }
            },
        );
        self.active.insert(run_id, observation);
    }

    /// Joins workers that have exited. Stopped ones are parked for reuse and
    /// deferred resumes start once their run has no stopping worker left.
    fn reap(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.stopping)
            .into_iter()
            .partition(Observation::is_finished);
        self.stopping = running;
        for observation in done {
            let run_id = observation.run_id().to_string();
            if let Some(controller) = observation.join() {
                self.parked.insert(run_id, controller);
            }
        }

        let finished: Vec<String> = self
            .active
            .iter()
            .filter(|(_, observation)| observation.is_finished())
            .map(|(run_id, _)| run_id.clone())
            .collect();
        for run_id in finished {
            if let Some(observation) = self.active.remove(&run_id) {
                let _ = observation.join();
            }
        }

        let ready: Vec<String> = self
            .pending
            .keys()
            .filter(|run_id| !self.is_stopping(run_id))
            .cloned()
            .collect();
        for run_id in ready {
            if let Some(known_traces) = self.pending.remove(&run_id) {
                self.launch(run_id, known_traces);
            }
        }
    }

    fn shutdown(&mut self) {
        for observation in self.active.values() {
            observation.cancel();
        }
    }
}

fn forward(event: ObservationEvent) -> Vec<FeedAction> {
    match event {
        ObservationEvent::Progress(update) => {
            let mut actions = Vec::new();
            if !update.new_traces.is_empty() {
                actions.push(FeedAction::TracesAppended {
                    run_id: update.run_id.clone(),
                    start: update.start,
                    traces: update.new_traces,
                });
            }
            actions.push(FeedAction::JobStatusChanged {
                run_id: update.run_id,
                job_id: update.job_id,
                status: update.status,
            });
            actions
        }
        ObservationEvent::Finished { run_id, status } => {
            vec![FeedAction::ObservationEnded { run_id, status }]
        }
    }
}

/// Per-frame view state the reducer does not track.
struct ViewState<'a> {
    source: &'a str,
    detail_scroll: u16,
}

enum KeyOutcome {
    Action(UserAction),
    ScrollDown,
    ScrollUp,
    ScrollTop,
    Ignored,
}

fn map_key(key: KeyEvent) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyOutcome::Action(UserAction::Quit);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyOutcome::Action(UserAction::Quit),
        KeyCode::Tab => KeyOutcome::Action(UserAction::NextTab),
        KeyCode::Char('j') | KeyCode::Down => KeyOutcome::Action(UserAction::SelectNext),
        KeyCode::Char('k') | KeyCode::Up => KeyOutcome::Action(UserAction::SelectPrev),
        KeyCode::Enter => KeyOutcome::Action(UserAction::OpenSelected),
        KeyCode::Char('r') => KeyOutcome::Action(UserAction::Refresh),
        KeyCode::Char('a') => KeyOutcome::Action(UserAction::Approve),
        KeyCode::Char('x') => KeyOutcome::Action(UserAction::Reject),
        KeyCode::Char('e') => KeyOutcome::Action(UserAction::Execute),
        KeyCode::Char('c') => KeyOutcome::Action(UserAction::CopyRunId),
        KeyCode::PageDown => KeyOutcome::ScrollDown,
        KeyCode::PageUp => KeyOutcome::ScrollUp,
        KeyCode::Home => KeyOutcome::ScrollTop,
        _ => KeyOutcome::Ignored,
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut ConsoleState,
    workers: &mut Workers,
    source: &str,
) -> io::Result<()> {
    let mut view = ViewState {
        source,
        detail_scroll: 0,
    };

    loop {
        // Results from background fetches and observation workers
        while let Ok(action) = workers.rx.try_recv() {
            let probed = matches!(action, FeedAction::HealthProbed { .. });
            let effects = reduce(state, ConsoleAction::Feed(action));
            if probed {
                workers.probe_finished(state.connection.interval());
            }
            for effect in effects {
                workers.apply(effect);
            }
        }

        workers.reap();
        if workers.probe_due(Instant::now()) {
            workers.apply(ConsoleEffect::ProbeHealth);
        }

        terminal.draw(|f| ui(f, state, &view))?;

        if event::poll(Duration::from_millis(16))? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let action = match map_key(key) {
                KeyOutcome::Action(action) => action,
                KeyOutcome::ScrollDown => {
                    view.detail_scroll = view.detail_scroll.saturating_add(SCROLL_STEP);
                    continue;
                }
                KeyOutcome::ScrollUp => {
                    view.detail_scroll = view.detail_scroll.saturating_sub(SCROLL_STEP);
                    continue;
                }
                KeyOutcome::ScrollTop => {
                    view.detail_scroll = 0;
                    continue;
                }
                KeyOutcome::Ignored => continue,
            };
            if action == UserAction::OpenSelected {
                view.detail_scroll = 0;
            }
            for effect in reduce(state, ConsoleAction::User(action)) {
                if effect == ConsoleEffect::Quit {
                    return Ok(());
                }
                workers.apply(effect);
            }
        }
    }
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    accent_alt: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    panel_bg: Color,
    selected_bg: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Rgb(58, 169, 159),
    accent_alt: Color::LightBlue,
    success: Color::Green,
    warning: Color::Yellow,
    danger: Color::Red,
    muted: Color::DarkGray,
    border: Color::Gray,
    panel_bg: Color::Black,
    selected_bg: Color::Rgb(18, 28, 42),
};

fn tone_style(tone: Tone, palette: UiPalette) -> Style {
    match tone {
        Tone::Plain => Style::default(),
        Tone::Muted => Style::default().fg(palette.muted),
        Tone::Info => Style::default().fg(palette.accent),
        Tone::Good => Style::default().fg(palette.success),
        Tone::Warn => Style::default().fg(palette.warning),
        Tone::Bad => Style::default().fg(palette.danger),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn or_placeholder(value: Option<&str>) -> &str {
    value.filter(|value| !value.is_empty()).unwrap_or(PLACEHOLDER)
}

fn ui(f: &mut ratatui::Frame, state: &ConsoleState, view: &ViewState) {
    let palette = PALETTE;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Action bar
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    // Header
    let link = if state.connection.connected() {
        Span::styled("connected", Style::default().fg(palette.success))
    } else {
        Span::styled("disconnected", Style::default().fg(palette.danger))
    };
    let mut header_spans = vec![
        Span::styled(
            "Runlens",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", Style::default().fg(palette.muted)),
        Span::raw(view.source.to_string()),
        Span::styled(" | ", Style::default().fg(palette.muted)),
        link,
    ];
    if let Some(run_id) = &state.observing {
        header_spans.push(Span::styled(" | ", Style::default().fg(palette.muted)));
        header_spans.push(Span::styled(
            format!("observing {run_id}"),
            Style::default().fg(palette.warning),
        ));
    }
    let header = Paragraph::new(Line::from(header_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border)),
    );
    f.render_widget(header, chunks[0]);

    // Tabs
    let tabs_order = [ConsoleTab::Console, ConsoleTab::Replay];
    let titles: Vec<Line> = tabs_order.iter().map(|t| Line::from(t.label())).collect();
    let selected_tab_index = tabs_order
        .iter()
        .position(|t| *t == state.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border))
                .title("Views"),
        )
        .select(selected_tab_index)
        .highlight_style(
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[1]);

    match state.tab {
        ConsoleTab::Console => render_console(f, chunks[2], state, view, palette),
        ConsoleTab::Replay => render_replay(f, chunks[2], state, view, palette),
    }

    render_action_bar(f, chunks[3], state, palette);
    render_footer(f, chunks[4], state, palette);
}

fn panel(title: &str, palette: UiPalette) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg))
        .border_style(Style::default().fg(palette.border))
        .title(title.to_string())
}

fn render_console(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &ConsoleState,
    view: &ViewState,
    palette: UiPalette,
) {
    if !state.connection.connected() && state.connection.refusals() > 0 {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "━━━ DISCONNECTED ━━━",
                Style::default()
                    .fg(palette.danger)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Cannot reach {}", view.source)),
            Line::from(Span::styled(
                format!("Retrying every {}s", state.connection.interval().as_secs()),
                Style::default().fg(palette.muted),
            )),
        ];
        let p = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(panel("Console", palette).border_style(Style::default().fg(palette.danger)));
        f.render_widget(p, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(0)])
        .split(columns[0]);

    let health = Paragraph::new(health_lines(state, palette))
        .block(panel("Health", palette))
        .wrap(Wrap { trim: true });
    f.render_widget(health, left[0]);

    let stats = Paragraph::new(stats_lines(state, palette))
        .block(panel("Statistics", palette))
        .wrap(Wrap { trim: true });
    f.render_widget(stats, left[1]);

    let width = columns[1].width.saturating_sub(2) as usize;
    let runs = Paragraph::new(recent_run_lines(state, width, palette))
        .block(panel("Recent Runs", palette));
    f.render_widget(runs, columns[1]);
}

fn health_lines(state: &ConsoleState, palette: UiPalette) -> Vec<Line<'static>> {
    if !state.connection.connected() {
        return vec![Line::from(Span::styled(
            "Waiting for connection...",
            Style::default().fg(palette.muted),
        ))];
    }
    let mut lines = vec![Line::from(vec![
        Span::raw("Status: "),
        Span::styled("Connected", Style::default().fg(palette.success)),
    ])];
    let Some(health) = &state.health else {
        lines.push(Line::from(Span::styled(
            "Health summary unavailable",
            Style::default().fg(palette.muted),
        )));
        return lines;
    };
    if let Some(rate) = health.success_rate {
        lines.push(Line::from(vec![
            Span::raw("Success rate: "),
            Span::styled(
                format!("{:.0}%", rate * 100.0),
                tone_style(report::success_rate_tone(rate), palette),
            ),
        ]));
    }
    lines.push(Line::from(format!(
        "Recent errors: {}",
        health.recent_errors.len()
    )));
    let (shown, _) = report::limited(&health.recent_errors, RECENT_ERRORS_SHOWN);
    for error in shown {
        lines.push(Line::from(Span::styled(
            format!("  • {}", report::error_summary(error)),
            Style::default().fg(palette.danger),
        )));
    }
    if let Some(total) = health.total_runs {
        lines.push(Line::from(format!("Total runs: {total}")));
    }
    lines
}

fn stats_lines(state: &ConsoleState, palette: UiPalette) -> Vec<Line<'static>> {
    let muted = Style::default().fg(palette.muted);
    let heading = Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::BOLD);
    if state.run_stats.is_none() && state.workspace_stats.is_none() {
        return vec![Line::from(Span::styled("No statistics available", muted))];
    }

    let mut lines = Vec::new();
    if let Some(stats) = &state.run_stats {
        if !stats.by_intent.is_empty() {
            lines.push(Line::from(Span::styled("Runs by intent:", heading)));
            for (intent, count) in &stats.by_intent {
                lines.push(Line::from(format!("  {intent}: {count}")));
            }
        }
        if !stats.by_model.is_empty() {
            lines.push(Line::from(Span::styled("Runs by model:", heading)));
            for (model, count) in &stats.by_model {
                lines.push(Line::from(format!("  {model}: {count}")));
            }
        }
        if let Some(total) = stats.total {
            lines.push(Line::from(format!("Total runs: {total}")));
        }
    }
    if let Some(workspace) = &state.workspace_stats {
        lines.push(Line::from(""));
        if let Some(count) = workspace.workspaces() {
            lines.push(Line::from(format!("Workspaces: {count}")));
        }
        if let Some(files) = workspace.total_files {
            lines.push(Line::from(format!("Total files: {files}")));
        }
        let extensions = workspace.top_extensions(EXTENSIONS_SHOWN);
        if !extensions.is_empty() {
            lines.push(Line::from(Span::styled("Extensions:", heading)));
            for (extension, count) in extensions {
                lines.push(Line::from(format!("  {extension}: {count}")));
            }
        }
    }
    lines
}

fn recent_run_lines(state: &ConsoleState, width: usize, palette: UiPalette) -> Vec<Line<'static>> {
    let muted = Style::default().fg(palette.muted);
    if !state.connection.connected() {
        return vec![Line::from(Span::styled("Waiting for connection...", muted))];
    }
    if let Some(error) = &state.recent_runs_error {
        return vec![Line::from(Span::styled(
            format!("Failed to load runs: {error}"),
            Style::default().fg(palette.danger),
        ))];
    }
    if state.recent_runs.is_empty() {
        return vec![Line::from(Span::styled("No runs recorded", muted))];
    }

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{:<8} {:<12} {:<16} {}", "STATUS", "INTENT", "WORKSPACE", "ID"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled("─".repeat(width), muted)),
    ];
    for run in &state.recent_runs {
        lines.push(recent_run_row(run, palette));
    }
    lines
}

fn recent_run_row(run: &RunRecord, palette: UiPalette) -> Line<'static> {
    let (status, tone) = report::run_indicator(run);
    let intent = truncate(or_placeholder(run.intent.as_deref()), 12);
    let workspace = truncate(or_placeholder(run.workspace.as_deref()), 16);
    let mut spans = vec![
        Span::styled(format!("{status:<8} "), tone_style(tone, palette)),
        Span::raw(format!(
            "{intent:<12} {workspace:<16} {}",
            or_placeholder(run.run_id())
        )),
    ];
    if let Some(model) = run.model_name() {
        spans.push(Span::styled(
            format!("  ({model})"),
            Style::default().fg(palette.muted),
        ));
    }
    Line::from(spans)
}

fn render_replay(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &ConsoleState,
    view: &ViewState,
    palette: UiPalette,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)])
        .split(area);

    if let Some(error) = &state.replay_runs_error {
        let p = Paragraph::new(Span::styled(
            format!("Failed to load runs: {error}"),
            Style::default().fg(palette.danger),
        ))
        .block(panel("Runs", palette))
        .wrap(Wrap { trim: true });
        f.render_widget(p, columns[0]);
    } else if state.replay_runs.is_empty() {
        let message = if state.connection.connected() {
            "No runs recorded"
        } else {
            "Waiting for connection..."
        };
        let p = Paragraph::new(Span::styled(message, Style::default().fg(palette.muted)))
            .block(panel("Runs", palette));
        f.render_widget(p, columns[0]);
    } else {
        let items: Vec<ListItem> = state
            .replay_runs
            .iter()
            .map(|run| {
                let (status, tone) = report::run_indicator(run);
                let intent = truncate(or_placeholder(run.intent.as_deref()), 10);
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{status:<4}"), tone_style(tone, palette)),
                    Span::raw(format!("{intent:<10} {}", or_placeholder(run.run_id()))),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(panel("Runs", palette))
            .highlight_style(
                Style::default()
                    .bg(palette.selected_bg)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        f.render_stateful_widget(list, columns[0], &mut list_state);
    }

    let title = match state.detail.run_id() {
        Some(run_id) => format!("Run {run_id}"),
        None => "Run".to_string(),
    };
    let lines = match &state.detail {
        DetailPane::Empty => vec![Line::from(Span::styled(
            "Select a run to inspect",
            Style::default().fg(palette.muted),
        ))],
        DetailPane::Loading { run_id } => vec![Line::from(Span::styled(
            format!("Loading {run_id}..."),
            Style::default().fg(palette.muted),
        ))],
        DetailPane::Failed { message, .. } => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(palette.danger),
        ))],
        DetailPane::Loaded(detail) => detail_lines(detail, &state.review_config, palette),
    };
    let p = Paragraph::new(lines)
        .block(panel(&title, palette))
        .wrap(Wrap { trim: false })
        .scroll((view.detail_scroll, 0));
    f.render_widget(p, columns[1]);
}

fn section(lines: &mut Vec<Line<'static>>, title: &str, palette: UiPalette) {
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        format!("━━━ {title} ━━━"),
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
    )));
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(format!("  {label}: {}", value.into()))
}

fn bullet(text: impl Into<String>, style: Style) -> Line<'static> {
    Line::from(Span::styled(format!("    • {}", text.into()), style))
}

fn detail_lines(detail: &RunDetail, config: &ReviewConfig, palette: UiPalette) -> Vec<Line<'static>> {
    let run = &detail.run;
    let mut lines = Vec::new();

    section(&mut lines, "IDENTITY", palette);
    lines.push(field("Run ID", detail.run_id.clone()));
    lines.push(field("Intent", or_placeholder(run.intent.as_deref())));
    lines.push(field("Task", or_placeholder(run.task.as_deref())));
    lines.push(field(
        "Workspace",
        run.workspace.as_deref().unwrap_or("(none)"),
    ));
    lines.push(field("Timestamp", format_timestamp(run.timestamp.as_deref())));
    let (success, tone) = match run.success {
        Some(true) => ("true", Tone::Good),
        Some(false) => ("false", Tone::Bad),
        None => (PLACEHOLDER, Tone::Muted),
    };
    lines.push(Line::from(vec![
        Span::raw("  Success: "),
        Span::styled(success, tone_style(tone, palette)),
    ]));

    if run.model_name().is_some()
        || run.model_tier.is_some()
        || run.speculative.is_some()
        || run.escalated_from.is_some()
    {
        section(&mut lines, "MODEL SELECTION", palette);
        if let Some(model) = run.model_name() {
            lines.push(field("Model", model));
        }
        if let Some(tier) = &run.model_tier {
            lines.push(field("Tier", tier.clone()));
        }
        if let Some(speculative) = run.speculative {
            lines.push(field("Speculative", speculative.to_string()));
        }
        if let Some(escalated) = run.escalated_from.as_deref().filter(|e| !e.is_empty()) {
            lines.push(field("Escalated from", escalated));
        }
    }

    push_validation(&mut lines, detail, palette);

    if !run.why.is_empty() {
        section(&mut lines, "WHY RECORD", palette);
        for (key, value) in &run.why {
            lines.push(field(key, value.clone()));
        }
    }

    section(&mut lines, "REVIEW GATE", palette);
    match &detail.review {
        Availability::Available(review) => {
            lines.push(field("State", or_placeholder(review.state_label())));
            if let Some(reviewer) = review.reviewer_name() {
                lines.push(field("Reviewer", reviewer));
            }
            if let Some(comment) = review.comment.as_deref().filter(|c| !c.is_empty()) {
                lines.push(field("Comment", comment));
            }
            if review.reviewed_at.is_some() {
                lines.push(field(
                    "Reviewed",
                    format_timestamp(review.reviewed_at.as_deref()),
                ));
            }
        }
        Availability::Missing => lines.push(Line::from(Span::styled(
            "  Review endpoint not available",
            Style::default().fg(palette.muted),
        ))),
        Availability::Failed(message) => lines.push(Line::from(Span::styled(
            format!("  Review unavailable: {message}"),
            Style::default().fg(palette.danger),
        ))),
    }

    if !detail.proposals.is_empty() {
        push_proposal_review(&mut lines, detail, config, palette);
        section(&mut lines, "PROPOSED CHANGES", palette);
        if detail.diff.is_empty() {
            lines.push(Line::from(Span::styled(
                "  (no changes to preview)",
                Style::default().fg(palette.muted),
            )));
        } else {
            lines.extend(highlight_diff(&detail.diff, palette));
        }
    }

    if let Some(staleness) = detail.staleness.available() {
        section(&mut lines, "STALENESS", palette);
        let tone = if staleness.potentially_stale {
            Tone::Bad
        } else {
            Tone::Good
        };
        lines.push(Line::from(vec![
            Span::raw("  Potentially stale: "),
            Span::styled(
                staleness.potentially_stale.to_string(),
                tone_style(tone, palette),
            ),
        ]));
        lines.push(field("Stale files", staleness.stale_count.to_string()));
        lines.push(field("Fresh files", staleness.fresh_count.to_string()));
        let (shown, _) = report::limited(&staleness.stale_files, STALE_FILES_SHOWN);
        for path in shown {
            lines.push(bullet(path.clone(), Style::default().fg(palette.warning)));
        }
    }

    if let Some(files) = detail.files.available().filter(|files| !files.files.is_empty()) {
        section(&mut lines, "FILES TOUCHED", palette);
        let (shown, _) = report::limited(&files.files, TOUCHED_FILES_SHOWN);
        for path in shown {
            lines.push(bullet(path.clone(), Style::default()));
        }
    }

    if !run.file_reads.is_empty() {
        section(&mut lines, "FILE READS", palette);
        let (shown, _) = report::limited(&run.file_reads, FILE_READS_SHOWN);
        for read in shown {
            let at = read
                .timestamp
                .as_deref()
                .map(|ts| format!("  ({})", format_timestamp(Some(ts))))
                .unwrap_or_default();
            lines.push(bullet(format!("{}{at}", read.path), Style::default()));
        }
    }

    push_execution(&mut lines, detail, palette);
    lines
}

fn push_validation(lines: &mut Vec<Line<'static>>, detail: &RunDetail, palette: UiPalette) {
    let run = &detail.run;
    if !run.output.is_object() {
        return;
    }
    section(lines, "VALIDATION & CLASSIFICATION", palette);
    if let Some(reason) = run.output_text("reason") {
        lines.push(field("Reason", reason));
    }
    if let Some(details) = run.output_text("details") {
        lines.push(field("Details", details));
    }
    if let Some(classification) = run.output_text("classification").filter(|c| !c.is_empty()) {
        lines.push(field("Classification", classification));
    }
    if !detail.proposals.is_empty() {
        lines.push(field("Proposals", detail.proposals.len().to_string()));
        let (shown, _) = report::limited(&detail.proposals, PROPOSALS_SHOWN);
        for (index, proposal) in shown.iter().enumerate() {
            lines.push(Line::from(format!(
                "    [{}] {} → {}",
                index + 1,
                proposal.action_label(),
                proposal.target().unwrap_or("?")
            )));
        }
    }
    for (label, key) in [("Assumptions", "assumptions"), ("Risks", "risks")] {
        let notes = run.output_list(key);
        if notes.is_empty() {
            continue;
        }
        lines.push(field(label, notes.len().to_string()));
        let (shown, _) = report::limited(&notes, NOTES_SHOWN);
        for note in shown {
            lines.push(bullet(note.clone(), Style::default()));
        }
    }
}

fn push_proposal_review(
    lines: &mut Vec<Line<'static>>,
    detail: &RunDetail,
    config: &ReviewConfig,
    palette: UiPalette,
) {
    section(lines, "PROPOSAL REVIEW", palette);
    let risk = &detail.risk;
    lines.push(Line::from(Span::styled(
        format!("  [{} RISK]", risk.level.label()),
        tone_style(report::risk_tone(risk.level), palette).add_modifier(Modifier::BOLD),
    )));
    if !risk.reasons.is_empty() {
        lines.push(Line::from("  Risk Factors:"));
        let (shown, _) = report::limited(&risk.reasons, config.max_reasons_shown);
        for reason in shown {
            lines.push(bullet(reason.clone(), Style::default().fg(palette.warning)));
        }
    }
    lines.push(Line::from(format!(
        "  {}",
        report::metrics_line(&detail.summary)
    )));
    let files = &detail.summary.affected_files;
    if !files.is_empty() {
        lines.push(Line::from("  Affected Files:"));
        let (shown, remaining) = report::limited(files, config.max_files_shown);
        for path in shown {
            lines.push(bullet(path.clone(), Style::default()));
        }
        if remaining > 0 {
            lines.push(Line::from(Span::styled(
                format!("    ... and {remaining} more"),
                Style::default().fg(palette.muted),
            )));
        }
    }
}

/// Colours `+`/`-` markers and highlights the rest by the file's syntax.
fn highlight_diff(diff: &str, palette: UiPalette) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let ts = get_theme_set();
    let theme = &ts.themes[DIFF_THEME];
    let mut h = HighlightLines::new(ps.find_syntax_plain_text(), theme);
    let mut lines = Vec::new();

    for line in diff.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            let syntax = ps
                .find_syntax_for_file(path)
                .unwrap_or(None)
                .unwrap_or_else(|| ps.find_syntax_plain_text());
            h = HighlightLines::new(syntax, theme);
        }
        if line.starts_with("--- a/") || line.starts_with("+++ b/") {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default()
                    .add_modifier(Modifier::BOLD)
                    .fg(palette.accent_alt),
            )));
            continue;
        }
        let (prefix, content, prefix_color) = if let Some(rest) = line.strip_prefix("+ ") {
            ("+ ", rest, palette.success)
        } else if let Some(rest) = line.strip_prefix("- ") {
            ("- ", rest, palette.danger)
        } else {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(palette.muted),
            )));
            continue;
        };

        let ranges: Vec<(syntect::highlighting::Style, &str)> =
            h.highlight_line(content, ps).unwrap_or_default();
        let mut spans = vec![Span::styled(
            prefix.to_string(),
            Style::default().fg(prefix_color),
        )];
        for (style, text) in ranges {
            let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
            spans.push(Span::styled(text.to_string(), Style::default().fg(fg)));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn push_execution(lines: &mut Vec<Line<'static>>, detail: &RunDetail, palette: UiPalette) {
    section(lines, "EXECUTION STATE", palette);
    let mut spans = vec![Span::raw("  ")];
    for (index, (label, tone)) in report::timeline(detail).into_iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(" → ", Style::default().fg(palette.muted)));
        }
        spans.push(Span::styled(
            label,
            tone_style(tone, palette).add_modifier(Modifier::BOLD),
        ));
    }
    lines.push(Line::from(spans));

    let history = report::history(detail);
    if !history.is_empty() {
        section(lines, "EXECUTION HISTORY", palette);
        for (label, value, tone) in history {
            lines.push(Line::from(vec![
                Span::raw(format!("  {label}: ")),
                Span::styled(value, tone_style(tone, palette)),
            ]));
        }
    }

    section(lines, "EXECUTION TRACE", palette);
    if detail.traces.is_empty() {
        let message = if detail.has_live_job() {
            "  (waiting for execution...)"
        } else {
            "  No tool traces recorded"
        };
        lines.push(Line::from(Span::styled(
            message,
            Style::default().fg(palette.muted),
        )));
        return;
    }
    for trace in &detail.traces {
        let (headline, tone) = report::trace_headline(trace);
        lines.push(Line::from(Span::styled(
            format!("  {headline}"),
            tone_style(tone, palette),
        )));
        for (text, tone) in report::trace_details(trace) {
            lines.push(Line::from(Span::styled(
                format!("      {text}"),
                tone_style(tone, palette),
            )));
        }
    }
}

fn render_action_bar(f: &mut ratatui::Frame, area: Rect, state: &ConsoleState, palette: UiPalette) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(palette.accent));
    let hint = |h: &'static str| Span::styled(h, Style::default().fg(palette.muted));
    let mut spans = vec![key("Tab"), hint(" views "), key("r"), hint(" refresh ")];
    if state.tab == ConsoleTab::Replay {
        spans.extend([
            key("j/k"),
            hint(" select "),
            key("Enter"),
            hint(" open "),
            key("a"),
            hint(" approve "),
            key("x"),
            hint(" reject "),
            key("e"),
            hint(" execute "),
            key("PgUp/PgDn"),
            hint(" scroll "),
        ]);
    }
    spans.extend([
        key("c"),
        hint(" copy id "),
        Span::styled("q", Style::default().fg(palette.warning)),
        hint(" quit"),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .style(Style::default().bg(palette.panel_bg))
        .title("Keys");
    let p = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

fn render_footer(f: &mut ratatui::Frame, area: Rect, state: &ConsoleState, palette: UiPalette) {
    let line = if let Some(notice) = &state.notice {
        Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(palette.warning),
        ))
    } else if let Some(entry) = state.logs.latest() {
        let color = match entry.level {
            LogLevel::Info => palette.muted,
            LogLevel::Warn => palette.warning,
            LogLevel::Error => palette.danger,
        };
        let scope = entry
            .run_id
            .as_deref()
            .map(|run_id| format!(" [{run_id}]"))
            .unwrap_or_default();
        Line::from(vec![
            Span::styled(
                format!("{}{scope} ", entry.level.label()),
                Style::default().fg(color),
            ),
            Span::raw(entry.message.clone()),
        ])
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(line), area);
}
