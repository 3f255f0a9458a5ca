//! Pane Selection Controller: the Repositories / Runs / Details state machine.
//!
//! The dashboard never talks to the network. Every data dependency is
//! returned as a [`Command`] carrying a [`Ticket`]; the host performs the
//! load and hands the result back through `apply_*`. A result whose ticket
//! is not the latest one issued is dropped, so late arrivals from an
//! abandoned selection can never overwrite the current one.
//!
//! All indices are clamped after every mutation: for a non-empty pane the
//! selection is in `0..len`, for an empty one it is 0.

use crate::context::{DashboardSnapshot, NavPayload, NavigationContext};
use crate::filter::FilterSession;
use crate::input::Action;
use crate::model::{
    format_duration, runs_of, RepositoryOverview, RepositoryRef, RunClass, RunSnapshot,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Window for the second `g` of the jump-to-top chord.
pub const CHORD_TIMEOUT: Duration = Duration::from_secs(1);
/// Runs whose Details cursor is remembered; the oldest entry goes first.
pub const DETAIL_MEMORY_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Repositories,
    Runs,
    Details,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Repositories, Pane::Runs, Pane::Details];

    pub fn next(self) -> Option<Pane> {
        match self {
            Pane::Repositories => Some(Pane::Runs),
            Pane::Runs => Some(Pane::Details),
            Pane::Details => None,
        }
    }

    pub fn prev(self) -> Option<Pane> {
        match self {
            Pane::Repositories => None,
            Pane::Runs => Some(Pane::Repositories),
            Pane::Details => Some(Pane::Runs),
        }
    }

    /// Forward with wrap-around.
    pub fn cycle(self) -> Pane {
        self.next().unwrap_or(Pane::Repositories)
    }

    pub fn title(self) -> &'static str {
        match self {
            Pane::Repositories => "Repositories",
            Pane::Runs => "Runs",
            Pane::Details => "Details",
        }
    }
}

// ── Details pane content ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailLine {
    Field { label: &'static str, value: String },
    /// Blank line between sections. The cursor never rests here.
    Separator,
}

impl DetailLine {
    pub fn is_blank(&self) -> bool {
        matches!(self, DetailLine::Separator)
    }

    pub fn text(&self) -> String {
        match self {
            DetailLine::Field { label, value } => format!("{label}: {value}"),
            DetailLine::Separator => String::new(),
        }
    }
}

fn field(label: &'static str, value: String) -> DetailLine {
    DetailLine::Field { label, value }
}

fn push_present(lines: &mut Vec<DetailLine>, label: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        lines.push(field(label, value.to_string()));
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Field list for the Details pane. Optional values appear only when
/// non-empty, so the length depends on the run.
pub fn detail_lines(run: &RunSnapshot) -> Vec<DetailLine> {
    let mut head = vec![field("Run", format!("#{}", run.id))];
    push_present(&mut head, "Title", run.title.as_deref());
    head.push(field("Status", run.status.label().to_string()));

    let mut repository = Vec::new();
    push_present(&mut repository, "Repository", run.repository.name.as_deref());
    if let Some(id) = run.repository.id {
        repository.push(field("Repository id", id.to_string()));
    }

    let mut times = vec![field("Created", format_timestamp(run.created_at))];
    if run.updated_at != run.created_at {
        times.push(field("Updated", format_timestamp(run.updated_at)));
    }
    if run.class() == RunClass::Terminal {
        let secs = run
            .updated_at
            .signed_duration_since(run.created_at)
            .num_seconds();
        times.push(field("Duration", format_duration(secs)));
    }

    let mut extra = Vec::new();
    push_present(&mut extra, "Created by", run.created_by.as_deref());
    push_present(&mut extra, "Message", run.message.as_deref());

    let mut lines = Vec::new();
    for section in [head, repository, times, extra] {
        if section.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(DetailLine::Separator);
        }
        lines.extend(section);
    }
    lines
}

/// Per-run Details cursor, kept for the whole session and bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailMemory {
    capacity: usize,
    order: VecDeque<u64>,
    lines: HashMap<u64, usize>,
}

impl Default for DetailMemory {
    fn default() -> Self {
        Self::with_capacity(DETAIL_MEMORY_CAPACITY)
    }
}

impl DetailMemory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            lines: HashMap::new(),
        }
    }

    pub fn remember(&mut self, run_id: u64, line: usize) {
        if self.lines.insert(run_id, line).is_some() {
            self.order.retain(|id| *id != run_id);
        }
        self.order.push_back(run_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.lines.remove(&oldest);
            }
        }
    }

    pub fn recall(&self, run_id: u64) -> Option<usize> {
        self.lines.get(&run_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub focus: Pane,
    pub repo_idx: usize,
    pub run_idx: usize,
    pub detail_idx: usize,
    pub detail_memory: DetailMemory,
}

/// Identifies one outstanding load: the view that asked and a per-view
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub view: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChord {
    pub token: u64,
    pub started: Instant,
}

/// Work the host must perform on the dashboard's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LoadOverview { ticket: Ticket, refresh: bool },
    LoadRuns { ticket: Ticket, repository: RepositoryRef },
    ScheduleChordTimeout { token: u64, after: Duration },
    /// Create form requested. The preselect and restore payloads are
    /// already in the navigation context.
    OpenCreateForm,
    Quit,
}

#[derive(Debug)]
struct ActiveFilter {
    pane: Pane,
    session: FilterSession,
}

// ── Index helpers ──

fn clamp(idx: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        idx.min(len - 1)
    }
}

fn wrap_step(idx: usize, len: usize, down: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let idx = clamp(idx, len);
    if down {
        (idx + 1) % len
    } else {
        (idx + len - 1) % len
    }
}

fn first_content(lines: &[DetailLine]) -> usize {
    lines.iter().position(|l| !l.is_blank()).unwrap_or(0)
}

fn last_content(lines: &[DetailLine]) -> usize {
    lines.iter().rposition(|l| !l.is_blank()).unwrap_or(0)
}

fn clamp_to_content(lines: &[DetailLine], idx: usize) -> usize {
    match lines.get(idx) {
        Some(line) if !line.is_blank() => idx,
        _ => first_content(lines),
    }
}

/// Next non-blank line in `down` direction, wrapping. At most one full
/// lap; stays put when there is nowhere else to go.
fn step_content(lines: &[DetailLine], idx: usize, down: bool) -> usize {
    let len = lines.len();
    let start = clamp(idx, len);
    let mut next = start;
    for _ in 0..len {
        next = wrap_step(next, len, down);
        if lines.get(next).is_some_and(|l| !l.is_blank()) {
            return next;
        }
    }
    start
}

pub struct Dashboard {
    view: u64,
    context: NavigationContext,
    nav: NavigationState,
    repositories: Vec<RepositoryOverview>,
    runs: Vec<RunSnapshot>,
    /// Repository the current `runs` belong to.
    runs_for: Option<RepositoryRef>,
    details: Vec<DetailLine>,
    filter: Option<ActiveFilter>,
    chord: Option<PendingChord>,
    next_seq: u64,
    next_token: u64,
    overview_ticket: Option<Ticket>,
    runs_ticket: Option<Ticket>,
    /// Selection targets carried over from a handoff; applied when the
    /// matching data shows up.
    pending_repo: Option<RepositoryRef>,
    pending_run: Option<u64>,
    /// Details cursor for the restored run, applied once that run is shown.
    pending_detail: Option<(u64, usize)>,
    needs_refresh: bool,
    viewport: (u16, u16),
}

impl Dashboard {
    /// Build the dashboard for view generation `view`, consuming the
    /// `DashboardRestore` and `RunCreated` handoffs and seeding the panes
    /// from whatever overview is already cached.
    pub fn new(view: u64, context: NavigationContext) -> Self {
        let mut dashboard = Self {
            view,
            context,
            nav: NavigationState::default(),
            repositories: Vec::new(),
            runs: Vec::new(),
            runs_for: None,
            details: Vec::new(),
            filter: None,
            chord: None,
            next_seq: 0,
            next_token: 0,
            overview_ticket: None,
            runs_ticket: None,
            pending_repo: None,
            pending_run: None,
            pending_detail: None,
            needs_refresh: false,
            viewport: (0, 0),
        };

        if let Some(snapshot) = dashboard.context.take_dashboard_restore() {
            dashboard.restore(snapshot);
        }
        if let Some((run_id, repository)) = dashboard.context.take_run_created() {
            let removed = dashboard.context.cache().invalidate_active();
            tracing::debug!("run {run_id} created in {repository}; dropped {removed} active runs");
            dashboard.needs_refresh = true;
            dashboard.pending_repo = Some(RepositoryRef::named(repository));
            dashboard.pending_run = Some(run_id);
            dashboard.pending_detail = None;
            dashboard.nav.focus = Pane::Runs;
        }
        dashboard.seed_from_cache();
        dashboard
    }

    /// Preselect `repository` when nothing else (restore, handoff) has.
    pub fn preselect(&mut self, repository: Option<String>) {
        if self.pending_repo.is_none() && repository.is_some() {
            self.pending_repo = repository.map(RepositoryRef::named);
            self.seed_from_cache();
        }
    }

    /// Initial load. Goes through the coordinator's cache check unless a
    /// handoff asked for a refresh.
    pub fn start(&mut self) -> Vec<Command> {
        let ticket = self.begin_overview_load();
        vec![Command::LoadOverview {
            ticket,
            refresh: self.needs_refresh,
        }]
    }

    fn restore(&mut self, snapshot: DashboardSnapshot) {
        tracing::debug!(
            "restoring dashboard: focus={:?} repo={:?} run={:?}",
            snapshot.focus,
            snapshot.repository,
            snapshot.run_id
        );
        self.nav = NavigationState {
            focus: snapshot.focus,
            repo_idx: snapshot.repo_idx,
            run_idx: snapshot.run_idx,
            detail_idx: snapshot.detail_idx,
            detail_memory: snapshot.detail_memory,
        };
        self.viewport = snapshot.viewport;
        self.pending_detail = snapshot.run_id.map(|id| {
            let idx = self.nav.detail_memory.recall(id).unwrap_or(snapshot.detail_idx);
            (id, idx)
        });
        self.pending_repo = snapshot.repository;
        self.pending_run = snapshot.run_id;
    }

    fn seed_from_cache(&mut self) {
        let cache = self.context.cache();
        let Some(overview) = cache.overview() else {
            return;
        };
        let all_runs = cache.runs();
        self.repositories = overview;
        let target = self.pending_repo.clone();
        self.nav.repo_idx = target
            .and_then(|repository| self.position_of_repository(&repository))
            .unwrap_or_else(|| clamp(self.nav.repo_idx, self.repositories.len()));
        if let Some(repository) = self.selected_repository_ref() {
            let runs = runs_of(&all_runs, &repository);
            self.install_runs(repository, runs, false);
        }
        self.settle_focus();
    }

    fn next_ticket(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket {
            view: self.view,
            seq: self.next_seq,
        }
    }

    pub fn begin_overview_load(&mut self) -> Ticket {
        let ticket = self.next_ticket();
        self.overview_ticket = Some(ticket);
        ticket
    }

    fn request_runs(&mut self) -> Option<Command> {
        let repository = self.selected_repository_ref()?;
        let ticket = self.next_ticket();
        self.runs_ticket = Some(ticket);
        Some(Command::LoadRuns { ticket, repository })
    }

    // ── Result delivery ──

    /// Apply a loaded overview. `ticket` is `None` for unsolicited
    /// background results, which yield to an in-flight foreground load.
    pub fn apply_overview(
        &mut self,
        ticket: Option<Ticket>,
        repositories: Vec<RepositoryOverview>,
    ) -> Vec<Command> {
        match ticket {
            Some(t) if self.overview_ticket == Some(t) => {
                self.overview_ticket = None;
                self.needs_refresh = false;
            }
            Some(t) => {
                tracing::debug!("discarding stale overview result {t:?}");
                return Vec::new();
            }
            None if self.overview_ticket.is_some() => {
                tracing::debug!("background overview ignored: foreground load in flight");
                return Vec::new();
            }
            None => {}
        }

        let previous = self.selected_repository_ref();
        let target = self.pending_repo.take().or(previous);
        self.repositories = repositories;
        self.nav.repo_idx = target
            .and_then(|repository| self.position_of_repository(&repository))
            .unwrap_or_else(|| clamp(self.nav.repo_idx, self.repositories.len()));

        if self.runs_for != self.selected_repository_ref() {
            self.clear_runs();
        }
        let commands: Vec<Command> = self.request_runs().into_iter().collect();
        if commands.is_empty() {
            self.runs_ticket = None;
        }
        self.settle_focus();
        commands
    }

    pub fn overview_failed(&mut self, ticket: Ticket) -> bool {
        if self.overview_ticket == Some(ticket) {
            self.overview_ticket = None;
            true
        } else {
            false
        }
    }

    /// Returns `false` when the result was stale and dropped.
    pub fn apply_runs(&mut self, ticket: Ticket, runs: Vec<RunSnapshot>) -> bool {
        if self.runs_ticket != Some(ticket) {
            tracing::debug!("discarding stale runs result {ticket:?}");
            return false;
        }
        self.runs_ticket = None;
        let Some(repository) = self.selected_repository_ref() else {
            return false;
        };
        self.install_runs(repository, runs, true);
        self.settle_focus();
        true
    }

    pub fn runs_failed(&mut self, ticket: Ticket) -> bool {
        if self.runs_ticket == Some(ticket) {
            self.runs_ticket = None;
            true
        } else {
            false
        }
    }

    /// Replace the Runs pane, keeping the selected run by id.
    fn install_runs(&mut self, repository: RepositoryRef, runs: Vec<RunSnapshot>, settled: bool) {
        let previous = if self.runs_for.as_ref() == Some(&repository) {
            self.selected_run().map(|r| r.id)
        } else {
            None
        };
        let target = self.pending_run.or(previous);
        self.runs = runs;
        self.runs_for = Some(repository);

        let found = target.and_then(|id| self.runs.iter().position(|r| r.id == id));
        if found.is_some() || (settled && self.overview_ticket.is_none()) {
            self.pending_run = None;
        }
        let before = self.nav.run_idx;
        self.nav.run_idx = found.unwrap_or_else(|| clamp(before, self.runs.len()));
        let selected = self.selected_run().map(|r| r.id);
        if selected != previous {
            self.nav.detail_idx = 0;
        }
        self.recompute_details();

        if let Some((id, idx)) = self.pending_detail {
            if selected == Some(id) {
                self.nav.detail_idx = clamp_to_content(&self.details, idx);
                self.pending_detail = None;
            } else if self.pending_run.is_none() {
                self.pending_detail = None;
            }
        }
    }

    fn clear_runs(&mut self) {
        self.runs.clear();
        self.runs_for = None;
        self.nav.run_idx = 0;
        self.nav.detail_idx = 0;
        self.details.clear();
    }

    fn recompute_details(&mut self) {
        self.details = self.selected_run().map(detail_lines).unwrap_or_default();
        self.nav.detail_idx = clamp_to_content(&self.details, self.nav.detail_idx);
    }

    /// Details focus with nothing to show falls back to Runs.
    fn settle_focus(&mut self) {
        if self.nav.focus == Pane::Details && self.selected_run().is_none() {
            self.nav.focus = Pane::Runs;
        }
    }

    // ── Input ──

    pub fn handle(&mut self, action: Action, now: Instant) -> Vec<Command> {
        if self.filter.is_some() {
            return self.handle_filter(action);
        }

        if let Some(chord) = self.chord.take() {
            if action == Action::JumpTopChord
                && now.saturating_duration_since(chord.started) <= CHORD_TIMEOUT
            {
                return self.jump_top();
            }
            // Anything else cancels the chord and is handled normally.
        }

        match action {
            Action::Quit => vec![Command::Quit],
            Action::MoveUp => self.move_selection(false),
            Action::MoveDown => self.move_selection(true),
            Action::Advance => match self.nav.focus.next() {
                Some(pane) => self.focus_pane(pane),
                None => Vec::new(),
            },
            Action::Retreat => match self.nav.focus.prev() {
                Some(pane) => self.focus_pane(pane),
                None => Vec::new(),
            },
            Action::CycleFocus => self.focus_pane(self.nav.focus.cycle()),
            Action::JumpTopChord => {
                self.next_token += 1;
                let token = self.next_token;
                self.chord = Some(PendingChord {
                    token,
                    started: now,
                });
                vec![Command::ScheduleChordTimeout {
                    token,
                    after: CHORD_TIMEOUT,
                }]
            }
            Action::JumpBottom => self.jump_bottom(),
            Action::StartFilter => {
                self.open_filter();
                Vec::new()
            }
            Action::NewRun => {
                if let Some(repository) = self.selected_repository_name() {
                    self.context.set(NavPayload::CreatePreselect { repository });
                }
                self.context
                    .set(NavPayload::DashboardRestore(self.snapshot()));
                vec![Command::OpenCreateForm]
            }
            Action::Refresh if self.overview_ticket.is_none() => {
                let ticket = self.begin_overview_load();
                vec![Command::LoadOverview {
                    ticket,
                    refresh: true,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// Delayed timeout event for the chord started with `token`.
    pub fn chord_expired(&mut self, token: u64) {
        if self.chord.is_some_and(|c| c.token == token) {
            tracing::debug!("chord {token} expired");
            self.chord = None;
        }
    }

    fn focus_pane(&mut self, target: Pane) -> Vec<Command> {
        if target == self.nav.focus {
            return Vec::new();
        }
        if self.nav.focus == Pane::Details {
            if let Some(id) = self.selected_run().map(|r| r.id) {
                self.nav.detail_memory.remember(id, self.nav.detail_idx);
            }
        }
        self.nav.focus = target;

        let mut commands = Vec::new();
        match target {
            Pane::Repositories => {}
            Pane::Runs => {
                self.nav.run_idx = clamp(self.nav.run_idx, self.runs.len());
                let stale = self.runs_for != self.selected_repository_ref();
                if stale && self.runs_ticket.is_none() {
                    commands.extend(self.request_runs());
                }
            }
            Pane::Details => {
                let remembered = self
                    .selected_run()
                    .and_then(|r| self.nav.detail_memory.recall(r.id));
                self.nav.detail_idx = match remembered {
                    Some(idx) => clamp_to_content(&self.details, idx),
                    None => first_content(&self.details),
                };
            }
        }
        commands
    }

    fn move_selection(&mut self, down: bool) -> Vec<Command> {
        match self.nav.focus {
            Pane::Repositories => {
                let idx = wrap_step(self.nav.repo_idx, self.repositories.len(), down);
                self.select_repository(idx)
            }
            Pane::Runs => {
                let idx = wrap_step(self.nav.run_idx, self.runs.len(), down);
                self.select_run(idx);
                Vec::new()
            }
            Pane::Details => {
                self.nav.detail_idx = step_content(&self.details, self.nav.detail_idx, down);
                Vec::new()
            }
        }
    }

    fn jump_top(&mut self) -> Vec<Command> {
        match self.nav.focus {
            Pane::Repositories => self.select_repository(0),
            Pane::Runs => {
                self.select_run(0);
                Vec::new()
            }
            Pane::Details => {
                self.nav.detail_idx = first_content(&self.details);
                Vec::new()
            }
        }
    }

    fn jump_bottom(&mut self) -> Vec<Command> {
        match self.nav.focus {
            Pane::Repositories => {
                self.select_repository(self.repositories.len().saturating_sub(1))
            }
            Pane::Runs => {
                self.select_run(self.runs.len().saturating_sub(1));
                Vec::new()
            }
            Pane::Details => {
                self.nav.detail_idx = last_content(&self.details);
                Vec::new()
            }
        }
    }

    /// Select a repository; a change empties the Runs pane and asks for
    /// that repository's runs.
    fn select_repository(&mut self, idx: usize) -> Vec<Command> {
        let idx = clamp(idx, self.repositories.len());
        let unchanged = idx == self.nav.repo_idx
            && self.runs_for.is_some()
            && self.runs_for == self.repositories.get(idx).map(RepositoryOverview::reference);
        self.nav.repo_idx = idx;
        if unchanged || self.repositories.is_empty() {
            return Vec::new();
        }
        self.pending_repo = None;
        self.pending_run = None;
        self.pending_detail = None;
        self.clear_runs();
        self.request_runs().into_iter().collect()
    }

    fn select_run(&mut self, idx: usize) {
        let idx = clamp(idx, self.runs.len());
        if idx != self.nav.run_idx {
            self.nav.run_idx = idx;
            self.nav.detail_idx = 0;
            self.pending_run = None;
            self.pending_detail = None;
            self.recompute_details();
        }
    }

    // ── Inline filter ──

    fn open_filter(&mut self) {
        let pane = self.nav.focus;
        let items: Vec<(usize, String)> = match pane {
            Pane::Repositories => self
                .repositories
                .iter()
                .enumerate()
                .map(|(i, r)| (i, r.name.clone()))
                .collect(),
            Pane::Runs => self
                .runs
                .iter()
                .enumerate()
                .map(|(i, r)| (i, format!("#{} {} {}", r.id, r.display_title(), r.status)))
                .collect(),
            Pane::Details => self
                .details
                .iter()
                .enumerate()
                .filter(|(_, l)| !l.is_blank())
                .map(|(i, l)| (i, l.text()))
                .collect(),
        };
        tracing::debug!("filter opened on {} ({} items)", pane.title(), items.len());
        self.filter = Some(ActiveFilter {
            pane,
            session: FilterSession::activate(items),
        });
    }

    fn handle_filter(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Confirm => {
                let Some(active) = self.filter.take() else {
                    return Vec::new();
                };
                match active.session.on_confirm() {
                    Some(idx) => self.select_in(active.pane, idx),
                    None => Vec::new(),
                }
            }
            Action::Cancel => {
                if let Some(active) = self.filter.take() {
                    active.session.on_cancel();
                }
                Vec::new()
            }
            Action::Quit => {
                self.filter = None;
                vec![Command::Quit]
            }
            _ => {
                if let Some(active) = self.filter.as_mut() {
                    match action {
                        Action::Input(c) => active.session.push_char(c),
                        Action::Backspace => active.session.pop_char(),
                        Action::MoveUp => active.session.move_highlight(-1),
                        Action::MoveDown => active.session.move_highlight(1),
                        _ => {}
                    }
                }
                Vec::new()
            }
        }
    }

    /// Apply an original-collection index as if it had been navigated to.
    fn select_in(&mut self, pane: Pane, idx: usize) -> Vec<Command> {
        match pane {
            Pane::Repositories => self.select_repository(idx),
            Pane::Runs => {
                self.select_run(idx);
                Vec::new()
            }
            Pane::Details => {
                self.nav.detail_idx = clamp_to_content(&self.details, idx);
                Vec::new()
            }
        }
    }

    // ── Exposed state ──

    /// Cursor state for the `DashboardRestore` handoff. The Details cursor
    /// is folded into the memory when that pane has focus.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let mut detail_memory = self.nav.detail_memory.clone();
        let run_id = self.selected_run().map(|r| r.id);
        if self.nav.focus == Pane::Details {
            if let Some(id) = run_id {
                detail_memory.remember(id, self.nav.detail_idx);
            }
        }
        DashboardSnapshot {
            repo_idx: self.nav.repo_idx,
            run_idx: self.nav.run_idx,
            detail_idx: self.nav.detail_idx,
            focus: self.nav.focus,
            repository: self.selected_repository_ref(),
            run_id,
            viewport: self.viewport,
            detail_memory,
        }
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
    }

    pub fn viewport(&self) -> (u16, u16) {
        self.viewport
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    pub fn context(&self) -> &NavigationContext {
        &self.context
    }

    pub fn nav(&self) -> &NavigationState {
        &self.nav
    }

    pub fn focus(&self) -> Pane {
        self.nav.focus
    }

    pub fn repositories(&self) -> &[RepositoryOverview] {
        &self.repositories
    }

    pub fn runs(&self) -> &[RunSnapshot] {
        &self.runs
    }

    pub fn details(&self) -> &[DetailLine] {
        &self.details
    }

    pub fn selected_repository(&self) -> Option<&RepositoryOverview> {
        self.repositories.get(self.nav.repo_idx)
    }

    fn selected_repository_name(&self) -> Option<String> {
        self.selected_repository().map(|r| r.name.clone())
    }

    fn selected_repository_ref(&self) -> Option<RepositoryRef> {
        self.selected_repository().map(RepositoryOverview::reference)
    }

    /// Index of `repository`: by id when it carries one, else the first
    /// entry with its name.
    fn position_of_repository(&self, repository: &RepositoryRef) -> Option<usize> {
        repository
            .id
            .and_then(|id| self.repositories.iter().position(|r| r.id == Some(id)))
            .or_else(|| {
                let name = repository.name.as_deref()?;
                self.repositories.iter().position(|r| r.name == name)
            })
    }

    pub fn selected_run(&self) -> Option<&RunSnapshot> {
        self.runs.get(self.nav.run_idx)
    }

    /// The filter session and the pane it was opened on.
    pub fn filter(&self) -> Option<(Pane, &FilterSession)> {
        self.filter.as_ref().map(|f| (f.pane, &f.session))
    }

    pub fn is_filtering(&self) -> bool {
        self.filter.is_some()
    }

    pub fn chord_pending(&self) -> bool {
        self.chord.is_some()
    }

    pub fn is_loading_overview(&self) -> bool {
        self.overview_ticket.is_some()
    }

    pub fn is_loading_runs(&self) -> bool {
        self.runs_ticket.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading_overview() || self.is_loading_runs()
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn has_active_runs(&self) -> bool {
        self.repositories.iter().any(|r| r.counts.active() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SessionCache, SharedCache};
    use crate::context::NavKey;
    use crate::model::{Repository, RepositoryRef, RunStatus};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn run(id: u64, repo: &str, repo_id: u64, status: RunStatus, minute: u32) -> RunSnapshot {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap();
        RunSnapshot {
            id,
            title: Some(format!("run {id}")),
            status,
            repository: RepositoryRef {
                name: Some(repo.to_string()),
                id: Some(repo_id),
            },
            created_at: created,
            updated_at: created,
            created_by: None,
            message: None,
        }
    }

    /// Repositories `r0, r1, ...` with the given number of Done runs each.
    fn seeded_cache(counts: &[usize]) -> SharedCache {
        let cache = SessionCache::shared();
        let mut repos = Vec::new();
        let mut runs = Vec::new();
        let mut next_id = 1;
        for (i, count) in counts.iter().enumerate() {
            let name = format!("r{i}");
            let repo_id = i as u64 + 100;
            for n in 0..*count {
                runs.push(run(next_id, &name, repo_id, RunStatus::Done, n as u32));
                next_id += 1;
            }
            repos.push(Repository { id: repo_id, name });
        }
        cache.store_snapshot(repos, runs, None);
        cache
    }

    fn dashboard(cache: &SharedCache) -> Dashboard {
        Dashboard::new(1, NavigationContext::new(cache.clone()))
    }

    /// Resolve load commands synchronously from the cache.
    fn settle(d: &mut Dashboard, commands: Vec<Command>) -> Vec<Command> {
        let mut queue = commands;
        let mut rest = Vec::new();
        while let Some(cmd) = queue.pop() {
            match cmd {
                Command::LoadRuns { ticket, repository } => {
                    let runs = runs_of(&d.context().cache().runs(), &repository);
                    d.apply_runs(ticket, runs);
                }
                Command::LoadOverview { ticket, .. } => {
                    let overview = d.context().cache().overview().unwrap_or_default();
                    queue.extend(d.apply_overview(Some(ticket), overview));
                }
                other => rest.push(other),
            }
        }
        rest
    }

    fn press(d: &mut Dashboard, action: Action) -> Vec<Command> {
        let commands = d.handle(action, Instant::now());
        settle(d, commands)
    }

    fn assert_in_range(d: &Dashboard) {
        let nav = d.nav();
        for (idx, len) in [
            (nav.repo_idx, d.repositories().len()),
            (nav.run_idx, d.runs().len()),
            (nav.detail_idx, d.details().len()),
        ] {
            if len == 0 {
                assert_eq!(idx, 0);
            } else {
                assert!(idx < len, "{idx} out of 0..{len}");
            }
        }
    }

    #[test]
    fn seeds_from_cached_overview() {
        let cache = seeded_cache(&[2, 0, 5]);
        let d = dashboard(&cache);
        assert_eq!(d.repositories().len(), 3);
        assert_eq!(d.focus(), Pane::Repositories);
        assert_eq!(d.runs().len(), 2);
        assert_eq!(d.selected_run().map(|r| r.id), Some(2));
    }

    #[test]
    fn nine_downs_over_five_runs_lands_on_four() {
        let cache = seeded_cache(&[2, 0, 5]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::MoveDown);
        assert_eq!(d.nav().repo_idx, 2);
        assert_eq!(d.runs().len(), 5);
        press(&mut d, Action::Advance);
        assert_eq!(d.focus(), Pane::Runs);
        assert_eq!(d.nav().run_idx, 0);
        for _ in 0..9 {
            press(&mut d, Action::MoveDown);
        }
        assert_eq!(d.nav().run_idx, 4);
    }

    #[test]
    fn movement_wraps_at_both_ends() {
        let cache = seeded_cache(&[1, 1, 1]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveUp);
        assert_eq!(d.nav().repo_idx, 2);
        press(&mut d, Action::MoveDown);
        assert_eq!(d.nav().repo_idx, 0);
    }

    #[test]
    fn repository_change_reloads_runs_and_drops_stale_results() {
        let cache = seeded_cache(&[2, 3, 4]);
        let mut d = dashboard(&cache);
        let first = d.handle(Action::MoveDown, Instant::now());
        let second = d.handle(Action::MoveDown, Instant::now());
        assert!(d.runs().is_empty());
        assert!(d.is_loading_runs());

        let Some(Command::LoadRuns { ticket: stale, repository }) = first.into_iter().next() else {
            panic!("expected LoadRuns");
        };
        assert_eq!(repository.name.as_deref(), Some("r1"));
        assert_eq!(repository.id, Some(101));
        assert!(!d.apply_runs(stale, runs_of(&cache.runs(), &repository)));
        assert!(d.runs().is_empty());

        settle(&mut d, second);
        assert_eq!(d.runs().len(), 4);
        assert!(d.runs().iter().all(|r| r.repository_name() == Some("r2")));
        assert!(!d.is_loading());
    }

    #[test]
    fn same_name_repositories_show_their_own_runs() {
        let cache = SessionCache::shared();
        cache.store_snapshot(
            vec![
                Repository { id: 2, name: "beta".into() },
                Repository { id: 3, name: "beta".into() },
            ],
            vec![
                run(1, "beta", 2, RunStatus::Done, 0),
                run(2, "beta", 3, RunStatus::Failed, 1),
                run(3, "beta", 3, RunStatus::Done, 2),
            ],
            None,
        );
        let mut d = dashboard(&cache);
        assert_eq!(d.repositories().len(), 2);
        assert_eq!(d.runs().iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);

        press(&mut d, Action::MoveDown);
        assert_eq!(d.selected_repository().and_then(|r| r.id), Some(3));
        assert_eq!(d.runs().iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);

        press(&mut d, Action::NewRun);
        let restored = Dashboard::new(2, d.context().clone());
        assert_eq!(restored.nav().repo_idx, 1);
        assert_eq!(restored.runs().len(), 2);
    }

    #[test]
    fn tickets_from_another_view_are_stale() {
        let cache = seeded_cache(&[2]);
        let mut d = dashboard(&cache);
        d.begin_overview_load();
        let foreign = Ticket { view: 99, seq: 1 };
        assert!(d.apply_overview(Some(foreign), Vec::new()).is_empty());
        assert_eq!(d.repositories().len(), 1);
        assert!(d.is_loading_overview());
    }

    #[test]
    fn retreat_keeps_previous_pane_selection() {
        let cache = seeded_cache(&[1, 3]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Advance);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Retreat);
        assert_eq!(d.focus(), Pane::Repositories);
        assert_eq!(d.nav().repo_idx, 1);
        assert_eq!(d.nav().run_idx, 1);
        press(&mut d, Action::Retreat);
        assert_eq!(d.focus(), Pane::Repositories);
    }

    #[test]
    fn tab_cycles_and_wraps() {
        let cache = seeded_cache(&[2]);
        let mut d = dashboard(&cache);
        let mut seen = Vec::new();
        for _ in 0..4 {
            press(&mut d, Action::CycleFocus);
            seen.push(d.focus());
        }
        assert_eq!(
            seen,
            vec![Pane::Runs, Pane::Details, Pane::Repositories, Pane::Runs]
        );
    }

    #[test]
    fn gg_within_timeout_jumps_to_top() {
        let cache = seeded_cache(&[1, 1, 1, 1]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::JumpBottom);
        assert_eq!(d.nav().repo_idx, 3);

        let t0 = Instant::now();
        let commands = d.handle(Action::JumpTopChord, t0);
        assert!(matches!(
            commands.as_slice(),
            [Command::ScheduleChordTimeout { after, .. }] if *after == CHORD_TIMEOUT
        ));
        let commands = d.handle(Action::JumpTopChord, t0 + Duration::from_millis(400));
        settle(&mut d, commands);
        assert_eq!(d.nav().repo_idx, 0);
        assert!(!d.chord_pending());
    }

    #[test]
    fn g_then_other_key_cancels_chord() {
        let cache = seeded_cache(&[1, 1, 1, 1]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::JumpBottom);
        let t0 = Instant::now();
        d.handle(Action::JumpTopChord, t0);
        let commands = d.handle(Action::MoveUp, t0 + Duration::from_millis(100));
        settle(&mut d, commands);
        assert_eq!(d.nav().repo_idx, 2);
        assert!(!d.chord_pending());
        d.handle(Action::JumpTopChord, t0 + Duration::from_millis(200));
        assert_eq!(d.nav().repo_idx, 2);
    }

    #[test]
    fn lone_g_past_timeout_changes_nothing() {
        let cache = seeded_cache(&[1, 1, 1]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::JumpBottom);
        let t0 = Instant::now();
        let commands = d.handle(Action::JumpTopChord, t0);
        let Some(Command::ScheduleChordTimeout { token, .. }) = commands.into_iter().next() else {
            panic!("expected chord timeout");
        };
        d.chord_expired(token);
        assert!(!d.chord_pending());
        assert_eq!(d.nav().repo_idx, 2);

        // A late second g without the timer having fired starts a new chord.
        d.handle(Action::JumpTopChord, t0);
        d.handle(Action::JumpTopChord, t0 + Duration::from_millis(1500));
        assert_eq!(d.nav().repo_idx, 2);
        assert!(d.chord_pending());
    }

    #[test]
    fn expiry_for_an_old_chord_is_ignored() {
        let cache = seeded_cache(&[1]);
        let mut d = dashboard(&cache);
        let t0 = Instant::now();
        d.handle(Action::JumpTopChord, t0);
        d.handle(Action::MoveDown, t0);
        d.handle(Action::JumpTopChord, t0);
        d.chord_expired(1);
        assert!(d.chord_pending());
        d.chord_expired(2);
        assert!(!d.chord_pending());
    }

    fn detailed_run() -> RunSnapshot {
        let mut r = run(7, "r0", 100, RunStatus::Failed, 0);
        r.updated_at = r.created_at + chrono::Duration::seconds(125);
        r.created_by = Some("dana".into());
        r.message = Some("out of memory".into());
        r
    }

    #[test]
    fn detail_lines_skip_empty_values() {
        let mut r = run(3, "r0", 100, RunStatus::Queued, 0);
        r.title = Some("   ".into());
        let labels: Vec<String> = detail_lines(&r).iter().map(DetailLine::text).collect();
        assert_eq!(
            labels,
            vec![
                "Run: #3".to_string(),
                "Status: queued".to_string(),
                String::new(),
                "Repository: r0".to_string(),
                "Repository id: 100".to_string(),
                String::new(),
                "Created: 2024-06-01 10:00:00 UTC".to_string(),
            ]
        );
    }

    #[test]
    fn terminal_run_details_include_duration_and_extras() {
        let lines = detail_lines(&detailed_run());
        assert!(lines.contains(&DetailLine::Field {
            label: "Duration",
            value: "2m 5s".into()
        }));
        assert_eq!(lines.last().map(DetailLine::text).as_deref(), Some("Message: out of memory"));
        assert!(!lines.first().is_some_and(DetailLine::is_blank));
        assert!(!lines.last().is_some_and(DetailLine::is_blank));
    }

    fn details_dashboard() -> (SharedCache, Dashboard) {
        let cache = SessionCache::shared();
        cache.store_snapshot(
            vec![Repository {
                id: 100,
                name: "r0".into(),
            }],
            vec![detailed_run(), run(8, "r0", 100, RunStatus::Done, 5)],
            None,
        );
        let mut d = dashboard(&cache);
        press(&mut d, Action::Advance);
        press(&mut d, Action::Advance);
        (cache, d)
    }

    #[test]
    fn details_movement_skips_separators_and_wraps() {
        let (_cache, mut d) = details_dashboard();
        assert_eq!(d.focus(), Pane::Details);
        let separators: Vec<usize> = d
            .details()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_blank())
            .map(|(i, _)| i)
            .collect();
        assert!(!separators.is_empty());
        for _ in 0..(d.details().len() * 2) {
            press(&mut d, Action::MoveDown);
            assert!(!d.details()[d.nav().detail_idx].is_blank());
        }
        press(&mut d, Action::JumpBottom);
        let last = d.nav().detail_idx;
        press(&mut d, Action::MoveDown);
        assert_eq!(d.nav().detail_idx, 0);
        press(&mut d, Action::MoveUp);
        assert_eq!(d.nav().detail_idx, last);
    }

    #[test]
    fn details_cursor_is_remembered_per_run() {
        let (_cache, mut d) = details_dashboard();
        // Newest first: run 8 is selected, run 7 second.
        assert_eq!(d.selected_run().map(|r| r.id), Some(8));
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::MoveDown);
        let remembered = d.nav().detail_idx;
        assert_ne!(remembered, 0);

        press(&mut d, Action::Retreat);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Advance);
        assert_eq!(d.selected_run().map(|r| r.id), Some(7));
        assert_eq!(d.nav().detail_idx, 0);

        press(&mut d, Action::Retreat);
        press(&mut d, Action::MoveUp);
        press(&mut d, Action::Advance);
        assert_eq!(d.nav().detail_idx, remembered);
    }

    #[test]
    fn remembered_index_out_of_range_falls_back_to_first_line() {
        let (_cache, mut d) = details_dashboard();
        let id = d.selected_run().map(|r| r.id).unwrap();
        press(&mut d, Action::Retreat);
        d.nav.detail_memory.remember(id, 999);
        press(&mut d, Action::Advance);
        assert_eq!(d.nav().detail_idx, 0);
    }

    #[test]
    fn detail_memory_evicts_oldest() {
        let mut memory = DetailMemory::with_capacity(2);
        memory.remember(1, 1);
        memory.remember(2, 2);
        memory.remember(1, 5);
        memory.remember(3, 3);
        assert_eq!(memory.recall(2), None);
        assert_eq!(memory.recall(1), Some(5));
        assert_eq!(memory.recall(3), Some(3));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn filter_confirm_applies_original_index() {
        let cache = seeded_cache(&[1, 2, 3]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::StartFilter);
        assert!(d.is_filtering());
        press(&mut d, Action::Input('2'));
        let (_, session) = d.filter().unwrap();
        assert_eq!(session.matches().len(), 1);
        press(&mut d, Action::Confirm);
        assert!(!d.is_filtering());
        assert_eq!(d.nav().repo_idx, 2);
        assert_eq!(d.runs().len(), 3);
    }

    #[test]
    fn filter_cancel_leaves_selection() {
        let cache = seeded_cache(&[1, 2, 3]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::StartFilter);
        press(&mut d, Action::Input('r'));
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Cancel);
        assert!(!d.is_filtering());
        assert_eq!(d.nav().repo_idx, 1);
    }

    #[test]
    fn filter_keys_do_not_navigate() {
        let cache = seeded_cache(&[1, 2]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::StartFilter);
        press(&mut d, Action::Input('j'));
        assert_eq!(d.nav().repo_idx, 0);
        assert_eq!(d.filter().map(|(_, s)| s.query().to_string()).as_deref(), Some("j"));
    }

    #[test]
    fn new_run_hands_off_preselect_and_restore() {
        let cache = seeded_cache(&[1, 2]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveDown);
        let commands = press(&mut d, Action::NewRun);
        assert_eq!(commands, vec![Command::OpenCreateForm]);
        let ctx = d.context();
        assert_eq!(ctx.take_create_preselect().as_deref(), Some("r1"));
        let snapshot = ctx.get(NavKey::DashboardRestore);
        assert!(matches!(
            snapshot,
            Some(NavPayload::DashboardRestore(DashboardSnapshot { repo_idx: 1, .. }))
        ));
    }

    #[test]
    fn restore_prefers_names_and_clamps_indices() {
        let cache = seeded_cache(&[1, 2, 3]);
        let ctx = NavigationContext::new(cache.clone());
        ctx.set(NavPayload::DashboardRestore(DashboardSnapshot {
            repo_idx: 0,
            run_idx: 40,
            focus: Pane::Runs,
            repository: Some(RepositoryRef::named("r2")),
            viewport: (120, 40),
            ..Default::default()
        }));
        let d = Dashboard::new(2, ctx);
        assert_eq!(d.nav().repo_idx, 2);
        assert_eq!(d.nav().run_idx, 2);
        assert_eq!(d.focus(), Pane::Runs);
        assert_eq!(d.viewport(), (120, 40));
        assert!(d.context().get(NavKey::DashboardRestore).is_none());
        assert_in_range(&d);
    }

    #[test]
    fn restore_keeps_details_cursor_across_create_form() {
        let (_cache, mut d) = details_dashboard();
        press(&mut d, Action::Retreat);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Advance);
        press(&mut d, Action::JumpBottom);
        assert_eq!(d.selected_run().map(|r| r.id), Some(7));
        let before = d.nav().detail_idx;
        assert_ne!(before, 0);

        press(&mut d, Action::NewRun);
        let ctx = d.context().clone();
        let _ = ctx.take_create_preselect();
        let restored = Dashboard::new(2, ctx);
        assert_eq!(restored.focus(), Pane::Details);
        assert_eq!(restored.selected_run().map(|r| r.id), Some(7));
        assert_eq!(restored.nav().detail_idx, before);
        assert_in_range(&restored);
    }

    #[test]
    fn run_created_invalidates_active_and_focuses_new_run() {
        let cache = seeded_cache(&[1, 1]);
        cache.put_run(run(50, "r1", 101, RunStatus::Queued, 30));
        let ctx = NavigationContext::new(cache.clone());
        ctx.set(NavPayload::RunCreated {
            run_id: 60,
            repository: "r1".into(),
        });
        let mut d = Dashboard::new(3, ctx);
        assert!(cache.run(50).is_none());
        assert_eq!(d.nav().repo_idx, 1);
        assert_eq!(d.focus(), Pane::Runs);

        let commands = d.start();
        assert!(matches!(
            commands.as_slice(),
            [Command::LoadOverview { refresh: true, .. }]
        ));
        // The refreshed data now contains the new run.
        cache.put_run(run(60, "r1", 101, RunStatus::Queued, 40));
        settle(&mut d, commands);
        assert_eq!(d.selected_run().map(|r| r.id), Some(60));
        assert!(!d.needs_refresh());
    }

    #[test]
    fn reload_keeps_selection_by_name_and_id() {
        let cache = seeded_cache(&[2, 3]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::MoveDown);
        press(&mut d, Action::Advance);
        press(&mut d, Action::MoveDown);
        let selected = d.selected_run().map(|r| r.id);

        // A new repository sorts before the selected one.
        let mut overview = cache.overview().unwrap();
        overview.insert(
            0,
            RepositoryOverview {
                name: "a-first".into(),
                id: Some(1),
                counts: Default::default(),
                last_activity: None,
            },
        );
        let ticket = d.begin_overview_load();
        let commands = d.apply_overview(Some(ticket), overview);
        settle(&mut d, commands);
        assert_eq!(d.nav().repo_idx, 2);
        assert_eq!(d.selected_run().map(|r| r.id), selected);
    }

    #[test]
    fn shrinking_data_clamps_every_index() {
        let cache = seeded_cache(&[1, 1, 6]);
        let mut d = dashboard(&cache);
        press(&mut d, Action::JumpBottom);
        press(&mut d, Action::Advance);
        press(&mut d, Action::JumpBottom);
        press(&mut d, Action::Advance);

        let overview = cache.overview().unwrap().into_iter().take(1).collect();
        let ticket = d.begin_overview_load();
        let commands = d.apply_overview(Some(ticket), overview);
        assert_in_range(&d);
        settle(&mut d, commands);
        assert_eq!(d.nav().repo_idx, 0);
        assert_in_range(&d);

        let ticket = d.begin_overview_load();
        d.apply_overview(Some(ticket), Vec::new());
        assert_in_range(&d);
        assert_eq!(d.focus(), Pane::Runs);
        for action in [Action::MoveDown, Action::JumpBottom, Action::Advance, Action::MoveUp] {
            press(&mut d, action);
            assert_in_range(&d);
        }
    }

    #[test]
    fn background_overview_yields_to_foreground_load() {
        let cache = seeded_cache(&[1]);
        let mut d = dashboard(&cache);
        d.begin_overview_load();
        assert!(d.apply_overview(None, Vec::new()).is_empty());
        assert_eq!(d.repositories().len(), 1);
    }

    #[test]
    fn refresh_is_ignored_while_overview_loads() {
        let cache = seeded_cache(&[1]);
        let mut d = dashboard(&cache);
        let first = d.handle(Action::Refresh, Instant::now());
        assert_eq!(first.len(), 1);
        assert!(d.handle(Action::Refresh, Instant::now()).is_empty());
        assert!(d.is_loading());
    }

    #[test]
    fn invariants_hold_under_mixed_input() {
        let cache = seeded_cache(&[3, 0, 5, 1]);
        let mut d = dashboard(&cache);
        let script = [
            Action::MoveDown,
            Action::Advance,
            Action::JumpBottom,
            Action::Advance,
            Action::MoveUp,
            Action::CycleFocus,
            Action::MoveUp,
            Action::Advance,
            Action::Advance,
            Action::MoveDown,
            Action::Retreat,
            Action::Retreat,
            Action::JumpBottom,
            Action::CycleFocus,
        ];
        for (i, action) in script.iter().cycle().take(200).enumerate() {
            // Every third batch of loads is never answered.
            let commands = d.handle(*action, Instant::now());
            if i % 3 != 0 {
                settle(&mut d, commands);
            }
            assert_in_range(&d);
        }
    }
}
