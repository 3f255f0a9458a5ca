//! View host: owns the current screen and turns events into effects.
//!
//! [`App::handle_event`] is the single consumer of the serialized event
//! queue. It never awaits; anything slow comes back out as an [`Effect`]
//! for the main loop to run, and its result re-enters as another event.
//!
//! Every screen switch bumps the view generation. Load results carry the
//! generation they were issued under, so a result for a screen that has
//! since been replaced is discarded instead of applied.

use crate::context::NavigationContext;
use crate::coordinator::{Coordinator, Overview, Source};
use crate::create::{CreateForm, FormCommand};
use crate::dashboard::{Command, Dashboard, Ticket};
use crate::events::AppEvent;
use crate::input::{self, Action, InputContext, InputMode};
use crate::model::{CreateRunRequest, RepositoryRef, RunSnapshot, UserInfo};
use crate::retry::LoadOutcome;
use crossterm::event::KeyEvent;
use std::time::{Duration, Instant};

/// How long a flash message stays in the footer.
pub const MESSAGE_TTL: Duration = Duration::from_secs(4);
pub const SPINNER_FRAME_COUNT: usize = 10;
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;

pub enum Screen {
    Dashboard,
    CreateRun(CreateForm),
    Error(ErrorScreen),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorScreen {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub token: u64,
    pub kind: MessageKind,
    pub text: String,
}

/// Work for the main loop. Loads run off the event thread via
/// [`perform`]; `Persist` and `Quit` are handled inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadOverview { ticket: Ticket, refresh: bool },
    LoadRuns { ticket: Ticket, repository: RepositoryRef },
    LoadUserInfo,
    SubmitRun { view: u64, request: CreateRunRequest },
    ChordTimeout { view: u64, token: u64, after: Duration },
    ClearMessage { token: u64, after: Duration },
    Persist,
    Quit,
}

pub struct App {
    context: NavigationContext,
    view: u64,
    dashboard: Dashboard,
    screen: Screen,
    user: Option<UserInfo>,
    message: Option<FlashMessage>,
    next_message: u64,
    pub spinner_frame: usize,
    pub should_quit: bool,
    pub version_string: String,
}

impl App {
    pub fn new(context: NavigationContext, preselect: Option<String>) -> Self {
        let view = 1;
        let mut dashboard = Dashboard::new(view, context.clone());
        dashboard.preselect(preselect);
        Self {
            context,
            view,
            dashboard,
            screen: Screen::Dashboard,
            user: None,
            message: None,
            next_message: 0,
            spinner_frame: 0,
            should_quit: false,
            version_string: String::new(),
        }
    }

    /// Initial effects: the dashboard's first load plus the header's user.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::LoadUserInfo];
        let commands = self.dashboard.start();
        effects.extend(self.run_commands(commands));
        effects
    }

    pub fn input_context(&self) -> InputContext {
        let mode = match &self.screen {
            Screen::Dashboard if self.dashboard.is_filtering() => InputMode::Filter,
            Screen::Dashboard => InputMode::Dashboard,
            Screen::CreateRun(_) => InputMode::Form,
            Screen::Error(_) => InputMode::ErrorScreen,
        };
        InputContext {
            mode,
            is_loading: self.dashboard.is_loading_overview(),
        }
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) -> Vec<Effect> {
        match event {
            AppEvent::Key(key) => self.handle_key(key, now),
            AppEvent::Resize(w, h) => {
                self.dashboard.set_viewport(w, h);
                Vec::new()
            }
            AppEvent::Tick => {
                self.advance_spinner();
                Vec::new()
            }
            AppEvent::OverviewLoaded {
                ticket,
                outcome,
                manual,
            } => self.on_overview(ticket, outcome, manual),
            AppEvent::RunsLoaded { ticket, outcome } => self.on_runs(ticket, outcome),
            AppEvent::UserInfoLoaded(outcome) => {
                match outcome {
                    LoadOutcome::Loaded(user) => self.user = Some(user),
                    LoadOutcome::Transient(msg) | LoadOutcome::Exhausted(msg) => {
                        tracing::debug!("user info unavailable: {msg}");
                    }
                }
                Vec::new()
            }
            AppEvent::RunSubmitted { view, outcome } => self.on_run_submitted(view, outcome),
            AppEvent::ChordExpired { view, token } => {
                if view == self.view {
                    self.dashboard.chord_expired(token);
                }
                Vec::new()
            }
            AppEvent::ClearMessage(token) => {
                if self.message.as_ref().is_some_and(|m| m.token == token) {
                    self.message = None;
                }
                Vec::new()
            }
            AppEvent::Error(msg) => vec![self.flash(MessageKind::Error, msg)],
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Vec<Effect> {
        let action = input::map_key(key, &self.input_context());
        self.handle_action(action, now)
    }

    pub fn handle_action(&mut self, action: Action, now: Instant) -> Vec<Effect> {
        if action == Action::None {
            return Vec::new();
        }
        match &mut self.screen {
            Screen::Dashboard => {
                let commands = self.dashboard.handle(action, now);
                self.run_commands(commands)
            }
            Screen::CreateRun(form) => match form.handle(action) {
                FormCommand::None => Vec::new(),
                FormCommand::Submit(request) => vec![Effect::SubmitRun {
                    view: self.view,
                    request,
                }],
                FormCommand::Cancel => self.return_to_dashboard(),
                FormCommand::Quit => self.quit(),
            },
            Screen::Error(_) => match action {
                Action::Retry => {
                    tracing::info!("retrying after error");
                    self.screen = Screen::Dashboard;
                    let commands = self.dashboard.start();
                    self.run_commands(commands)
                }
                Action::Quit => self.quit(),
                _ => Vec::new(),
            },
        }
    }

    fn run_commands(&mut self, commands: Vec<Command>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for command in commands {
            match command {
                Command::LoadOverview { ticket, refresh } => {
                    effects.push(Effect::LoadOverview { ticket, refresh });
                }
                Command::LoadRuns { ticket, repository } => {
                    effects.push(Effect::LoadRuns { ticket, repository });
                }
                Command::ScheduleChordTimeout { token, after } => {
                    effects.push(Effect::ChordTimeout {
                        view: self.view,
                        token,
                        after,
                    });
                }
                Command::OpenCreateForm => {
                    self.view += 1;
                    tracing::debug!("opening create form (view {})", self.view);
                    self.screen = Screen::CreateRun(CreateForm::new(self.context.clone()));
                }
                Command::Quit => effects.extend(self.quit()),
            }
        }
        effects
    }

    fn quit(&mut self) -> Vec<Effect> {
        self.should_quit = true;
        vec![Effect::Persist, Effect::Quit]
    }

    /// Build a fresh dashboard for a new view generation. It consumes
    /// whatever handoffs the previous screen left in the context.
    fn return_to_dashboard(&mut self) -> Vec<Effect> {
        self.view += 1;
        let viewport = self.dashboard.viewport();
        self.dashboard = Dashboard::new(self.view, self.context.clone());
        if self.dashboard.viewport() == (0, 0) {
            self.dashboard.set_viewport(viewport.0, viewport.1);
        }
        self.screen = Screen::Dashboard;
        let commands = self.dashboard.start();
        self.run_commands(commands)
    }

    fn on_overview(
        &mut self,
        ticket: Option<Ticket>,
        outcome: LoadOutcome<Overview>,
        manual: bool,
    ) -> Vec<Effect> {
        if matches!(self.screen, Screen::CreateRun(_)) {
            return Vec::new();
        }
        if let Some(t) = ticket {
            if t.view != self.view {
                tracing::debug!("discarding overview for view {} (now {})", t.view, self.view);
                return Vec::new();
            }
        }

        match outcome {
            LoadOutcome::Loaded(overview) => {
                let source = overview.source;
                if overview.rejected > 0 {
                    tracing::warn!("{} run records rejected", overview.rejected);
                }
                let commands = self.dashboard.apply_overview(ticket, overview.repositories);
                let mut effects = self.run_commands(commands);
                if ticket.is_some() && matches!(self.screen, Screen::Error(_)) {
                    self.screen = Screen::Dashboard;
                }
                if manual && source == Source::Network {
                    effects.push(Effect::Persist);
                    effects.push(self.flash(MessageKind::Info, "Refreshed".to_string()));
                }
                effects
            }
            LoadOutcome::Transient(msg) => {
                let Some(t) = ticket else {
                    tracing::debug!("background refresh failed: {msg}");
                    return Vec::new();
                };
                if !self.dashboard.overview_failed(t) {
                    return Vec::new();
                }
                if self.dashboard.repositories().is_empty() {
                    self.show_error(msg);
                    Vec::new()
                } else {
                    vec![self.flash(MessageKind::Error, format!("Refresh failed: {msg}"))]
                }
            }
            LoadOutcome::Exhausted(msg) => {
                let Some(t) = ticket else {
                    tracing::debug!("background refresh gave up: {msg}");
                    return Vec::new();
                };
                if self.dashboard.overview_failed(t) {
                    self.show_error(msg);
                }
                Vec::new()
            }
        }
    }

    fn on_runs(&mut self, ticket: Ticket, outcome: LoadOutcome<Vec<RunSnapshot>>) -> Vec<Effect> {
        if ticket.view != self.view {
            tracing::debug!("discarding runs for view {} (now {})", ticket.view, self.view);
            return Vec::new();
        }
        match outcome {
            LoadOutcome::Loaded(runs) => {
                self.dashboard.apply_runs(ticket, runs);
                Vec::new()
            }
            LoadOutcome::Transient(msg) => {
                if self.dashboard.runs_failed(ticket) {
                    vec![self.flash(MessageKind::Error, msg)]
                } else {
                    Vec::new()
                }
            }
            LoadOutcome::Exhausted(msg) => {
                if self.dashboard.runs_failed(ticket) {
                    self.show_error(msg);
                }
                Vec::new()
            }
        }
    }

    fn on_run_submitted(&mut self, view: u64, outcome: LoadOutcome<RunSnapshot>) -> Vec<Effect> {
        let Screen::CreateRun(form) = &mut self.screen else {
            tracing::debug!("discarding create result: form no longer open");
            return Vec::new();
        };
        if view != self.view {
            return Vec::new();
        }
        let created = match &outcome {
            LoadOutcome::Loaded(run) => Some(run.id),
            _ => None,
        };
        if !form.finish(outcome) {
            return Vec::new();
        }
        let mut effects = self.return_to_dashboard();
        if let Some(id) = created {
            effects.push(self.flash(MessageKind::Info, format!("Run #{id} created")));
        }
        effects
    }

    fn show_error(&mut self, message: String) {
        tracing::warn!("showing error screen: {message}");
        self.screen = Screen::Error(ErrorScreen { message });
    }

    fn flash(&mut self, kind: MessageKind, text: String) -> Effect {
        self.next_message += 1;
        let token = self.next_message;
        self.message = Some(FlashMessage { token, kind, text });
        Effect::ClearMessage {
            token,
            after: MESSAGE_TTL,
        }
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn is_loading(&self) -> bool {
        self.dashboard.is_loading()
            || matches!(&self.screen, Screen::CreateRun(form) if form.is_submitting())
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub fn message(&self) -> Option<&FlashMessage> {
        self.message.as_ref()
    }

    pub fn context(&self) -> &NavigationContext {
        &self.context
    }
}

/// Run one asynchronous effect and produce the event carrying its result.
/// `Persist` and `Quit` are not asynchronous and yield `None`.
pub async fn perform(coordinator: &Coordinator, effect: Effect) -> Option<AppEvent> {
    match effect {
        Effect::LoadOverview { ticket, refresh } => {
            let outcome = if refresh {
                coordinator.refresh().await
            } else {
                coordinator.load_overview().await
            };
            Some(AppEvent::OverviewLoaded {
                ticket: Some(ticket),
                outcome,
                manual: refresh,
            })
        }
        Effect::LoadRuns { ticket, repository } => Some(AppEvent::RunsLoaded {
            ticket,
            outcome: coordinator.runs_for(&repository).await,
        }),
        Effect::LoadUserInfo => Some(AppEvent::UserInfoLoaded(coordinator.user_info().await)),
        Effect::SubmitRun { view, request } => Some(AppEvent::RunSubmitted {
            view,
            outcome: coordinator.create_run(&request).await,
        }),
        Effect::ChordTimeout { view, token, after } => {
            tokio::time::sleep(after).await;
            Some(AppEvent::ChordExpired { view, token })
        }
        Effect::ClearMessage { token, after } => {
            tokio::time::sleep(after).await;
            Some(AppEvent::ClearMessage(token))
        }
        Effect::Persist | Effect::Quit => None,
    }
}
