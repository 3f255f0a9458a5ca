//! Create-run form: the receiving side of the `CreatePreselect` handoff and
//! the sending side of `RunCreated`.

use crate::context::{NavPayload, NavigationContext};
use crate::input::Action;
use crate::model::{CreateRunRequest, RepositoryOverview, RunSnapshot};
use crate::retry::LoadOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Repository,
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    None,
    Submit(CreateRunRequest),
    /// Back to the dashboard without creating anything.
    Cancel,
    Quit,
}

pub struct CreateForm {
    context: NavigationContext,
    repositories: Vec<RepositoryOverview>,
    repo_idx: usize,
    title: String,
    field: FormField,
    submitting: bool,
    error: Option<String>,
}

impl CreateForm {
    pub fn new(context: NavigationContext) -> Self {
        let repositories = context.cache().overview().unwrap_or_default();
        let preselect = context.take_create_preselect();
        let repo_idx = preselect
            .and_then(|name| repositories.iter().position(|r| r.name == name))
            .unwrap_or(0);
        Self {
            context,
            repositories,
            repo_idx,
            title: String::new(),
            field: FormField::default(),
            submitting: false,
            error: None,
        }
    }

    pub fn handle(&mut self, action: Action) -> FormCommand {
        if self.submitting {
            return match action {
                Action::Quit => FormCommand::Quit,
                _ => FormCommand::None,
            };
        }
        match (self.field, action) {
            (_, Action::Quit) => FormCommand::Quit,
            (_, Action::Cancel) => FormCommand::Cancel,
            (FormField::Repository, Action::MoveDown) => {
                self.step_repository(true);
                FormCommand::None
            }
            (FormField::Repository, Action::MoveUp) => {
                self.step_repository(false);
                FormCommand::None
            }
            (FormField::Repository, Action::Confirm) => {
                self.field = FormField::Title;
                FormCommand::None
            }
            (FormField::Title, Action::MoveUp | Action::MoveDown) => {
                self.field = FormField::Repository;
                FormCommand::None
            }
            (FormField::Title, Action::Input(c)) => {
                self.title.push(c);
                FormCommand::None
            }
            (FormField::Title, Action::Backspace) => {
                self.title.pop();
                FormCommand::None
            }
            (FormField::Title, Action::Confirm) => self.submit(),
            _ => FormCommand::None,
        }
    }

    fn step_repository(&mut self, down: bool) {
        let len = self.repositories.len();
        if len == 0 {
            return;
        }
        self.repo_idx = if down {
            (self.repo_idx + 1) % len
        } else {
            (self.repo_idx + len - 1) % len
        };
    }

    fn submit(&mut self) -> FormCommand {
        let Some(repo) = self.repositories.get(self.repo_idx) else {
            self.error = Some("No repository to create a run in".to_string());
            return FormCommand::None;
        };
        let title = self.title.trim();
        let request = CreateRunRequest {
            repository: repo.name.clone(),
            repository_id: repo.id,
            title: (!title.is_empty()).then(|| title.to_string()),
        };
        self.submitting = true;
        self.error = None;
        FormCommand::Submit(request)
    }

    /// Result of the submit. On success the `RunCreated` handoff is set
    /// and `true` is returned: the host should go back to the dashboard.
    pub fn finish(&mut self, outcome: LoadOutcome<RunSnapshot>) -> bool {
        self.submitting = false;
        match outcome {
            LoadOutcome::Loaded(run) => {
                let repository = run
                    .repository_name()
                    .map(str::to_string)
                    .or_else(|| self.selected_repository().map(|r| r.name.clone()))
                    .unwrap_or_default();
                self.context.set(NavPayload::RunCreated {
                    run_id: run.id,
                    repository,
                });
                true
            }
            LoadOutcome::Transient(msg) | LoadOutcome::Exhausted(msg) => {
                tracing::warn!("create run failed: {msg}");
                self.error = Some(msg);
                false
            }
        }
    }

    pub fn repositories(&self) -> &[RepositoryOverview] {
        &self.repositories
    }

    pub fn selected_repository(&self) -> Option<&RepositoryOverview> {
        self.repositories.get(self.repo_idx)
    }

    pub fn repo_idx(&self) -> usize {
        self.repo_idx
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn field(&self) -> FormField {
        self.field
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SessionCache;
    use crate::context::NavKey;
    use crate::model::{Repository, RepositoryRef, RunStatus};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn context(names: &[&str]) -> NavigationContext {
        let cache = SessionCache::shared();
        let repos = names
            .iter()
            .enumerate()
            .map(|(i, n)| Repository {
                id: i as u64 + 1,
                name: (*n).to_string(),
            })
            .collect();
        cache.store_snapshot(repos, Vec::new(), None);
        NavigationContext::new(cache)
    }

    fn type_title(form: &mut CreateForm, text: &str) {
        for c in text.chars() {
            form.handle(Action::Input(c));
        }
    }

    #[test]
    fn preselect_is_consumed() {
        let ctx = context(&["alpha", "beta", "gamma"]);
        ctx.set(NavPayload::CreatePreselect {
            repository: "gamma".into(),
        });
        let form = CreateForm::new(ctx.clone());
        assert_eq!(form.selected_repository().map(|r| r.name.as_str()), Some("gamma"));
        assert!(ctx.get(NavKey::CreatePreselect).is_none());
    }

    #[test]
    fn unknown_preselect_falls_back_to_first() {
        let ctx = context(&["alpha", "beta"]);
        ctx.set(NavPayload::CreatePreselect {
            repository: "zeta".into(),
        });
        let form = CreateForm::new(ctx);
        assert_eq!(form.repo_idx(), 0);
    }

    #[test]
    fn submit_builds_request() {
        let mut form = CreateForm::new(context(&["alpha", "beta"]));
        form.handle(Action::MoveDown);
        form.handle(Action::Confirm);
        assert_eq!(form.field(), FormField::Title);
        type_title(&mut form, " nightly ");
        let cmd = form.handle(Action::Confirm);
        assert_eq!(
            cmd,
            FormCommand::Submit(CreateRunRequest {
                repository: "beta".into(),
                repository_id: Some(2),
                title: Some("nightly".into()),
            })
        );
        assert!(form.is_submitting());
        assert_eq!(form.handle(Action::Confirm), FormCommand::None);
    }

    #[test]
    fn empty_title_is_omitted() {
        let mut form = CreateForm::new(context(&["alpha"]));
        form.handle(Action::Confirm);
        let FormCommand::Submit(request) = form.handle(Action::Confirm) else {
            panic!("expected submit");
        };
        assert_eq!(request.title, None);
    }

    #[test]
    fn no_repositories_reports_error() {
        let mut form = CreateForm::new(context(&[]));
        form.handle(Action::Confirm);
        assert_eq!(form.handle(Action::Confirm), FormCommand::None);
        assert!(form.error().is_some());
    }

    #[test]
    fn success_hands_off_run_created() {
        let ctx = context(&["alpha"]);
        let mut form = CreateForm::new(ctx.clone());
        form.handle(Action::Confirm);
        form.handle(Action::Confirm);
        let now = Utc::now();
        let run = RunSnapshot {
            id: 77,
            title: None,
            status: RunStatus::Queued,
            repository: RepositoryRef {
                name: Some("alpha".into()),
                id: Some(1),
            },
            created_at: now,
            updated_at: now,
            created_by: None,
            message: None,
        };
        assert!(form.finish(LoadOutcome::Loaded(run)));
        assert_eq!(ctx.take_run_created(), Some((77, "alpha".to_string())));
    }

    #[test]
    fn failure_keeps_form_open() {
        let ctx = context(&["alpha"]);
        let mut form = CreateForm::new(ctx.clone());
        form.handle(Action::Confirm);
        form.handle(Action::Confirm);
        assert!(!form.finish(LoadOutcome::Exhausted("HTTP 400: bad title".into())));
        assert_eq!(form.error(), Some("HTTP 400: bad title"));
        assert!(!form.is_submitting());
        assert!(ctx.get(NavKey::RunCreated).is_none());
    }

    #[test]
    fn cancel_and_quit() {
        let mut form = CreateForm::new(context(&["alpha"]));
        type_title(&mut form, "q");
        assert_eq!(form.title(), "");
        assert_eq!(form.handle(Action::Cancel), FormCommand::Cancel);
        assert_eq!(form.handle(Action::Quit), FormCommand::Quit);
    }
}
