//! Command-driven session state machine.
//!
//! ```text
//! NoComponentSelected --select--> FormBound --submit--> Rendered
//!        Rendered --set--> FormBound       (form diverges from output)
//!        any bound state --select--> FormBound (old form discarded)
//! ```
//!
//! Every failed command is posted as an error notification before it is
//! returned to the caller.

use crate::catalog::ComponentCatalog;
use crate::data::Dataset;
use crate::dispatch::{Dispatcher, PendingRender, RenderOutcome, RenderRequest};
use crate::error::{Result, VizError};
use crate::form::{FormBinder, FormModel};
use crate::introspect::{ColumnManifest, Introspector};
use crate::notification::Notifications;
use crate::scene::Scene;
use crate::schema::Value;
use crate::surface::SurfaceAdapter;
use serde::Serialize;
use std::error::Error as _;
use std::fmt;
use std::sync::Arc;

/// Discrete user commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectComponent(String),
    SetValue { key: String, value: Option<Value> },
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NoComponentSelected,
    FormBound,
    Rendered,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoComponentSelected => "NoComponentSelected",
            Self::FormBound => "FormBound",
            Self::Rendered => "Rendered",
        };
        f.write_str(name)
    }
}

/// Error message including every source in the chain.
pub fn describe_error(err: &VizError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub struct Session {
    catalog: Arc<ComponentCatalog>,
    introspector: Introspector,
    dispatcher: Dispatcher,
    dataset: Option<Arc<Dataset>>,
    manifest: Option<Arc<ColumnManifest>>,
    form: Option<FormBinder>,
    state: SessionState,
    notifications: Notifications,
}

impl Session {
    pub fn new(catalog: Arc<ComponentCatalog>, introspector: Introspector) -> Self {
        Self {
            catalog,
            introspector,
            dispatcher: Dispatcher::new(),
            dataset: None,
            manifest: None,
            form: None,
            state: SessionState::NoComponentSelected,
            notifications: Notifications::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    pub fn manifest(&self) -> Option<&Arc<ColumnManifest>> {
        self.manifest.as_ref()
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn form(&self) -> Option<&FormModel> {
        self.form.as_ref().map(FormBinder::model)
    }

    pub fn binder(&self) -> Option<&FormBinder> {
        self.form.as_ref()
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    /// Introspect and adopt a dataset. A bound form is rebuilt against the
    /// new manifest.
    pub fn upload(&mut self, dataset: Dataset) -> Result<Arc<ColumnManifest>> {
        let manifest = match self.introspector.introspect(&dataset, &mut self.notifications) {
            Ok(manifest) => manifest,
            Err(err) => return Err(self.report(err)),
        };
        tracing::info!(dataset = %dataset.id, columns = manifest.columns.len(), "dataset uploaded");

        self.dataset = Some(Arc::new(dataset));
        self.manifest = Some(Arc::clone(&manifest));

        if let Some(binder) = self.form.take() {
            self.dispatcher.invalidate();
            self.form = Some(FormBinder::bind(Arc::clone(binder.descriptor()), Arc::clone(&manifest)));
            self.state = SessionState::FormBound;
        }
        Ok(manifest)
    }

    /// Run one command. Submits render synchronously.
    pub fn apply(&mut self, command: Command, surface: &mut dyn SurfaceAdapter) -> Result<()> {
        match command {
            Command::SelectComponent(name) => self.select_component(&name).map(|_| ()),
            Command::SetValue { key, value } => self.set_value(&key, value),
            Command::Submit => self.submit(surface).map(|_| ()),
        }
    }

    pub fn apply_all(&mut self, commands: Vec<Command>, surface: &mut dyn SurfaceAdapter) -> Result<()> {
        for command in commands {
            self.apply(command, surface)?;
        }
        Ok(())
    }

    /// Bind a fresh form for `name`, discarding the current one entirely.
    pub fn select_component(&mut self, name: &str) -> Result<&FormModel> {
        let result = self.bind_component(name);
        match result {
            Ok(binder) => {
                self.dispatcher.invalidate();
                tracing::info!(
                    component = name,
                    from = %self.state,
                    inputs = binder.model().inputs.len(),
                    "component selected"
                );
                self.state = SessionState::FormBound;
                Ok(self.form.insert(binder).model())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    fn bind_component(&self, name: &str) -> Result<FormBinder> {
        let manifest = self.manifest.as_ref().ok_or_else(|| VizError::InvalidState {
            state: self.state.to_string(),
            reason: "no dataset has been uploaded".to_string(),
        })?;
        let descriptor = self.catalog.get(name)?;
        Ok(FormBinder::bind(descriptor, Arc::clone(manifest)))
    }

    pub fn set_value(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        let result = match self.form.as_mut() {
            Some(binder) => binder.set_value(key, value),
            None => Err(self.no_form()),
        };
        match result {
            Ok(()) => {
                if self.state == SessionState::Rendered {
                    self.state = SessionState::FormBound;
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "value rejected");
                Err(self.report(err))
            }
        }
    }

    pub fn submit(&mut self, surface: &mut dyn SurfaceAdapter) -> Result<RenderOutcome> {
        let pending = self.begin_submit(surface)?;
        let result = match &self.dataset {
            Some(data) => pending.run(data),
            None => Err(anyhow::anyhow!("no dataset has been uploaded")),
        };
        self.complete(pending, result, surface)
    }

    /// Validate the form and start a render. The returned render can be run
    /// against [`Session::dataset`] anywhere, then handed to `complete`.
    pub fn begin_submit(&mut self, surface: &mut dyn SurfaceAdapter) -> Result<PendingRender> {
        let request = match self.form.as_ref() {
            Some(binder) => binder
                .snapshot()
                .map(|values| RenderRequest::new(Arc::clone(binder.descriptor()), values)),
            None => Err(self.no_form()),
        };
        let pending = request.and_then(|request| self.dispatcher.begin(request, surface));
        match pending {
            Ok(pending) => Ok(pending),
            Err(err) => {
                if matches!(err, VizError::Render { .. }) {
                    self.state = SessionState::FormBound;
                }
                Err(self.report(err))
            }
        }
    }

    /// Apply a render completion. Stale completions change nothing.
    pub fn complete(
        &mut self,
        pending: PendingRender,
        result: anyhow::Result<Scene>,
        surface: &mut dyn SurfaceAdapter,
    ) -> Result<RenderOutcome> {
        match self.dispatcher.finish(pending, result, surface) {
            Ok(outcome) => {
                if let RenderOutcome::Rendered { component, .. } = &outcome {
                    self.notifications.info(format!("Rendered {}", component));
                    self.state = SessionState::Rendered;
                }
                Ok(outcome)
            }
            Err(err) => {
                self.state = SessionState::FormBound;
                Err(self.report(err))
            }
        }
    }

    fn no_form(&self) -> VizError {
        VizError::InvalidState {
            state: self.state.to_string(),
            reason: "no component is selected".to_string(),
        }
    }

    fn report(&mut self, err: VizError) -> VizError {
        self.notifications.error(describe_error(&err));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ComponentDescriptor;
    use crate::data::DatasetId;
    use crate::form::FormValues;
    use crate::notification::NotificationKind;
    use crate::scene::Axis;
    use crate::schema::{ColumnType, ParameterSpec};
    use crate::surface::RecordingSurface;

    fn blank(values: &FormValues, _: &Dataset) -> anyhow::Result<Scene> {
        let width = values.number("width").unwrap_or(10.0) as u32;
        Ok(Scene::new(width, 10, Axis::continuous((0.0, 1.0), None), Axis::continuous((0.0, 1.0), None)))
    }

    fn catalog() -> Arc<ComponentCatalog> {
        let mut catalog = ComponentCatalog::new();
        catalog
            .register(ComponentDescriptor::new(
                "Small",
                vec![
                    ParameterSpec::size("width", "Width", 20.0),
                    ParameterSpec::dimension("x", "x").required(),
                ],
                Arc::new(blank),
            ))
            .unwrap();
        catalog
            .register(ComponentDescriptor::new(
                "Large",
                vec![
                    ParameterSpec::size("width", "Width", 30.0),
                    ParameterSpec::dimension("x", "x").required().filter(&[ColumnType::Numeric]),
                    ParameterSpec::dimension("color", "color"),
                ],
                Arc::new(blank),
            ))
            .unwrap();
        Arc::new(catalog)
    }

    fn dataset() -> Dataset {
        Dataset::new(
            DatasetId::new("sales"),
            vec!["region".to_string(), "amount".to_string()],
            vec![
                vec!["N".to_string(), "1".to_string()],
                vec!["S".to_string(), "2".to_string()],
            ],
        )
    }

    fn session() -> Session {
        let mut session = Session::new(catalog(), Introspector::default());
        session.upload(dataset()).unwrap();
        session
    }

    #[test]
    fn test_initial_state() {
        let session = Session::new(catalog(), Introspector::default());
        assert_eq!(session.state(), SessionState::NoComponentSelected);
        assert!(session.form().is_none());
    }

    #[test]
    fn test_select_requires_dataset() {
        let mut session = Session::new(catalog(), Introspector::default());
        let err = session.select_component("Small").unwrap_err();
        assert!(matches!(err, VizError::InvalidState { .. }));
        assert_eq!(session.notifications().errors().count(), 1);
    }

    #[test]
    fn test_switch_replaces_form() {
        let mut session = session();
        assert_eq!(session.select_component("Small").unwrap().inputs.len(), 2);
        session.set_value("x", Some(Value::from("region"))).unwrap();

        assert_eq!(session.select_component("Large").unwrap().inputs.len(), 3);
        assert_eq!(session.binder().unwrap().value("x"), None);
        assert_eq!(session.binder().unwrap().value("width"), Some(&Value::Number(30.0)));
    }

    #[test]
    fn test_unknown_component_reported() {
        let mut session = session();
        let err = session.select_component("Nope").unwrap_err();
        assert!(matches!(err, VizError::NotFound { .. }));
        assert!(session.notifications().errors().any(|m| m.contains("Nope")));
        assert_eq!(session.state(), SessionState::NoComponentSelected);
    }

    #[test]
    fn test_submit_transitions() {
        let mut session = session();
        let mut surface = RecordingSurface::new();
        session.select_component("Small").unwrap();

        let err = session.submit(&mut surface).unwrap_err();
        assert!(matches!(err, VizError::IncompleteForm { .. }));
        assert_eq!(session.state(), SessionState::FormBound);

        session.set_value("x", Some(Value::from("region"))).unwrap();
        assert!(session.submit(&mut surface).unwrap().is_rendered());
        assert_eq!(session.state(), SessionState::Rendered);

        session.set_value("width", Some(Value::Number(40.0))).unwrap();
        assert_eq!(session.state(), SessionState::FormBound);
        session.submit(&mut surface).unwrap();
        assert_eq!(surface.output_count(), 1);
        assert_eq!(surface.scenes()[0].width, 40);
    }

    #[test]
    fn test_rejected_value_notified() {
        let mut session = session();
        session.select_component("Large").unwrap();
        let err = session.set_value("x", Some(Value::from("region"))).unwrap_err();
        assert!(matches!(err, VizError::Validation { .. }));
        assert_eq!(session.notifications().errors().count(), 1);
    }

    #[test]
    fn test_switch_during_render_discards_completion() {
        let mut session = session();
        let mut surface = RecordingSurface::new();
        session.select_component("Small").unwrap();
        session.set_value("x", Some(Value::from("region"))).unwrap();

        let pending = session.begin_submit(&mut surface).unwrap();
        session.select_component("Large").unwrap();
        let data = Arc::clone(session.dataset().unwrap());
        let result = pending.run(&data);
        let outcome = session.complete(pending, result, &mut surface).unwrap();

        assert!(matches!(outcome, RenderOutcome::Stale { .. }));
        assert_eq!(surface.output_count(), 0);
        assert_eq!(session.state(), SessionState::FormBound);
        assert!(!session
            .notifications()
            .iter()
            .any(|n| matches!(n.kind, NotificationKind::Info(_))));
    }

    #[test]
    fn test_apply_commands() {
        let mut session = session();
        let mut surface = RecordingSurface::new();
        session
            .apply_all(
                vec![
                    Command::SelectComponent("Small".to_string()),
                    Command::SetValue {
                        key: "x".to_string(),
                        value: Some(Value::from("amount")),
                    },
                    Command::Submit,
                ],
                &mut surface,
            )
            .unwrap();
        assert_eq!(session.state(), SessionState::Rendered);
        assert_eq!(surface.owners(), vec!["Small"]);
    }

    #[test]
    fn test_upload_rebinds_form() {
        let mut session = session();
        session.select_component("Small").unwrap();
        session.set_value("x", Some(Value::from("region"))).unwrap();

        let other = Dataset::new(
            DatasetId::new("other"),
            vec!["k".to_string()],
            vec![vec!["v".to_string()]],
        );
        session.upload(other).unwrap();
        assert_eq!(session.binder().unwrap().value("x"), None);
        assert_eq!(session.form().unwrap().inputs[1].options(), &["k"]);
    }

    #[test]
    fn test_describe_error_includes_source() {
        let err = VizError::render("Chart", anyhow::anyhow!("bad column"));
        assert_eq!(describe_error(&err), "failed to render 'Chart': bad column");
    }
}
