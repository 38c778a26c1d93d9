//! Upgrade gate: is an upgrade needed, and which source does it target?
//!
//! [`evaluate`] is a pure decision over the project version, the backend's
//! capability and its connected sources. When the answer is ambiguous it
//! defers to [`resolve_target`], which asks the operator.

use tracing::debug;

use stratum_core::{DataSource, ProjectSchemaVersion};

use crate::error::StepError;
use crate::prompt::Prompter;

/// Question shown when several sources could own the migrations.
pub const SELECT_SOURCE_QUESTION: &str =
    "what database does this current migrations / seeds belong to?";

/// Inputs to [`evaluate`].
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub current: ProjectSchemaVersion,
    pub target: ProjectSchemaVersion,
    pub sources: &'a [DataSource],
    pub supports_metadata_v3: bool,
    /// Only the state copy will run; the project version is irrelevant.
    pub state_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    NoUpgradeNeeded,
    AutoSelected(DataSource),
    DisambiguationRequired(Vec<DataSource>),
}

/// Decides whether an upgrade is needed and whether its target is obvious.
pub fn evaluate(input: &GateInput<'_>) -> Result<GateDecision, StepError> {
    if !input.supports_metadata_v3 {
        return Err(StepError::Precondition(format!(
            "config {} is supported only on servers with metadata version >= 3",
            input.target
        )));
    }
    if !input.state_only && !input.current.can_upgrade_to(input.target) {
        debug!(current = %input.current, target = %input.target, "no upgrade needed");
        return Ok(GateDecision::NoUpgradeNeeded);
    }
    match input.sources {
        [] => Err(StepError::NoSourcesFound),
        [only] if only.is_default() => Ok(GateDecision::AutoSelected(only.clone())),
        sources => Ok(GateDecision::DisambiguationRequired(sources.to_vec())),
    }
}

/// Turns a gate decision into a concrete target source.
///
/// An `explicit` name wins over both auto-selection and prompting, but must
/// be one of the connected sources. Returns `Ok(None)` only for
/// [`GateDecision::NoUpgradeNeeded`].
pub fn resolve_target<P: Prompter + ?Sized>(
    decision: GateDecision,
    explicit: Option<&DataSource>,
    sources: &[DataSource],
    prompter: &P,
) -> Result<Option<DataSource>, StepError> {
    if decision == GateDecision::NoUpgradeNeeded {
        return Ok(None);
    }
    if let Some(explicit) = explicit {
        if !sources.contains(explicit) {
            return Err(StepError::Precondition(format!(
                "database '{}' is not connected to the server",
                explicit
            )));
        }
        return Ok(Some(explicit.clone()));
    }
    match decision {
        GateDecision::NoUpgradeNeeded => Ok(None),
        GateDecision::AutoSelected(source) => Ok(Some(source)),
        GateDecision::DisambiguationRequired(candidates) => {
            let options: Vec<String> = candidates.iter().map(|s| s.name().to_string()).collect();
            let answer = prompter
                .select_one(SELECT_SOURCE_QUESTION, &options)
                .map_err(StepError::Prompt)?;
            let chosen = answer
                .and_then(|name| candidates.iter().find(|s| s.name() == name).cloned());
            chosen
                .map(Some)
                .ok_or(StepError::AmbiguousTarget {
                    sources: candidates,
                })
        }
    }
}

/// Refuses to operate on a project whose layout lags the server.
///
/// Other commands call this before touching migrations: a v1 project must
/// first move to v2, and a v2 project attached to anything but a single
/// `default` source must run the v3 upgrade.
pub fn check_layout_is_current(
    current: ProjectSchemaVersion,
    sources: &[DataSource],
    supports_metadata_v3: bool,
) -> Result<(), StepError> {
    if !supports_metadata_v3 {
        return Ok(());
    }
    if current <= ProjectSchemaVersion::V1 {
        return Err(StepError::Precondition(
            "config v1 is deprecated, upgrade the project to config v2 first".to_string(),
        ));
    }
    if current >= ProjectSchemaVersion::V3 {
        return Ok(());
    }
    match sources {
        [] => Err(StepError::NoSourcesFound),
        [only] if only.is_default() => Ok(()),
        _ => Err(StepError::Precondition(
            "the server has multiple databases, run `stratum update-project-v3` to update the project layout"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;

    use super::*;

    struct CountingPrompter {
        answer: Option<String>,
        selects: Cell<usize>,
    }

    impl CountingPrompter {
        fn answering(answer: Option<&str>) -> Self {
            CountingPrompter {
                answer: answer.map(str::to_string),
                selects: Cell::new(0),
            }
        }
    }

    impl Prompter for CountingPrompter {
        fn confirm(&self, _question: &str) -> io::Result<bool> {
            Ok(true)
        }

        fn select_one(&self, _question: &str, _options: &[String]) -> io::Result<Option<String>> {
            self.selects.set(self.selects.get() + 1);
            Ok(self.answer.clone())
        }
    }

    fn sources(names: &[&str]) -> Vec<DataSource> {
        names.iter().map(|n| DataSource::new(*n).unwrap()).collect()
    }

    fn input(current: ProjectSchemaVersion, sources: &[DataSource]) -> GateInput<'_> {
        GateInput {
            current,
            target: ProjectSchemaVersion::V3,
            sources,
            supports_metadata_v3: true,
            state_only: false,
        }
    }

    #[test]
    fn unsupported_server_fails() {
        let srcs = sources(&["default"]);
        let mut gate = input(ProjectSchemaVersion::V2, &srcs);
        gate.supports_metadata_v3 = false;
        assert!(matches!(evaluate(&gate), Err(StepError::Precondition(_))));
    }

    #[test]
    fn current_project_needs_no_upgrade() {
        let srcs = sources(&["a", "b"]);
        assert_eq!(
            evaluate(&input(ProjectSchemaVersion::V3, &srcs)).unwrap(),
            GateDecision::NoUpgradeNeeded
        );
    }

    #[test]
    fn zero_sources_fail() {
        assert!(matches!(
            evaluate(&input(ProjectSchemaVersion::V2, &[])),
            Err(StepError::NoSourcesFound)
        ));
    }

    #[test]
    fn single_default_source_is_auto_selected_without_prompting() {
        let srcs = sources(&["default"]);
        let decision = evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap();
        assert_eq!(decision, GateDecision::AutoSelected(DataSource::default_source()));

        let prompter = CountingPrompter::answering(Some("default"));
        let target = resolve_target(decision, None, &srcs, &prompter).unwrap();
        assert_eq!(target, Some(DataSource::default_source()));
        assert_eq!(prompter.selects.get(), 0);
    }

    #[test]
    fn single_custom_source_requires_disambiguation() {
        let srcs = sources(&["pg"]);
        assert_eq!(
            evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap(),
            GateDecision::DisambiguationRequired(srcs.clone())
        );
    }

    #[test]
    fn multiple_sources_prompt_exactly_once() {
        let srcs = sources(&["default", "analytics"]);
        let decision = evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap();
        let prompter = CountingPrompter::answering(Some("analytics"));
        let target = resolve_target(decision, None, &srcs, &prompter).unwrap();
        assert_eq!(target, Some(DataSource::new("analytics").unwrap()));
        assert_eq!(prompter.selects.get(), 1);
    }

    #[test]
    fn unanswered_prompt_is_ambiguous() {
        let srcs = sources(&["a", "b"]);
        let decision = evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap();
        let prompter = CountingPrompter::answering(None);
        let err = resolve_target(decision, None, &srcs, &prompter).unwrap_err();
        assert!(matches!(err, StepError::AmbiguousTarget { ref sources } if sources.len() == 2));
    }

    #[test]
    fn answer_outside_options_is_ambiguous() {
        let srcs = sources(&["a", "b"]);
        let decision = evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap();
        let prompter = CountingPrompter::answering(Some("c"));
        assert!(matches!(
            resolve_target(decision, None, &srcs, &prompter),
            Err(StepError::AmbiguousTarget { .. })
        ));
    }

    #[test]
    fn explicit_target_skips_prompt_but_must_be_connected() {
        let srcs = sources(&["a", "b"]);
        let decision = evaluate(&input(ProjectSchemaVersion::V2, &srcs)).unwrap();
        let prompter = CountingPrompter::answering(None);
        let b = DataSource::new("b").unwrap();
        assert_eq!(
            resolve_target(decision.clone(), Some(&b), &srcs, &prompter).unwrap(),
            Some(b)
        );
        assert_eq!(prompter.selects.get(), 0);

        let c = DataSource::new("c").unwrap();
        assert!(matches!(
            resolve_target(decision, Some(&c), &srcs, &prompter),
            Err(StepError::Precondition(_))
        ));
    }

    #[test]
    fn state_only_ignores_current_version() {
        let srcs = sources(&["default"]);
        let mut gate = input(ProjectSchemaVersion::V3, &srcs);
        gate.state_only = true;
        assert_eq!(
            evaluate(&gate).unwrap(),
            GateDecision::AutoSelected(DataSource::default_source())
        );
    }

    #[test]
    fn layout_check_matches_upgrade_rules() {
        let default = sources(&["default"]);
        let many = sources(&["default", "b"]);
        assert!(check_layout_is_current(ProjectSchemaVersion::V2, &default, true).is_ok());
        assert!(check_layout_is_current(ProjectSchemaVersion::V3, &many, true).is_ok());
        assert!(check_layout_is_current(ProjectSchemaVersion::V2, &many, false).is_ok());
        assert!(matches!(
            check_layout_is_current(ProjectSchemaVersion::V1, &default, true),
            Err(StepError::Precondition(_))
        ));
        assert!(matches!(
            check_layout_is_current(ProjectSchemaVersion::V2, &many, true),
            Err(StepError::Precondition(_))
        ));
        assert!(matches!(
            check_layout_is_current(ProjectSchemaVersion::V2, &[], true),
            Err(StepError::NoSourcesFound)
        ));
    }
}
