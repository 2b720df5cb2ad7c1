//! Add-opportunity wizard.
//!
//! The flow is a single tagged state:
//!
//! ```text
//! Type → Organization(Select | New | View | Suggest) → Details → Auth → Done
//! ```
//!
//! Transitions are driven by [`WizardAction`]s. Nothing is validated on the
//! way through: required markers are advisory and every forward step is
//! allowed with blank fields. Actions that make no sense in the current
//! step are rejected without touching state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::draft::{
    DetailField, ImageRef, OpportunityDetailsForm, OpportunityKind, OrgField, OrganizationChoice,
    OrganizationForm, WizardDraft,
};
use crate::models::Organization;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgView {
    Select,
    New,
    View(String),
    Suggest(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    Type,
    Organization(OrgView),
    Details,
    Auth,
    Done { reset_at: Instant },
}

impl WizardStep {
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::Type => "type",
            WizardStep::Organization(OrgView::Select) => "organization/select",
            WizardStep::Organization(OrgView::New) => "organization/new",
            WizardStep::Organization(OrgView::View(_)) => "organization/view",
            WizardStep::Organization(OrgView::Suggest(_)) => "organization/suggest",
            WizardStep::Details => "details",
            WizardStep::Auth => "auth",
            WizardStep::Done { .. } => "done",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
    SelectKind(OpportunityKind),
    Next,
    Back,
    ChooseOrganization(String),
    AddNewOrganization,
    SuggestChanges,
    SetOrganizationField(OrgField, String),
    SelectLogo(PathBuf),
    SelectCover(PathBuf),
    SubmitOrganization,
    SetDetail(DetailField, String),
    SetContact(String),
    Submit,
}

impl WizardAction {
    pub fn name(&self) -> &'static str {
        match self {
            WizardAction::SelectKind(_) => "select kind",
            WizardAction::Next => "continue",
            WizardAction::Back => "go back",
            WizardAction::ChooseOrganization(_) => "choose an organization",
            WizardAction::AddNewOrganization => "add an organization",
            WizardAction::SuggestChanges => "suggest changes",
            WizardAction::SetOrganizationField(..) => "edit organization fields",
            WizardAction::SelectLogo(_) => "select a logo",
            WizardAction::SelectCover(_) => "select a cover image",
            WizardAction::SubmitOrganization => "submit the organization",
            WizardAction::SetDetail(..) => "edit opportunity details",
            WizardAction::SetContact(_) => "set contact details",
            WizardAction::Submit => "submit",
        }
    }
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("cannot {action} at step '{step}'")]
    InvalidAction { action: &'static str, step: &'static str },

    #[error("unknown organization '{0}'")]
    UnknownOrganization(String),

    #[error(transparent)]
    Image(#[from] crate::error::Error),
}

/// Record emitted when the flow completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunitySubmission {
    pub kind: OpportunityKind,
    pub listing_type: crate::models::OpportunityType,
    pub organization: Option<OrganizationChoice>,
    pub details: BTreeMap<DetailField, String>,
    pub contact_email: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Receiver of completed submissions.
pub trait SubmissionSink {
    fn submit(&mut self, submission: &OpportunitySubmission) -> crate::error::Result<()>;
}

/// Writes each submission as one JSON document.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SubmissionSink for JsonSink<W> {
    fn submit(&mut self, submission: &OpportunitySubmission) -> crate::error::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, submission)?;
        writeln!(self.out)?;
        Ok(())
    }
}

pub struct Wizard<'a> {
    organizations: &'a [Organization],
    step: WizardStep,
    draft: WizardDraft,
    reset_delay: Duration,
}

impl<'a> Wizard<'a> {
    pub fn new(organizations: &'a [Organization], reset_delay: Duration) -> Self {
        Self {
            organizations,
            step: WizardStep::Type,
            draft: WizardDraft::default(),
            reset_delay,
        }
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    pub fn organizations(&self) -> &'a [Organization] {
        self.organizations
    }

    /// At the first step with an untouched draft.
    pub fn is_pristine(&self) -> bool {
        self.step == WizardStep::Type && self.draft == WizardDraft::default()
    }

    fn organization(&self, id: &str) -> Result<&'a Organization, WizardError> {
        self.organizations
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| WizardError::UnknownOrganization(id.to_string()))
    }

    /// Apply one action. Returns the submission when the flow completes.
    pub fn apply(
        &mut self,
        action: WizardAction,
        now: Instant,
    ) -> Result<Option<OpportunitySubmission>, WizardError> {
        let invalid = WizardError::InvalidAction {
            action: action.name(),
            step: self.step.name(),
        };

        let next = match (&self.step, action) {
            (WizardStep::Done { .. }, _) => return Err(invalid),

            (WizardStep::Organization(OrgView::View(_) | OrgView::New | OrgView::Suggest(_)), WizardAction::Back) => {
                // Backing out of an organization abandons it.
                self.draft.choice = None;
                self.draft.organization = OrganizationForm::default();
                WizardStep::Organization(OrgView::Select)
            }
            (_, WizardAction::Back) => self.back_target(),

            (WizardStep::Type, WizardAction::SelectKind(kind)) => {
                // Switching kind discards every detail entered so far.
                self.draft.kind = kind;
                self.draft.details = OpportunityDetailsForm::empty_for(kind);
                WizardStep::Type
            }
            (WizardStep::Type, WizardAction::Next) => WizardStep::Organization(OrgView::Select),

            (WizardStep::Organization(OrgView::Select), WizardAction::ChooseOrganization(id))
            | (WizardStep::Organization(OrgView::View(_)), WizardAction::ChooseOrganization(id)) => {
                let org = self.organization(&id)?;
                self.draft.organization = OrganizationForm::from_organization(org);
                self.draft.choice = Some(OrganizationChoice::Existing { id: id.clone() });
                WizardStep::Organization(OrgView::View(id))
            }
            (WizardStep::Organization(OrgView::Select), WizardAction::AddNewOrganization) => {
                self.draft.choice = None;
                self.draft.organization = OrganizationForm::default();
                WizardStep::Organization(OrgView::New)
            }
            (WizardStep::Organization(OrgView::Select), WizardAction::Next)
            | (WizardStep::Organization(OrgView::View(_)), WizardAction::Next) => WizardStep::Details,
            (WizardStep::Organization(OrgView::View(id)), WizardAction::SuggestChanges) => {
                WizardStep::Organization(OrgView::Suggest(id.clone()))
            }
            (
                WizardStep::Organization(OrgView::New | OrgView::Suggest(_)),
                WizardAction::SetOrganizationField(field, value),
            ) => {
                self.draft.organization.set(field, value);
                self.step.clone()
            }
            (WizardStep::Organization(OrgView::New | OrgView::Suggest(_)), WizardAction::SelectLogo(path)) => {
                self.draft.organization.logo = Some(ImageRef::local(&path)?);
                self.step.clone()
            }
            (WizardStep::Organization(OrgView::New | OrgView::Suggest(_)), WizardAction::SelectCover(path)) => {
                self.draft.organization.cover = Some(ImageRef::local(&path)?);
                self.step.clone()
            }
            (
                WizardStep::Organization(view @ (OrgView::New | OrgView::Suggest(_))),
                WizardAction::SubmitOrganization | WizardAction::Next,
            ) => {
                let organization = self.draft.organization.clone();
                self.draft.choice = Some(match view {
                    OrgView::Suggest(id) => OrganizationChoice::Suggested {
                        id: id.clone(),
                        changes: organization,
                    },
                    _ => OrganizationChoice::New { organization },
                });
                tracing::debug!("organization submitted, returning to select");
                // Back to Select, which immediately advances.
                WizardStep::Details
            }

            (WizardStep::Details, WizardAction::SetDetail(field, value)) => {
                self.draft.details.set(field, value);
                WizardStep::Details
            }
            (WizardStep::Details, WizardAction::Next) => {
                let missing = self.draft.details.missing_required(self.draft.kind);
                if !missing.is_empty() {
                    tracing::debug!(?missing, "continuing with blank required fields");
                }
                WizardStep::Auth
            }

            (WizardStep::Auth, WizardAction::SetContact(email)) => {
                self.draft.contact_email = email;
                WizardStep::Auth
            }
            (WizardStep::Auth, WizardAction::Submit) => {
                let submission = self.submission();
                tracing::info!(kind = %submission.kind, "opportunity submitted");
                self.step = WizardStep::Done {
                    reset_at: now + self.reset_delay,
                };
                return Ok(Some(submission));
            }

            _ => return Err(invalid),
        };

        if next != self.step {
            tracing::debug!(from = %self.step, to = %next, "wizard transition");
        }
        self.step = next;
        Ok(None)
    }

    fn back_target(&self) -> WizardStep {
        match &self.step {
            WizardStep::Type => WizardStep::Type,
            WizardStep::Organization(OrgView::Select) => WizardStep::Type,
            WizardStep::Organization(_) => WizardStep::Organization(OrgView::Select),
            WizardStep::Details => WizardStep::Organization(OrgView::Select),
            WizardStep::Auth => WizardStep::Details,
            WizardStep::Done { reset_at } => WizardStep::Done { reset_at: *reset_at },
        }
    }

    fn submission(&self) -> OpportunitySubmission {
        let contact = self.draft.contact_email.trim();
        OpportunitySubmission {
            kind: self.draft.kind,
            listing_type: self.draft.kind.listing_type(),
            organization: self.draft.choice.clone(),
            details: self.draft.details.scoped(self.draft.kind),
            contact_email: (!contact.is_empty()).then(|| contact.to_string()),
            submitted_at: Utc::now(),
        }
    }

    /// When the completion delay has elapsed, return to a fresh wizard.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.step {
            WizardStep::Done { reset_at } if now >= reset_at => {
                self.step = WizardStep::Type;
                self.draft = WizardDraft::default();
                tracing::debug!("wizard reset");
                true
            }
            _ => false,
        }
    }

    /// Time left before the reset, if completed.
    pub fn reset_remaining(&self, now: Instant) -> Option<Duration> {
        match self.step {
            WizardStep::Done { reset_at } => Some(reset_at.saturating_duration_since(now)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;

    fn wizard(store: &EntityStore) -> Wizard<'_> {
        Wizard::new(store.organizations(), Duration::from_millis(2500))
    }

    #[test]
    fn test_back_from_sub_state_collapses_to_select() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::ChooseOrganization("gitcoin".into()), now).unwrap();
        w.apply(WizardAction::SuggestChanges, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Organization(OrgView::Suggest("gitcoin".into())));

        w.apply(WizardAction::Back, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Organization(OrgView::Select));
        w.apply(WizardAction::Back, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Type);
        w.apply(WizardAction::Back, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Type);
    }

    #[test]
    fn test_backing_out_discards_organization_choice() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::ChooseOrganization("gitcoin".into()), now).unwrap();
        w.apply(WizardAction::Back, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Organization(OrgView::Select));
        assert!(w.draft().choice.is_none());

        w.apply(WizardAction::AddNewOrganization, now).unwrap();
        w.apply(WizardAction::Back, now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Details);
        assert!(w.draft().choice.is_none());
        assert_eq!(w.draft().organization, OrganizationForm::default());

        w.apply(WizardAction::Next, now).unwrap();
        let submission = w.apply(WizardAction::Submit, now).unwrap().unwrap();
        assert!(submission.organization.is_none());
    }

    #[test]
    fn test_add_new_replaces_earlier_choice() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::ChooseOrganization("yearn".into()), now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::Back, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Organization(OrgView::Select));

        w.apply(WizardAction::AddNewOrganization, now).unwrap();
        assert!(w.draft().choice.is_none());
        w.apply(WizardAction::SetOrganizationField(OrgField::Name, "Fresh DAO".into()), now)
            .unwrap();
        w.apply(WizardAction::SubmitOrganization, now).unwrap();
        assert!(matches!(
            &w.draft().choice,
            Some(OrganizationChoice::New { organization }) if organization.name == "Fresh DAO"
        ));
    }

    #[test]
    fn test_new_organization_auto_advances() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::AddNewOrganization, now).unwrap();
        w.apply(WizardAction::SetOrganizationField(OrgField::Name, "Protocol Guild".into()), now)
            .unwrap();
        w.apply(WizardAction::SelectLogo(PathBuf::from("/tmp/guild.png")), now).unwrap();
        w.apply(WizardAction::SubmitOrganization, now).unwrap();

        assert_eq!(w.step(), &WizardStep::Details);
        match &w.draft().choice {
            Some(OrganizationChoice::New { organization }) => {
                assert_eq!(organization.name, "Protocol Guild");
                assert_eq!(
                    organization.logo.as_ref().map(|l| l.url.as_str()),
                    Some("file:///tmp/guild.png")
                );
            }
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn test_suggested_changes_recorded() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::ChooseOrganization("scroll".into()), now).unwrap();
        w.apply(WizardAction::SuggestChanges, now).unwrap();
        assert_eq!(w.draft().organization.name, "Scroll");
        w.apply(WizardAction::SetOrganizationField(OrgField::Twitter, "https://x.com/scroll_zkp".into()), now)
            .unwrap();
        w.apply(WizardAction::Next, now).unwrap();

        assert_eq!(w.step(), &WizardStep::Details);
        assert!(matches!(
            &w.draft().choice,
            Some(OrganizationChoice::Suggested { id, changes }) if id == "scroll" && changes.twitter.contains("scroll_zkp")
        ));
    }

    #[test]
    fn test_invalid_actions_leave_state() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        let err = w.apply(WizardAction::Submit, now).unwrap_err();
        assert!(matches!(err, WizardError::InvalidAction { step: "type", .. }));
        assert!(w.is_pristine());

        w.apply(WizardAction::Next, now).unwrap();
        let err = w
            .apply(WizardAction::ChooseOrganization("nope".into()), now)
            .unwrap_err();
        assert!(matches!(err, WizardError::UnknownOrganization(_)));
        assert_eq!(w.step(), &WizardStep::Organization(OrgView::Select));
    }

    #[test]
    fn test_done_rejects_actions_until_reset() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        assert_eq!(w.step(), &WizardStep::Auth);
        assert!(w.apply(WizardAction::Submit, now).unwrap().is_some());

        assert!(w.apply(WizardAction::Back, now).is_err());
        assert!(!w.tick(now + Duration::from_millis(2499)));
        assert_eq!(w.reset_remaining(now), Some(Duration::from_millis(2500)));
        assert!(w.tick(now + Duration::from_millis(2500)));
        assert!(w.is_pristine());
    }

    #[test]
    fn test_json_sink_writes_submission() {
        let store = EntityStore::bundled().unwrap();
        let mut w = wizard(&store);
        let now = Instant::now();
        w.apply(WizardAction::SelectKind(OpportunityKind::Bounty), now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        w.apply(WizardAction::SetDetail(DetailField::Reward, "500 USDC".into()), now).unwrap();
        w.apply(WizardAction::Next, now).unwrap();
        let submission = w.apply(WizardAction::Submit, now).unwrap().unwrap();

        let mut sink = JsonSink::new(Vec::new());
        sink.submit(&submission).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(json["kind"], "bounties");
        assert_eq!(json["listing_type"], "bounty");
        assert_eq!(json["details"]["reward"], "500 USDC");
    }
}
