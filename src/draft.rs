//! Forms collected by the add-opportunity wizard.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{OpportunityType, Organization, slug_enum};

slug_enum! {
    OpportunityKind {
        Job => "jobs" | "job",
        Grant => "grants" | "grant",
        Bounty => "bounties" | "bounty",
        Hackathon => "hackathons" | "hackathon",
        Volunteer => "volunteer" | "volunteering",
        Investment => "investments" | "investment",
        Other => "other",
    }
}

impl Default for OpportunityKind {
    fn default() -> Self {
        OpportunityKind::Job
    }
}

slug_enum! {
    /// Superset of opportunity detail fields; each kind exposes a subset.
    DetailField {
        Title => "title",
        Description => "description",
        Location => "location",
        RemoteOk => "remote",
        Salary => "salary",
        EmploymentType => "employment-type",
        Experience => "experience",
        Skills => "skills",
        FundingAmount => "funding-amount",
        FundingAreas => "funding-areas",
        Eligibility => "eligibility",
        Reward => "reward",
        Difficulty => "difficulty",
        PrizePool => "prize-pool",
        StartDate => "start-date",
        EndDate => "end-date",
        Commitment => "commitment",
        Stage => "stage",
        TicketSize => "ticket-size",
        Contact => "contact",
        ApplyUrl => "apply-url",
        Deadline => "deadline",
    }
}

impl OpportunityKind {
    pub fn label(self) -> &'static str {
        match self {
            OpportunityKind::Job => "Job",
            OpportunityKind::Grant => "Grant",
            OpportunityKind::Bounty => "Bounty",
            OpportunityKind::Hackathon => "Hackathon",
            OpportunityKind::Volunteer => "Volunteer",
            OpportunityKind::Investment => "Investment",
            OpportunityKind::Other => "Other",
        }
    }

    /// Listing category the submission will appear under.
    pub fn listing_type(self) -> OpportunityType {
        match self {
            OpportunityKind::Job => OpportunityType::Job,
            OpportunityKind::Grant => OpportunityType::Grant,
            OpportunityKind::Bounty => OpportunityType::Bounty,
            _ => OpportunityType::Project,
        }
    }

    pub fn detail_fields(self) -> &'static [DetailField] {
        use DetailField::*;
        match self {
            OpportunityKind::Job => &[
                Title, Description, Location, RemoteOk, Salary, EmploymentType, Experience,
                Skills, ApplyUrl, Deadline,
            ],
            OpportunityKind::Grant => &[
                Title, Description, FundingAmount, FundingAreas, Eligibility, ApplyUrl, Deadline,
            ],
            OpportunityKind::Bounty => &[
                Title, Description, Reward, Difficulty, Skills, ApplyUrl, Deadline,
            ],
            OpportunityKind::Hackathon => &[
                Title, Description, Location, PrizePool, StartDate, EndDate, ApplyUrl,
            ],
            OpportunityKind::Volunteer => &[
                Title, Description, Location, Commitment, Skills, Contact,
            ],
            OpportunityKind::Investment => &[
                Title, Description, Stage, TicketSize, FundingAreas, Contact, ApplyUrl,
            ],
            OpportunityKind::Other => &[Title, Description, Location, Contact, ApplyUrl],
        }
    }

    /// Fields marked required in the form. Advisory only.
    pub fn required_fields(self) -> &'static [DetailField] {
        use DetailField::*;
        match self {
            OpportunityKind::Job => &[Title, Description, EmploymentType],
            OpportunityKind::Grant => &[Title, Description, FundingAmount],
            OpportunityKind::Bounty => &[Title, Description, Reward],
            OpportunityKind::Hackathon => &[Title, Description, StartDate],
            OpportunityKind::Investment => &[Title, Description, Stage],
            OpportunityKind::Volunteer | OpportunityKind::Other => &[Title, Description],
        }
    }

    pub fn has_field(self, field: DetailField) -> bool {
        self.detail_fields().contains(&field)
    }
}

impl DetailField {
    pub fn label(self) -> &'static str {
        match self {
            DetailField::Title => "Title",
            DetailField::Description => "Description",
            DetailField::Location => "Location",
            DetailField::RemoteOk => "Remote friendly (yes/no)",
            DetailField::Salary => "Salary range",
            DetailField::EmploymentType => "Employment type",
            DetailField::Experience => "Experience level",
            DetailField::Skills => "Skills",
            DetailField::FundingAmount => "Funding amount",
            DetailField::FundingAreas => "Funding areas",
            DetailField::Eligibility => "Eligibility",
            DetailField::Reward => "Reward",
            DetailField::Difficulty => "Difficulty",
            DetailField::PrizePool => "Prize pool",
            DetailField::StartDate => "Start date",
            DetailField::EndDate => "End date",
            DetailField::Commitment => "Time commitment",
            DetailField::Stage => "Stage",
            DetailField::TicketSize => "Ticket size",
            DetailField::Contact => "Contact",
            DetailField::ApplyUrl => "Application link",
            DetailField::Deadline => "Deadline",
        }
    }
}

/// Locally selected image; referenced by `file://` URL, never uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub url: String,
}

impl ImageRef {
    pub fn local(path: &Path) -> Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let url = url::Url::from_file_path(&absolute)
            .map_err(|_| Error::parse(format!("cannot reference image {}", absolute.display())))?;
        Ok(Self {
            path: absolute,
            url: url.to_string(),
        })
    }
}

slug_enum! {
    OrgField {
        Name => "name",
        Description => "description",
        Website => "website",
        Twitter => "twitter",
        Category => "category",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrganizationForm {
    pub name: String,
    pub description: String,
    pub website: String,
    pub twitter: String,
    pub category: String,
    pub logo: Option<ImageRef>,
    pub cover: Option<ImageRef>,
}

impl OrganizationForm {
    /// Prefill from an existing record (for suggesting changes).
    pub fn from_organization(org: &Organization) -> Self {
        Self {
            name: org.name.clone(),
            description: org.description.clone(),
            website: org.website.clone().unwrap_or_default(),
            twitter: org.twitter.clone().unwrap_or_default(),
            category: org.category.clone().unwrap_or_default(),
            logo: None,
            cover: None,
        }
    }

    pub fn get(&self, field: OrgField) -> &str {
        match field {
            OrgField::Name => &self.name,
            OrgField::Description => &self.description,
            OrgField::Website => &self.website,
            OrgField::Twitter => &self.twitter,
            OrgField::Category => &self.category,
        }
    }

    pub fn set(&mut self, field: OrgField, value: String) {
        let slot = match field {
            OrgField::Name => &mut self.name,
            OrgField::Description => &mut self.description,
            OrgField::Website => &mut self.website,
            OrgField::Twitter => &mut self.twitter,
            OrgField::Category => &mut self.category,
        };
        *slot = value;
    }
}

/// Detail values keyed by field. Holds an entry for every field of the
/// kind it was created for; values for other fields may be set but are
/// dropped by [`OpportunityDetailsForm::scoped`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityDetailsForm {
    values: BTreeMap<DetailField, String>,
}

impl OpportunityDetailsForm {
    pub fn empty_for(kind: OpportunityKind) -> Self {
        Self {
            values: kind
                .detail_fields()
                .iter()
                .map(|field| (*field, String::new()))
                .collect(),
        }
    }

    pub fn get(&self, field: DetailField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: DetailField, value: String) {
        self.values.insert(field, value);
    }

    /// Non-empty values relevant to `kind`.
    pub fn scoped(&self, kind: OpportunityKind) -> BTreeMap<DetailField, String> {
        self.values
            .iter()
            .filter(|(field, value)| kind.has_field(**field) && !value.trim().is_empty())
            .map(|(field, value)| (*field, value.trim().to_string()))
            .collect()
    }

    /// Required fields still blank. Informational; nothing blocks on it.
    pub fn missing_required(&self, kind: OpportunityKind) -> Vec<DetailField> {
        kind.required_fields()
            .iter()
            .copied()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }
}

impl Default for OpportunityDetailsForm {
    fn default() -> Self {
        Self::empty_for(OpportunityKind::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum OrganizationChoice {
    Existing { id: String },
    New { organization: OrganizationForm },
    Suggested { id: String, changes: OrganizationForm },
}

/// Everything the wizard accumulates before submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardDraft {
    pub kind: OpportunityKind,
    pub organization: OrganizationForm,
    pub choice: Option<OrganizationChoice>,
    pub details: OpportunityDetailsForm,
    pub contact_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_title_and_description() {
        for kind in OpportunityKind::ALL {
            assert!(kind.has_field(DetailField::Title));
            assert!(kind.has_field(DetailField::Description));
            for required in kind.required_fields() {
                assert!(kind.has_field(*required), "{} requires {}", kind, required);
            }
        }
    }

    #[test]
    fn test_kind_parses_singular_and_plural() {
        assert_eq!("Grants".parse::<OpportunityKind>().unwrap(), OpportunityKind::Grant);
        assert_eq!("bounty".parse::<OpportunityKind>().unwrap(), OpportunityKind::Bounty);
        assert_eq!("employment-type".parse::<DetailField>().unwrap(), DetailField::EmploymentType);
        assert_eq!("twitter".parse::<OrgField>().unwrap(), OrgField::Twitter);
        assert!("gig".parse::<OpportunityKind>().is_err());
    }

    #[test]
    fn test_scoped_drops_irrelevant_and_blank() {
        let mut form = OpportunityDetailsForm::empty_for(OpportunityKind::Grant);
        form.set(DetailField::Title, "  Research grant ".into());
        form.set(DetailField::Salary, "$100k".into());
        let scoped = form.scoped(OpportunityKind::Grant);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[&DetailField::Title], "Research grant");
    }

    #[test]
    fn test_missing_required() {
        let mut form = OpportunityDetailsForm::empty_for(OpportunityKind::Bounty);
        form.set(DetailField::Title, "Fix bug".into());
        assert_eq!(
            form.missing_required(OpportunityKind::Bounty),
            vec![DetailField::Description, DetailField::Reward]
        );
    }

    #[test]
    fn test_local_image_reference() {
        let image = ImageRef::local(Path::new("/tmp/logo.png")).unwrap();
        assert_eq!(image.url, "file:///tmp/logo.png");
    }

    #[test]
    fn test_prefill_from_organization() {
        let org = Organization {
            id: "gitcoin".into(),
            name: "Gitcoin".into(),
            description: "Funding public goods".into(),
            website: Some("https://gitcoin.co".into()),
            twitter: None,
            logo: None,
            category: None,
        };
        let form = OrganizationForm::from_organization(&org);
        assert_eq!(form.get(OrgField::Website), "https://gitcoin.co");
        assert_eq!(form.get(OrgField::Twitter), "");
    }
}
