//! Line-oriented driver for the add-opportunity wizard.
//!
//! Reads answers from any `BufRead` and writes prompts to any `Write`, so
//! the same loop serves the terminal and scripted tests. Entering `<` at a
//! prompt steps back.

use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::draft::{OpportunityKind, OrgField};
use crate::store::search_organizations;
use crate::wizard::{OpportunitySubmission, OrgView, SubmissionSink, Wizard, WizardAction, WizardStep};

const BACK: &str = "<";

struct Prompter<'io, R, W> {
    input: &'io mut R,
    out: &'io mut W,
}

impl<R: BufRead, W: Write> Prompter<'_, R, W> {
    /// Trimmed answer, or `default` when blank.
    fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        if default.is_empty() {
            write!(self.out, "{}: ", label)?;
        } else {
            write!(self.out, "{} [{}]: ", label, default)?;
        }
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).context("Failed to read answer")? == 0 {
            bail!("Input closed before the form was submitted");
        }
        let answer = line.trim();
        Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
    }

    fn say(&mut self, text: impl std::fmt::Display) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }
}

/// Drive `wizard` to completion, hand the submission to `sink`, then wait
/// out the reset delay.
pub fn run_wizard<R, W, S>(
    wizard: &mut Wizard<'_>,
    input: &mut R,
    out: &mut W,
    sink: &mut S,
) -> Result<OpportunitySubmission>
where
    R: BufRead,
    W: Write,
    S: SubmissionSink,
{
    let mut p = Prompter { input, out };
    p.say("Add an opportunity (enter '<' to go back)")?;

    let submission = loop {
        let action = match wizard.step().clone() {
            WizardStep::Type => {
                let kinds: Vec<&str> = OpportunityKind::ALL.iter().map(|k| k.slug()).collect();
                p.say(format!("\nKinds: {}", kinds.join(", ")))?;
                let answer = p.ask("Kind", wizard.draft().kind.slug())?;
                if answer == BACK {
                    WizardAction::Back
                } else {
                    match answer.parse::<OpportunityKind>() {
                        Ok(kind) => {
                            if kind != wizard.draft().kind {
                                wizard.apply(WizardAction::SelectKind(kind), Instant::now())?;
                            }
                            WizardAction::Next
                        }
                        Err(e) => {
                            p.say(e)?;
                            continue;
                        }
                    }
                }
            }

            WizardStep::Organization(OrgView::Select) => {
                let query = p.ask("\nSearch organizations ('+' to add new, '-' to skip)", "")?;
                match query.as_str() {
                    BACK => WizardAction::Back,
                    "-" => WizardAction::Next,
                    "+" => WizardAction::AddNewOrganization,
                    _ => {
                        let matches = search_organizations(wizard.organizations(), &query);
                        if matches.is_empty() {
                            p.say("No organizations found.")?;
                            continue;
                        }
                        for (i, org) in matches.iter().enumerate() {
                            p.say(format!("  {:>2}. {} ({})", i + 1, org.name, org.id))?;
                        }
                        let pick = p.ask("Number", "")?;
                        match pick.parse::<usize>().ok().and_then(|n| matches.get(n.wrapping_sub(1))) {
                            Some(org) => WizardAction::ChooseOrganization(org.id.clone()),
                            None => continue,
                        }
                    }
                }
            }

            WizardStep::Organization(OrgView::View(id)) => {
                let form = &wizard.draft().organization;
                p.say(format!("\n{} ({})", form.name, id))?;
                if !form.description.is_empty() {
                    p.say(textwrap::indent(&textwrap::fill(&form.description, 70), "  "))?;
                }
                match p.ask("Suggest changes? (y/N)", "n")?.to_lowercase().as_str() {
                    BACK => WizardAction::Back,
                    "y" | "yes" => WizardAction::SuggestChanges,
                    _ => WizardAction::Next,
                }
            }

            WizardStep::Organization(OrgView::New | OrgView::Suggest(_)) => {
                match fill_organization(wizard, &mut p)? {
                    true => WizardAction::SubmitOrganization,
                    false => WizardAction::Back,
                }
            }

            WizardStep::Details => {
                let kind = wizard.draft().kind;
                p.say(format!("\n{} details (* required)", kind.label()))?;
                let mut back = false;
                for field in kind.detail_fields() {
                    let marker = if kind.required_fields().contains(field) { "*" } else { "" };
                    let current = wizard.draft().details.get(*field).to_string();
                    let answer = p.ask(&format!("{}{}", field.label(), marker), &current)?;
                    if answer == BACK {
                        back = true;
                        break;
                    }
                    wizard.apply(WizardAction::SetDetail(*field, answer), Instant::now())?;
                }
                if back { WizardAction::Back } else { WizardAction::Next }
            }

            WizardStep::Auth => {
                let current = wizard.draft().contact_email.clone();
                let email = p.ask("\nContact email", &current)?;
                if email == BACK {
                    WizardAction::Back
                } else {
                    wizard.apply(WizardAction::SetContact(email), Instant::now())?;
                    WizardAction::Submit
                }
            }

            WizardStep::Done { .. } => bail!("Wizard already completed"),
        };

        if let Some(submission) = wizard.apply(action, Instant::now())? {
            break submission;
        }
    };

    sink.submit(&submission).context("Failed to record submission")?;

    let now = Instant::now();
    if let Some(wait) = wizard.reset_remaining(now) {
        p.say(format!("Thanks! The form resets in {:.1}s.", wait.as_secs_f64()))?;
        std::thread::sleep(wait);
    }
    wizard.tick(Instant::now());
    Ok(submission)
}

/// Collect organization fields and images. `false` means the user went back.
fn fill_organization<R: BufRead, W: Write>(wizard: &mut Wizard<'_>, p: &mut Prompter<'_, R, W>) -> Result<bool> {
    p.say("\nOrganization details")?;
    for field in OrgField::ALL {
        let current = wizard.draft().organization.get(*field).to_string();
        let label = match field {
            OrgField::Name => "Name",
            OrgField::Description => "Description",
            OrgField::Website => "Website",
            OrgField::Twitter => "Twitter",
            OrgField::Category => "Category",
        };
        let answer = p.ask(label, &current)?;
        if answer == BACK {
            return Ok(false);
        }
        wizard.apply(WizardAction::SetOrganizationField(*field, answer), Instant::now())?;
    }

    for (label, is_logo) in [("Logo image path", true), ("Cover image path", false)] {
        let answer = p.ask(label, "")?;
        if answer == BACK {
            return Ok(false);
        }
        if answer.is_empty() {
            continue;
        }
        let path = PathBuf::from(answer);
        let action = if is_logo {
            WizardAction::SelectLogo(path)
        } else {
            WizardAction::SelectCover(path)
        };
        if let Err(e) = wizard.apply(action, Instant::now()) {
            p.say(e)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{DetailField, OrganizationChoice};
    use crate::store::EntityStore;
    use crate::wizard::JsonSink;
    use std::io::Cursor;
    use std::time::Duration;

    fn run_script(script: &str) -> (OpportunitySubmission, String, bool) {
        let store = EntityStore::bundled().unwrap();
        let mut wizard = Wizard::new(store.organizations(), Duration::ZERO);
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let mut sink = JsonSink::new(Vec::new());
        let submission = run_wizard(&mut wizard, &mut input, &mut out, &mut sink).unwrap();
        let pristine = wizard.is_pristine();
        (submission, String::from_utf8(sink.into_inner()).unwrap(), pristine)
    }

    #[test]
    fn test_scripted_grant_with_existing_org() {
        // kind, search, pick #1, no changes, grant fields, email
        let script = "grant\ngitcoin\n1\nn\nTest Grant\n\n\n\n\n\n\nme@example.org\n";
        let (submission, json, pristine) = run_script(script);
        assert_eq!(submission.kind, OpportunityKind::Grant);
        assert_eq!(
            submission.organization,
            Some(OrganizationChoice::Existing { id: "gitcoin".into() })
        );
        assert_eq!(submission.details[&DetailField::Title], "Test Grant");
        assert_eq!(submission.contact_email.as_deref(), Some("me@example.org"));
        assert!(json.contains("\"gitcoin\""));
        assert!(pristine);
    }

    #[test]
    fn test_back_returns_to_kind() {
        // Go to org search, back out, switch to bounty, skip org.
        let script = "jobs\n<\nbounty\n-\nFix it\n\n\n\n\n\n\n\n";
        let (submission, _, _) = run_script(script);
        assert_eq!(submission.kind, OpportunityKind::Bounty);
        assert!(submission.organization.is_none());
        assert_eq!(submission.details[&DetailField::Title], "Fix it");
        assert!(submission.contact_email.is_none());
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let store = EntityStore::bundled().unwrap();
        let mut wizard = Wizard::new(store.organizations(), Duration::ZERO);
        let mut input = Cursor::new(b"grant\n".to_vec());
        let mut out = Vec::new();
        let mut sink = JsonSink::new(Vec::new());
        assert!(run_wizard(&mut wizard, &mut input, &mut out, &mut sink).is_err());
    }
}
