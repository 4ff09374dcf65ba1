use crate::cli::{ActionArgs, DetailsArgs, ListArgs, MatchBranchArgs, RegisterArgs, UsernameArg};
use crate::infra::{build_controller, open_repository, Controller, Delivery, Mailer};
use lor_review::config::AppConfig;
use lor_review::error::AppError;
use lor_review::review::{
    write_roster, ApplicantRecord, ApplicantRepository, ApprovalReport, BranchMatcher,
    ProfileUpdate, SubmissionOutcome, Username,
};
use std::sync::Arc;

fn controller(config: &AppConfig, dry_run: bool) -> Result<(Controller, Delivery), AppError> {
    let mailer = Mailer::from_config(config, dry_run)?;
    let delivery = mailer.delivery();
    let repository = Arc::new(open_repository(config)?);
    Ok((build_controller(config, repository, mailer), delivery))
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub(crate) fn list_applicants(config: &AppConfig, args: ListArgs) -> Result<(), AppError> {
    let records = open_repository(config)?.list_all()?;

    if args.csv {
        write_roster(&records, std::io::stdout().lock())?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No applicants registered");
        return Ok(());
    }
    println!(
        "{:<16} {:<28} {:<22} {:<28} {:<14}",
        "Username", "Email", "Full name", "Branch", "Requirement"
    );
    for record in &records {
        let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<28} {:<22} {:<28} {:<14}",
            record.username,
            record.email,
            text(&record.full_name),
            text(&record.branch),
            text(&record.requirement),
        );
    }
    Ok(())
}

pub(crate) fn register_applicant(config: &AppConfig, args: RegisterArgs) -> Result<(), AppError> {
    let repository = open_repository(config)?;

    let mut record = ApplicantRecord::registered(args.username, args.email, args.password);
    record.requirement = args.requirement;
    record.gender = args.gender;
    repository.insert(&record)?;

    println!("Registered {}", record.username);
    Ok(())
}

pub(crate) fn approve(config: &AppConfig, args: ActionArgs) -> Result<(), AppError> {
    let (controller, delivery) = controller(config, args.dry_run)?;
    let report = controller.approve(&Username::new(args.username))?;
    print_lines(&approval_lines(&report, delivery));
    Ok(())
}

fn approval_lines(report: &ApprovalReport, delivery: Delivery) -> Vec<String> {
    let fallback = if report.branch.accepted {
        ""
    } else {
        ", fallback"
    };
    vec![
        format!("Letter issued for {}", report.username),
        format!(
            "  Branch: {} (score {:.2}{fallback})",
            report.branch.canonical, report.branch.score
        ),
        format!("  Saved to: {}", report.letter_path.display()),
        format!("  Email: {}", delivery.describe(&report.recipient)),
        format!(
            "  Completed at: {}",
            report.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    ]
}

pub(crate) fn reject(config: &AppConfig, args: ActionArgs) -> Result<(), AppError> {
    let (controller, delivery) = controller(config, args.dry_run)?;
    let notified = controller.reject(&Username::new(args.username))?;
    println!("Rejection notice {}", delivery.describe(&notified));
    Ok(())
}

pub(crate) fn delete(config: &AppConfig, args: UsernameArg) -> Result<(), AppError> {
    // Deletion never emails, so no SMTP credentials are needed.
    let username = Username::new(args.username);
    let (controller, _) = controller(config, true)?;
    if controller.delete(&username)? {
        println!("Deleted {username}");
    } else {
        println!("No applicant named {username}");
    }
    Ok(())
}

pub(crate) fn submit_details(config: &AppConfig, args: DetailsArgs) -> Result<(), AppError> {
    let details = ProfileUpdate {
        full_name: args.full_name,
        branch: args.branch,
        specialization: args.specialization,
        phone: args.phone,
    };
    let (controller, delivery) = controller(config, args.dry_run)?;
    let outcome = controller.submit_details(&Username::new(args.username), details)?;
    print_lines(&submission_lines(&outcome, delivery));
    Ok(())
}

fn submission_lines(outcome: &SubmissionOutcome, delivery: Delivery) -> Vec<String> {
    match outcome {
        SubmissionOutcome::Complete { username } => vec![format!("Details saved for {username}")],
        SubmissionOutcome::Incomplete {
            username,
            missing,
            notified,
        } => vec![
            format!("Details partially saved for {username}"),
            format!("  Missing: {}", missing.join(", ")),
            format!("  Reminder {}", delivery.describe(notified)),
        ],
    }
}

pub(crate) fn match_branch(config: &AppConfig, args: MatchBranchArgs) -> Result<(), AppError> {
    let matcher = BranchMatcher::standard(&config.matcher);
    let result = matcher.match_branch(&args.text);

    println!("{}", result.canonical);
    println!(
        "  score {:.2} against threshold {:.2}{}",
        result.score,
        config.matcher.threshold,
        if result.accepted { "" } else { " (fallback)" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lor_review::review::{BranchMatch, Requirement, Stage};
    use std::path::PathBuf;

    fn report() -> ApprovalReport {
        ApprovalReport {
            username: Username::new("alice"),
            requirement: Requirement::HigherStudies,
            branch: BranchMatch {
                canonical: "Computer Science and Engineering".to_string(),
                score: 0.91,
                accepted: true,
            },
            letter_path: PathBuf::from("letters/Computer Science and Engineering/Alice_LOR.txt"),
            recipient: "alice@example.edu".to_string(),
            signatory: Some("registrar".to_string()),
            stages: vec![Stage::Lookup, Stage::Persist, Stage::Dispatch],
            completed_at: Utc::now(),
        }
    }

    fn claims_delivery(lines: &[String]) -> bool {
        lines
            .iter()
            .any(|line| line.contains("sent to") || line.contains("Emailed"))
    }

    #[test]
    fn dry_run_approval_output_says_the_letter_was_only_logged() {
        let lines = approval_lines(&report(), Mailer::DryRun.delivery());
        assert!(!claims_delivery(&lines), "{lines:?}");
        assert_eq!(
            lines[3],
            "  Email: logged for alice@example.edu, not delivered (dry run)"
        );
    }

    #[test]
    fn live_approval_output_names_the_recipient() {
        let lines = approval_lines(&report(), Delivery::Sent);
        assert_eq!(lines[3], "  Email: sent to alice@example.edu");
        assert!(lines[1].ends_with("(score 0.91)"));
    }

    #[test]
    fn dry_run_reminder_output_never_claims_delivery() {
        let outcome = SubmissionOutcome::Incomplete {
            username: Username::new("bob"),
            missing: vec!["phone", "specialization"],
            notified: "bob@example.edu".to_string(),
        };
        let lines = submission_lines(&outcome, Delivery::Logged);
        assert!(!claims_delivery(&lines), "{lines:?}");
        assert_eq!(lines[1], "  Missing: phone, specialization");
        assert!(lines[2].contains("bob@example.edu"));
    }

    #[test]
    fn complete_submission_mentions_no_email() {
        let outcome = SubmissionOutcome::Complete {
            username: Username::new("alice"),
        };
        assert_eq!(
            submission_lines(&outcome, Delivery::Sent),
            vec!["Details saved for alice".to_string()]
        );
    }
}
