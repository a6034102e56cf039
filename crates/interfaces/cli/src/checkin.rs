use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{TimeDelta, Utc};
use tokio::sync::oneshot;

use habitual_store::User;
use habitual_telegram::format;
use habitual_tracker::{
    CheckinInput, ConfirmationEvent, HabitTracker, PendingOverride, SubmitOutcome,
};

pub async fn run_checkin(tracker: &HabitTracker, user: &User, text: &str, yes: bool) -> Result<()> {
    let input = CheckinInput::parse(text);
    match tracker.submit_checkin(user, input, Utc::now()).await? {
        SubmitOutcome::Created(checkin) => println!("{}", format::checkin_recorded(&checkin)),
        SubmitOutcome::ConflictsWith(pending) => {
            let event = if yes {
                ConfirmationEvent::Approve
            } else {
                ask(&pending, tracker.confirm_timeout()).await?
            };
            let outcome = tracker
                .resolve_confirmation(&pending, event, Utc::now())
                .await?;
            println!("{}", format::override_outcome(outcome, &pending.proposed));
        }
    }
    Ok(())
}

async fn ask(pending: &PendingOverride, timeout: TimeDelta) -> Result<ConfirmationEvent> {
    if !io::stdin().is_terminal() {
        bail!("a check-in for {} already exists; re-run with --yes to overwrite it", pending.date);
    }

    println!("{}", format::override_prompt(&pending.existing, &pending.proposed, timeout));
    print!("Overwrite? [y/N] ");
    io::stdout().flush()?;

    // A plain thread, so an unanswered prompt does not hold the runtime open.
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = tx.send(io::stdin().read_line(&mut line).map(|_| line));
    });

    let wait = timeout.to_std().unwrap_or(Duration::from_secs(30));
    match tokio::time::timeout(wait, rx).await {
        Err(_) => {
            println!();
            Ok(ConfirmationEvent::Timeout)
        }
        Ok(Ok(Ok(line))) => Ok(parse_answer(&line)),
        Ok(Ok(Err(err))) => Err(err.into()),
        Ok(Err(_)) => Ok(ConfirmationEvent::Decline),
    }
}

/// Anything other than an explicit yes keeps the original.
fn parse_answer(line: &str) -> ConfirmationEvent {
    match ConfirmationEvent::from_reply(line) {
        Some(ConfirmationEvent::Approve) => ConfirmationEvent::Approve,
        _ => ConfirmationEvent::Decline,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use habitual_config::BotConfig;
    use habitual_store::{LocalFileStore, Mood};

    use super::*;

    #[test]
    fn only_explicit_yes_approves() {
        assert_eq!(parse_answer("y\n"), ConfirmationEvent::Approve);
        assert_eq!(parse_answer("YES"), ConfirmationEvent::Approve);
        assert_eq!(parse_answer("\n"), ConfirmationEvent::Decline);
        assert_eq!(parse_answer("maybe"), ConfirmationEvent::Decline);
        assert_eq!(parse_answer("n"), ConfirmationEvent::Decline);
    }

    #[tokio::test]
    async fn yes_flag_overwrites_without_prompting() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(
            dir.path().join("checkins.json"),
            dir.path().join("users.json"),
        );
        let tracker = HabitTracker::new(Arc::new(store), &BotConfig::default());
        let user = tracker.resolve_user("local", "local").await.unwrap();

        run_checkin(&tracker, &user, "2 slow start", false).await.unwrap();
        run_checkin(&tracker, &user, "4 picked up", true).await.unwrap();

        let checkins = tracker.store().list_checkins(&user).await.unwrap();
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins[0].mood, Mood::new(4));
        assert_eq!(checkins[0].message.as_deref(), Some("picked up"));
    }
}
