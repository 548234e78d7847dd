//! Terminal output

use franchise_common::utils::{format_datetime, progress_bar, truncate_string};
use franchise_core::{
    Case, CaseStatus, Notification, ReadOutcome, Result, SessionContext, UnreadTracker,
};
use serde::Serialize;
use std::io::Write;

const BAR_WIDTH: usize = 20;
const PREVIEW_CHARS: usize = 72;

/// Print any serializable value as pretty JSON
///
/// # Errors
/// Returns an error if serialization or writing fails
pub fn print_json<T: Serialize + ?Sized, W: Write>(value: &T, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Print a case list, one line per case
///
/// # Errors
/// Returns an error if writing fails
pub fn print_cases<W: Write>(cases: &[Case], writer: &mut W) -> Result<()> {
    if cases.is_empty() {
        writeln!(writer, "No cases found")?;
        return Ok(());
    }

    writeln!(writer, "Found {} cases:", cases.len())?;
    for case in cases {
        writeln!(
            writer,
            "  #{:<5} {:<30} {:<12} {} {:>3}%",
            case.serial_number,
            truncate_string(&case_title(case), 30),
            case.status().to_string(),
            progress_bar(case.completion_percentage(), BAR_WIDTH),
            case.completion_percentage()
        )?;
    }
    Ok(())
}

/// Print one case with its services
///
/// A stale stored summary is pointed out rather than silently corrected.
///
/// # Errors
/// Returns an error if writing fails
pub fn print_case<W: Write>(case: &Case, default_status: CaseStatus, writer: &mut W) -> Result<()> {
    writeln!(writer, "Case #{} ({})", case.serial_number, case.id)?;
    writeln!(writer, "  Unit:     {}", case_title(case))?;
    if !case.owner_name.is_empty() {
        writeln!(writer, "  Owner:    {}", case.owner_name)?;
    }
    if !case.address.is_empty() {
        writeln!(writer, "  Address:  {}", case.address)?;
    }
    writeln!(
        writer,
        "  Status:   {} {} {}%",
        case.status(),
        progress_bar(case.completion_percentage(), BAR_WIDTH),
        case.completion_percentage()
    )?;
    if !case.assigned_users.is_empty() {
        let team: Vec<&str> = case.assigned_users.iter().map(|u| u.label()).collect();
        writeln!(writer, "  Team:     {}", team.join(", "))?;
    }
    writeln!(writer, "  Updated:  {}", format_datetime(&case.updated_at))?;

    if case.status().is_legacy_outcome() {
        writeln!(
            writer,
            "  Note: {} was recorded by the older workflow and is not derived from the services",
            case.status()
        )?;
    } else if !case.is_consistent(default_status) {
        writeln!(
            writer,
            "  Note: the stored summary does not match the services, run `franchise recompute {}`",
            case.id
        )?;
    }

    writeln!(writer)?;
    if case.services().is_empty() {
        writeln!(writer, "  No services")?;
        return Ok(());
    }
    writeln!(writer, "  Services:")?;
    for service in case.services() {
        writeln!(
            writer,
            "    {:<10} {:<28} {}",
            service.id,
            truncate_string(&service.name, 28),
            service.status
        )?;
        if let Some(assignee) = &service.assigned_to {
            writeln!(writer, "               assigned to {}", assignee.label())?;
        }
    }
    Ok(())
}

/// Print the remarks a tracker holds, flagging the viewer's unread ones
///
/// The oldest unread remark is pointed out as the place to start reading.
///
/// # Errors
/// Returns an error if writing fails
pub fn print_remarks<W: Write>(tracker: &UnreadTracker, writer: &mut W) -> Result<()> {
    if tracker.remarks().is_empty() {
        writeln!(writer, "No remarks")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{} remarks, {} unread:",
        tracker.remarks().len(),
        tracker.unread_count()
    )?;
    let oldest_unread = tracker.first_unread().map(|r| r.id.as_str());
    for remark in tracker.remarks() {
        let marker = if tracker.is_unread(&remark.id) { '*' } else { ' ' };
        let author = if remark.author_name.is_empty() {
            remark.author_id.as_str()
        } else {
            remark.author_name.as_str()
        };
        let highlight = if oldest_unread == Some(remark.id.as_str()) {
            "  <- oldest unread"
        } else {
            ""
        };
        writeln!(
            writer,
            "{marker} [{}] {} ({}){highlight}",
            remark.id,
            author,
            format_datetime(&remark.created_at)
        )?;
        writeln!(writer, "    {}", truncate_string(&remark.body, PREVIEW_CHARS))?;
    }
    Ok(())
}

/// Print the result of marking remarks read
///
/// Team notification delivery is not shown; failed dispatches are only logged.
///
/// # Errors
/// Returns an error if writing fails
pub fn print_read_outcome<W: Write>(outcome: &ReadOutcome, writer: &mut W) -> Result<()> {
    if outcome.is_noop() {
        writeln!(writer, "Nothing to mark, already read")?;
        return Ok(());
    }

    writeln!(writer, "Marked {} remark(s) read", outcome.marked.len())?;
    if !outcome.reverted.is_empty() {
        writeln!(
            writer,
            "Could not save {} remark(s), they stay unread: {}",
            outcome.reverted.len(),
            outcome.reverted.join(", ")
        )?;
    }
    Ok(())
}

/// Print notifications with the unread count
///
/// # Errors
/// Returns an error if writing fails
pub fn print_notifications<W: Write>(notifications: &[Notification], writer: &mut W) -> Result<()> {
    if notifications.is_empty() {
        writeln!(writer, "No notifications")?;
        return Ok(());
    }

    let unread = franchise_core::unread::unread_notification_count(notifications);
    writeln!(writer, "{} notifications, {unread} unread:", notifications.len())?;
    for notification in notifications {
        let marker = if notification.read { ' ' } else { '*' };
        writeln!(
            writer,
            "{marker} [{}] {} ({})",
            notification.id,
            notification.message,
            format_datetime(&notification.created_at)
        )?;
    }
    Ok(())
}

/// Print who is signed in
///
/// # Errors
/// Returns an error if writing fails
pub fn print_session<W: Write>(session: &SessionContext, writer: &mut W) -> Result<()> {
    let Some(snapshot) = session.snapshot() else {
        writeln!(writer, "Not signed in")?;
        return Ok(());
    };

    writeln!(
        writer,
        "Signed in as {} ({}), role {}",
        snapshot.user.name, snapshot.user.id, snapshot.user.role
    )?;
    writeln!(writer, "  Since:        {}", format_datetime(&snapshot.signed_in_at))?;

    let permissions = session.permissions();
    let granted: Vec<&str> = [
        ("edit", permissions.edit),
        ("delete", permissions.delete),
        ("remarks", permissions.remarks),
        ("allCaseAccess", permissions.all_case_access),
    ]
    .into_iter()
    .filter_map(|(name, granted)| granted.then_some(name))
    .collect();
    if snapshot.user.role.is_admin() {
        writeln!(writer, "  Permissions:  all (administrator)")?;
    } else if granted.is_empty() {
        writeln!(writer, "  Permissions:  none")?;
    } else {
        writeln!(writer, "  Permissions:  {}", granted.join(", "))?;
    }
    Ok(())
}

fn case_title(case: &Case) -> String {
    if !case.unit_name.is_empty() {
        case.unit_name.clone()
    } else if !case.client_name.is_empty() {
        case.client_name.clone()
    } else {
        format!("case {}", case.id)
    }
}
