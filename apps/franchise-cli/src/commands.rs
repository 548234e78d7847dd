//! Command execution

use crate::output::{
    print_case, print_cases, print_json, print_notifications, print_read_outcome, print_remarks,
    print_session,
};
use crate::Commands;
use anyhow::{bail, Context, Result};
use franchise_core::{
    access, BackendApi, Case, ClientConfig, EventBroadcaster, HttpApiClient, NewRemark,
    SessionContext, Synchronizer, UnreadTracker, UserApi, UserDirectory, UserRef,
};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Run one command against the backend
///
/// `health` needs the concrete HTTP client and is served by [`health_check`].
///
/// # Errors
/// Returns an error if the command fails; backend failures keep their
/// [`franchise_core::FranchiseError`] so callers can show a notice for them
#[instrument(skip_all)]
pub async fn execute<A, W>(
    command: Commands,
    api: Arc<A>,
    session: &SessionContext,
    config: &ClientConfig,
    json: bool,
    writer: &mut W,
) -> Result<()>
where
    A: BackendApi + 'static,
    W: Write,
{
    let sync = Synchronizer::new(
        api.as_ref(),
        EventBroadcaster::new(),
        config.default_case_status,
    );

    match command {
        Commands::Login { token, user } => {
            let profile = api.get_user(&user).await?;
            session.sign_in(token, &profile)?;
            if let Err(e) = session.refresh_permissions(api.as_ref()).await {
                warn!(error = %e, "Could not fetch permissions, keeping the profile's");
            }
            print_session(session, writer)?;
        }
        Commands::Logout => {
            session.sign_out()?;
            writeln!(writer, "Signed out")?;
        }
        Commands::Whoami { refresh } => {
            if refresh {
                session.refresh_permissions(api.as_ref()).await?;
            }
            if json {
                print_json(&session.current_user()?, writer)?;
            } else {
                print_session(session, writer)?;
            }
        }
        Commands::Cases { mine, limit } => {
            let user_id = session.user_id()?;
            let mut cases = access::visible_cases(session, api.list_cases().await?);
            if mine {
                cases.retain(|case| case.is_assigned(&user_id));
            }
            if let Some(limit) = limit {
                cases.truncate(limit);
            }
            if json {
                print_json(&cases, writer)?;
            } else {
                print_cases(&cases, writer)?;
            }
        }
        Commands::Case { id } => {
            let case = load_case(api.as_ref(), session, &id).await?;
            if json {
                print_json(&case, writer)?;
            } else {
                print_case(&case, config.default_case_status, writer)?;
            }
        }
        Commands::Recompute { id } => {
            let mut case = load_case(api.as_ref(), session, &id).await?;
            access::require_edit(session, &case)?;
            let summary = sync.recompute_and_persist(&mut case).await?;
            writeln!(
                writer,
                "Case {} is {} at {}%",
                case.id, summary.overall_status, summary.completion_percentage
            )?;
        }
        Commands::SetStatus {
            case,
            service,
            status,
        } => {
            let mut case = load_case(api.as_ref(), session, &case).await?;
            access::require_edit(session, &case)?;
            let summary = sync.set_service_status(&mut case, &service, status).await?;
            writeln!(
                writer,
                "Service {service} is now {status}; case is {} at {}%",
                summary.overall_status, summary.completion_percentage
            )?;
        }
        Commands::Remarks { case, service } => {
            let case = load_case(api.as_ref(), session, &case).await?;
            let tracker = load_tracker(&api, session, &case, &service).await?;
            if json {
                print_json(tracker.remarks(), writer)?;
            } else {
                print_remarks(&tracker, writer)?;
            }
        }
        Commands::MarkRead {
            case,
            service,
            remark,
            all,
        } => {
            let reader = session.current_user()?;
            let case = load_case(api.as_ref(), session, &case).await?;
            let mut tracker = load_tracker(&api, session, &case, &service).await?;
            let outcome = match remark {
                Some(remark_id) if !all => {
                    sync.mark_read(&mut tracker, &case, &remark_id, &reader.name)
                        .await?
                }
                _ => sync.mark_all_read(&mut tracker, &case, &reader.name).await?,
            };
            if json {
                print_json(&outcome, writer)?;
            } else {
                print_read_outcome(&outcome, writer)?;
            }
        }
        Commands::AddRemark {
            case,
            service,
            text,
        } => {
            let case = load_case(api.as_ref(), session, &case).await?;
            let submission = NewRemark {
                case_id: case.id.clone(),
                service_id: service,
                text,
            };
            let outcome = sync.add_remark(session, &case, &submission, None).await?;
            if json {
                print_json(&outcome.remark, writer)?;
            } else {
                writeln!(writer, "Added remark {}", outcome.remark.id)?;
            }
        }
        Commands::DeleteRemark {
            case,
            service,
            remark,
            all,
        } => {
            let case = load_case(api.as_ref(), session, &case).await?;
            match remark {
                Some(remark_id) if !all => {
                    sync.delete_remark(session, &case, &remark_id, None).await?;
                    writeln!(writer, "Deleted remark {remark_id}")?;
                }
                _ => {
                    sync.delete_all_remarks(session, &case, &service, None)
                        .await?;
                    writeln!(writer, "Deleted every remark on service {service}")?;
                }
            }
        }
        Commands::Notifications { unread } => {
            let user_id = session.user_id()?;
            let mut notifications = api.list_notifications(&user_id).await?;
            if unread {
                notifications.retain(|n| !n.read);
            }
            if json {
                print_json(&notifications, writer)?;
            } else {
                print_notifications(&notifications, writer)?;
            }
        }
        Commands::ReadNotification { id } => {
            session.user_id()?;
            api.mark_notification_read(&id).await?;
            writeln!(writer, "Notification {id} marked read")?;
        }
        Commands::Health => bail!("health checks need the HTTP client, use health_check"),
    }

    Ok(())
}

/// Check the backend and report the round trip
///
/// # Errors
/// Returns an error if the backend is unreachable or unhealthy
pub async fn health_check<W: Write>(api: &HttpApiClient, writer: &mut W) -> Result<()> {
    let elapsed = api
        .health()
        .await
        .with_context(|| format!("API at {} is not healthy", api.base_url()))?;
    writeln!(
        writer,
        "API at {} is healthy ({} ms)",
        api.base_url(),
        elapsed.as_millis()
    )?;
    Ok(())
}

async fn load_case<A>(api: &A, session: &SessionContext, case_id: &str) -> Result<Case>
where
    A: BackendApi + ?Sized,
{
    let case = api.get_case(case_id).await?;
    access::require_case_access(session, &case)?;
    Ok(case)
}

/// Remarks of one service, author names filled in, tracked for the signed-in user
async fn load_tracker<A>(
    api: &Arc<A>,
    session: &SessionContext,
    case: &Case,
    service_id: &str,
) -> Result<UnreadTracker>
where
    A: BackendApi + 'static,
{
    let viewer = session.user_id()?;
    let mut remarks = api.list_remarks(&case.id, service_id).await?;

    let users: Arc<dyn UserApi> = api.clone();
    let directory = UserDirectory::with_defaults(users);
    for remark in remarks.iter_mut().filter(|r| r.author_name.is_empty()) {
        remark.author_name = directory
            .display_name(&UserRef::new(remark.author_id.as_str()))
            .await;
    }
    debug!(
        remarks = remarks.len(),
        lookups = directory.stats().misses,
        "Remarks loaded"
    );

    Ok(UnreadTracker::new(viewer, remarks, EventBroadcaster::new()))
}
