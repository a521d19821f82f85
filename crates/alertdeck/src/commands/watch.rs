//! `alertdeck watch`: the live dashboard.
//!
//! Mounts a `DashboardController`, redraws the reconciled view whenever it
//! changes, and reports push-stream transitions on stderr. Exits on
//! Ctrl-C (after unmounting) or when the service ends the session.

use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::debug;

use alertdeck_core::{
    Alert, AlertFilter, AlertViewStream, CoreError, DashboardController, SessionState,
    StreamEvent,
};

use crate::cli::{FilterArg, GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

impl From<FilterArg> for AlertFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => AlertFilter::All,
            FilterArg::Critical => AlertFilter::Critical,
            FilterArg::Normal => AlertFilter::Normal,
        }
    }
}

/// What the screen shows besides the alerts themselves.
struct Screen {
    format: OutputFormat,
    filter: AlertFilter,
    color: bool,
    quiet: bool,
    status: String,
}

impl Screen {
    fn draw(&self, alerts: &[Arc<Alert>]) {
        if self.quiet {
            return;
        }
        let body = output::render_alerts(self.format, alerts, self.color);
        if matches!(self.format, OutputFormat::Table) {
            output::clear_screen();
            let header = format!(
                "alertdeck · {} alert(s) [{}] · stream: {}",
                alerts.len(),
                self.filter,
                self.status
            );
            output::print_output(&format!("{header}\n{body}"), false);
        } else {
            output::print_output(&body, false);
        }
    }

    fn report(&mut self, event: &StreamEvent) {
        let line = match event {
            StreamEvent::Opened => "connected".to_owned(),
            StreamEvent::Closed { code, reason } if reason.is_empty() => {
                format!("closed (code {code})")
            }
            StreamEvent::Closed { code, reason } => format!("closed (code {code}: {reason})"),
            StreamEvent::ReconnectScheduled { attempt, delay } => format!(
                "reconnecting in {} (attempt {attempt})",
                humantime::format_duration(*delay)
            ),
            StreamEvent::Exhausted { attempts } => {
                format!("gave up after {attempts} attempts")
            }
            StreamEvent::TransportError { message } => {
                debug!(%message, "stream transport error");
                return;
            }
            // Already logged by the stream client.
            StreamEvent::DecodeFailed { .. } => return,
        };
        if !self.quiet {
            eprintln!("stream: {line}");
        }
        self.status = line;
    }
}

pub async fn handle(
    mut resolved: Resolved,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let config = &mut resolved.config;
    if args.no_stream {
        config.stream_enabled = false;
    }
    if let Some(interval) = args.poll_interval {
        config.poll_interval = interval;
    }
    if let Some(size) = args.page_size.and_then(NonZeroU32::new) {
        config.page_size = size;
    }
    if !config.stream_enabled && config.poll_interval.is_zero() {
        return Err(CliError::Validation {
            field: "poll-interval".into(),
            reason: "polling cannot be disabled together with --no-stream".into(),
        });
    }

    let session = util::authenticate(&resolved, global).await?;
    let controller = DashboardController::from_session(&resolved.config, &session)?;

    let mut screen = Screen {
        format: global.output,
        filter: args.filter.into(),
        color: output::should_color(global.color),
        quiet: global.quiet,
        status: if resolved.config.stream_enabled {
            "connecting".into()
        } else {
            "off (polling)".into()
        },
    };

    // Subscribe before mounting so the first transitions are not missed.
    let mut view = controller.subscribe_view();
    let mut sessions = controller.watch_session();
    let mut events = controller.stream_events();

    controller
        .mount(&session.token)
        .await
        .map_err(|e| CliError::from(e).for_profile(&resolved.profile))?;
    screen.draw(&controller.filtered(screen.filter));

    let outcome = run_loop(&controller, &mut screen, &mut view, &mut sessions, &mut events).await;
    controller.unmount().await;
    outcome
}

async fn run_loop(
    controller: &DashboardController,
    screen: &mut Screen,
    view: &mut AlertViewStream,
    sessions: &mut watch::Receiver<SessionState>,
    events: &mut broadcast::Receiver<StreamEvent>,
) -> Result<(), CliError> {
    let polling = !controller.options().poll_interval.is_zero();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted, unmounting");
                return Ok(());
            }

            changed = view.changed() => {
                let Some(alerts) = changed else { return Ok(()) };
                screen.draw(&screen.filter.apply(&alerts));
            }

            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    screen.report(&event);
                    // Exhaustion is fatal only when polling is off.
                    if let Some(err @ CoreError::ReconnectExhausted { .. }) =
                        event.error().filter(|_| !polling)
                    {
                        return Err(err.into());
                    }
                    if matches!(screen.format, OutputFormat::Table) {
                        screen.draw(&controller.filtered(screen.filter));
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "stream status lagged"),
                Err(RecvError::Closed) => events_open = false,
            },

            changed = sessions.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = sessions.borrow_and_update().clone();
                if let SessionState::Expired { message } = state {
                    return Err(CliError::SessionExpired { message });
                }
            }
        }
    }
}
