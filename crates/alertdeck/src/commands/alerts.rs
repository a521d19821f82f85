//! `alertdeck alerts`: one snapshot pull, rendered once.

use std::num::NonZeroU32;
use std::sync::Arc;

use alertdeck_core::{AlertQuery, HttpSnapshotFetcher, Severity, SnapshotFetcher};

use crate::cli::{AlertsArgs, GlobalOpts, SeverityArg};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Critical => Severity::Critical,
            SeverityArg::Normal => Severity::Normal,
        }
    }
}

fn build_query(args: &AlertsArgs) -> AlertQuery {
    AlertQuery {
        skip: args.skip,
        limit: args.limit.and_then(NonZeroU32::new),
        severity: args.severity.map(Severity::from),
    }
}

pub async fn handle(
    resolved: &Resolved,
    args: AlertsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = util::authenticate(resolved, global).await?;
    let fetcher = HttpSnapshotFetcher::new(Arc::clone(&session.client));

    let query = build_query(&args);
    let alerts = fetcher
        .fetch(&query)
        .await
        .map_err(|e| CliError::from(e).for_profile(&resolved.profile))?;

    let color = output::should_color(global.color);
    let out = output::render_alerts(global.output, &alerts, color);
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn args(argv: &[&str]) -> AlertsArgs {
        let mut full = vec!["alertdeck", "alerts"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("valid args").command {
            Command::Alerts(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_flags_leave_service_defaults() {
        assert_eq!(build_query(&args(&[])), AlertQuery::default());
    }

    #[test]
    fn flags_become_query_params() {
        let query = build_query(&args(&["--severity", "critical", "--skip", "20", "-l", "10"]));
        assert_eq!(query.skip, Some(20));
        assert_eq!(query.limit.map(NonZeroU32::get), Some(10));
        assert_eq!(query.severity, Some(Severity::Critical));
    }

    #[test]
    fn zero_limit_is_rejected_by_parser() {
        let parsed = Cli::try_parse_from(["alertdeck", "alerts", "--limit", "0"]);
        assert!(parsed.is_err());
    }
}
