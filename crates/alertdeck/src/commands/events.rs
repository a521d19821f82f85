//! `alertdeck events create`: submit a detection event.

use alertdeck_core::{Event, NewEvent, submit_event};

use crate::cli::{EventsArgs, EventsCommand, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(event: &Event) -> String {
    format!(
        "Event {id} stored\n  device:     {device}\n  type:       {kind}\n  confidence: {conf:.2}\n  timestamp:  {ts}",
        id = event.id,
        device = event.device_id,
        kind = event.event_type,
        conf = event.confidence,
        ts = event.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub async fn handle(
    resolved: &Resolved,
    args: EventsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EventsCommand::Create {
            device_id,
            event_type,
            confidence,
            data,
        } => {
            let event = NewEvent {
                device_id,
                event_type,
                confidence,
                raw_data: util::parse_json_object(data.as_deref())?,
            };

            let session = util::authenticate(resolved, global).await?;
            let stored = submit_event(&session.client, &event)
                .await
                .map_err(|e| CliError::from(e).for_profile(&resolved.profile))?;

            let out = output::render_single(global.output, &stored, detail, |e| e.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
