//! `netdraw connect`: a headless participant in a live topology session.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use netdraw_core::{ConnectionState, Editor, Session, SessionConfig};

use super::util::DocumentSummary;
use crate::cli::{ConnectArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn describe(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "disconnected".into(),
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Connected => "connected".into(),
        ConnectionState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionState::Failed => "failed".into(),
    }
}

pub async fn handle(
    args: &ConnectArgs,
    mut config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_test_channel {
        config.test_channel = false;
    }
    let color = output::should_color(global.color);
    let editor = Editor::new(config.editor.clone())?;
    let handle = Session::spawn(&config, editor, CancellationToken::new())?;

    info!(server = %config.url, inventory = config.inventory_id, "joining topology");
    let mut state = handle.connection_state();
    let mut docs = handle.document();
    let mut effects = handle.effects();

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut last_summary = DocumentSummary::from(docs.current().as_ref());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, leaving session");
                break;
            }
            () = &mut deadline => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                if !global.quiet {
                    eprintln!("{}", output::status(&describe(&current), color));
                }
                if current == ConnectionState::Failed {
                    break;
                }
            }
            doc = docs.changed() => {
                let Some(doc) = doc else { break };
                let summary = DocumentSummary::from(doc.as_ref());
                if summary != last_summary {
                    info!(%summary, "document changed");
                    last_summary = summary;
                }
            }
            effect = effects.recv() => match effect {
                Ok(effect) => debug!(?effect, "effect ignored in headless mode"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "effect stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let failed = *state.borrow() == ConnectionState::Failed;
    let last_error = handle.last_error();
    let editor = handle.shutdown().await?;

    let summary = DocumentSummary::from(&editor.snapshot());
    let rendered = output::render_single(global.output, &summary, ToString::to_string)?;
    output::print_output(&rendered, global.quiet);

    if failed {
        return Err(CliError::SessionClosed {
            reason: last_error.unwrap_or_else(|| "the topology socket gave up reconnecting".into()),
        });
    }
    Ok(())
}
