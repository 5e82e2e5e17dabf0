//! `netdraw export`: normalize a snapshot and write it as YAML or JSON.
//!
//! The snapshot is loaded into an editor first, so derived state such as
//! group membership is recomputed and the viewport is fitted to the
//! content the same way a joining client would see it.

use serde::Serialize;

use netdraw_core::{Editor, EditorConfig, Snapshot};

use crate::cli::{ExportArgs, ExportFormat, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
}

#[derive(Debug, Serialize)]
pub struct Export {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

pub fn build(snapshot: &Snapshot, with_viewport: bool) -> Result<Export, CliError> {
    let mut editor = Editor::new(EditorConfig::default())?;
    editor.workspace_mut().load_snapshot(snapshot);
    let view = &editor.workspace().view;
    let viewport = with_viewport.then(|| Viewport {
        pan_x: view.pan_x,
        pan_y: view.pan_y,
        scale: view.scale,
    });
    Ok(Export {
        viewport,
        snapshot: editor.snapshot(),
    })
}

pub fn render(export: &Export, format: ExportFormat) -> Result<String, CliError> {
    Ok(match format {
        ExportFormat::Yaml => serde_yaml::to_string(export)?,
        ExportFormat::Json => serde_json::to_string_pretty(export)?,
    })
}

pub fn handle(args: &ExportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = Snapshot::load(&args.snapshot)?;
    let export = build(&snapshot, !args.no_viewport)?;
    output::print_output(&render(&export, args.format)?, global.quiet);
    Ok(())
}
