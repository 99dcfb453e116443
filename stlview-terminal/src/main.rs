/// STLView - Terminal STL viewer
///
/// Loads an STL file in the background (Esc cancels the import) and shows it
/// with a trackball camera.
/// Controls:
///   - Left drag: Orbit
///   - Right drag: Pan, Ctrl+Right drag / wheel: Zoom
///   - WASD / Arrow Keys: Rotate
///   - E: Edges, B: Back-face culling, I: Mesh info, X: Export vertices
///   - C: Center view
///   - Q/ESC: Quit
use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::fs::File;
use std::path::Path;
use stlview_terminal::{Cli, TerminalApp};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = cli.config();
    if let Some(path) = &config.path {
        std::fs::metadata(path).with_context(|| format!("cannot open {}", path.display()))?;
    }
    log::debug!("configuration: {config:?}");

    let mut app = TerminalApp::new(config).context("failed to query the terminal size")?;
    app.run().context("terminal session failed")?;

    println!("Thank you for using STLView!");
    Ok(())
}

/// Logs go to stderr unless `log_file` is given; stderr output is hidden
/// behind the alternate screen while the viewer runs.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("cannot create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
