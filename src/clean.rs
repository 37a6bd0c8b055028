use std::fmt::Display;
use std::fs;
use std::time::Instant;

use console::Style;

use crate::config::EnvConfig;
use crate::error::CleanError;

const ANSI_BLUE: Style = Style::new().blue();

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Delete the current environment's output root if it exists and recreate it
/// empty. Used only as the pre-step of the `build` entry point; watch-mode
/// rebuilds never clean.
pub fn clear_output(config: &EnvConfig) -> Result<(), CleanError> {
    let s = Instant::now();
    let root = &config.output_root;

    if fs::metadata(root).is_ok() {
        fs::remove_dir_all(root) //
            .map_err(CleanError::Remove)?;
    }

    fs::create_dir_all(root) //
        .map_err(CleanError::Create)?;

    eprintln!("Cleaned the {root} directory {}", as_overhead(s));

    Ok(())
}
