//! Check-config command implementation.

use crate::settings::Settings;

/// Prints the resolved configuration, secrets redacted.
pub fn run(settings: &Settings) {
    match &settings.source {
        Some(path) => println!("# resolved from {}", path.display()),
        None => println!("# resolved from environment and defaults"),
    }
    println!("{}", settings);
}
