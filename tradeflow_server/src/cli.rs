use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "TFL_HOST",
        "TFL_PORT",
        "TFL_DATABASE_URL",
        "TFL_MOYASAR_API_URL",
        "TFL_VERIFICATION_MODE",
        "TFL_DOCUMENT_ROOT",
        "TFL_DOCUMENT_URL_BASE",
        "TFL_AUTO_QUOTE_ENABLED",
        "TFL_AUTO_QUOTE_DELAY_MINUTES",
        "TFL_AUTO_QUOTE_INCLUDE_LIMITED_STOCK",
        "TFL_AUTO_QUOTE_LEAD_TIME_DAYS",
        "TFL_AUTO_QUOTE_INTERVAL_SECS",
        "TFL_USE_X_FORWARDED_FOR",
        "TFL_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<38} {val:<15}");
    })
}
