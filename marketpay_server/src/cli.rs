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
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "MPG_HOST",
        "MPG_PORT",
        "MPG_DATABASE_URL",
        "MPG_PROVIDER_TIMEOUT",
        "MPG_RUN_MIGRATIONS",
        "MPG_NICEPAY_MERCHANT_ID",
        "MPG_NICEPAY_API_URL",
        "MPG_TOSS_API_URL",
        "MPG_STRIPE_API_URL",
    ];
    const SECRET_ENVS: [&str; 5] = [
        "MPG_NICEPAY_MERCHANT_KEY",
        "MPG_TOSS_SECRET_KEY",
        "MPG_TOSS_WEBHOOK_SECRET",
        "MPG_STRIPE_SECRET_KEY",
        "MPG_STRIPE_WEBHOOK_SECRET",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    });
    println!("Secrets (values hidden):");
    SECRET_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) if !s.trim().is_empty() => "Set",
            _ => "Not set",
        };
        println!("  {name:<35} {val:<15}");
    })
}
