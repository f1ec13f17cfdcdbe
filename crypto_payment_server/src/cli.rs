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
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "CPG_HOST",
        "CPG_PORT",
        "CPG_DATABASE_URL",
        "CPG_POLL_INTERVAL_SECS",
        "CPG_MAX_POLL_ATTEMPTS",
        "CPG_VERIFICATION_TIMEOUT_MINS",
        "CPG_ERROR_BUDGET",
        "CPG_AMOUNT_TOLERANCE",
        "CPG_SOLANA_CONFIRMATIONS",
        "CPG_ETHEREUM_CONFIRMATIONS",
        "CPG_PRICE_FEED_URL",
        "CPG_ETHERSCAN_URL",
        "CPG_SOLANA_RPC_URL",
        "CPG_NOTIFICATION_WEBHOOK_URL",
        "CPG_RESUME_PENDING",
        "CPG_PRICE_FEED_API_KEY",
        "CPG_ETHERSCAN_API_KEY",
    ];
    const SECRET_ENVS: [&str; 2] = ["CPG_PRICE_FEED_API_KEY", "CPG_ETHERSCAN_API_KEY"];

    println!("Current environment values (secrets are masked):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(_) if SECRET_ENVS.contains(&name) => "****".into(),
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
