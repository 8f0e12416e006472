//! User command - list or purge the sessions bound to a user.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use super::Context;

/// Arguments for the user command.
#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List session IDs bound to a user
    Sessions {
        /// User ID
        user: String,
    },

    /// Delete every session bound to a user
    Purge {
        /// User ID
        user: String,
    },
}

/// Run the user command.
pub fn run(args: UserArgs, ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();

    match args.command {
        UserCommand::Sessions { user } => {
            let ids: Vec<String> = ctx.store.get_for_user(&user)?.collect();
            if ctx.json_output {
                println!("{}", json!({ "user": user, "sessions": ids }));
            } else {
                println!("{}", style(format!("Sessions for {}", user)).bold());
                println!("{}", dim.apply_to("─".repeat(50)));
                if ids.is_empty() {
                    println!("{}", dim.apply_to("No sessions found"));
                }
                for id in &ids {
                    println!("{}", id);
                }
            }
        }
        UserCommand::Purge { user } => {
            let deleted = ctx.store.delete_for_user(&user)?;
            if ctx.json_output {
                println!("{}", json!({ "user": user, "deleted": deleted }));
            } else {
                let green = Style::new().green();
                println!(
                    "{} Deleted {} session(s) for {}",
                    green.apply_to("✓"),
                    deleted,
                    user
                );
            }
        }
    }

    Ok(())
}
