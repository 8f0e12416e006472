//! Session command - inspect and edit single sessions.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use vial_session::{SessionMap, keys};

use super::Context;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Show every stored field without touching the session
    Show {
        /// Session ID
        id: String,
    },

    /// Print a single field (opening the session refreshes its expiration)
    Get {
        /// Session ID
        id: String,

        /// Field name
        field: String,
    },

    /// Set a field on an existing session and refresh its expiration
    Set {
        /// Session ID
        id: String,

        /// Field name
        field: String,

        /// Field value
        value: String,
    },

    /// Remove a field from an existing session and refresh its expiration
    Unset {
        /// Session ID
        id: String,

        /// Field name
        field: String,
    },

    /// Refresh the session's expiration and access time
    Touch {
        /// Session ID
        id: String,
    },

    /// Show the remaining time-to-live
    Ttl {
        /// Session ID
        id: String,
    },
}

/// Run the session command.
pub fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();
    let green = Style::new().green();

    match args.command {
        SessionCommand::Show { id } => {
            let key = keys::session_key(ctx.store.options().namespace.as_deref(), &id);
            let backend = ctx.store.backend();
            let exists = backend.exists(&key)?;
            let mut fields: Vec<(String, String)> = backend
                .get_all_fields(&key)?
                .into_iter()
                .map(|(k, v)| {
                    (
                        String::from_utf8_lossy(&k).into_owned(),
                        String::from_utf8_lossy(&v).into_owned(),
                    )
                })
                .collect();
            fields.sort();
            let ttl = backend.ttl(&key)?;

            if ctx.json_output {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                let out = json!({
                    "id": id,
                    "key": key,
                    "exists": exists,
                    "ttl_secs": ttl.map(|d| d.as_secs()),
                    "fields": map,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", style(format!("Session {}", key)).bold());
                println!("{}", dim.apply_to("─".repeat(50)));
                if !exists {
                    println!("{}", dim.apply_to("No such session"));
                    return Ok(());
                }
                for (name, value) in &fields {
                    println!("{:<20} {}", name, value);
                }
                if ctx.verbose {
                    println!();
                    println!("{}", dim.apply_to(format_ttl(ttl)));
                }
            }
        }
        SessionCommand::Get { id, field } => {
            let mut session = ctx.store.user_session(Some(&id), None)?;
            if session.is_new() {
                bail!("session '{}' does not exist", id);
            }
            let value = session.get(&field)?;
            if ctx.json_output {
                println!("{}", json!({ "id": id, "field": field, "value": value }));
            } else {
                println!("{}", value);
            }
        }
        SessionCommand::Set { id, field, value } => {
            let mut session = ctx.store.user_session(Some(&id), None)?;
            if session.is_new() {
                bail!("session '{}' does not exist", id);
            }
            session.set(&field, &value);
            session.save()?;
            println!("{} {} = {}", green.apply_to("✓"), field, value);
        }
        SessionCommand::Unset { id, field } => {
            let mut session = ctx.store.user_session(Some(&id), None)?;
            if session.is_new() {
                bail!("session '{}' does not exist", id);
            }
            session.delete(&field);
            session.save()?;
            println!("{} {} removed", green.apply_to("✓"), field);
        }
        SessionCommand::Touch { id } => {
            let mut session = ctx.store.user_session(Some(&id), None)?;
            if session.is_new() {
                bail!("session '{}' does not exist", id);
            }
            session.save()?;
            let ttl = ctx.store.backend().ttl(session.key().unwrap_or_default())?;
            println!("{} {}", green.apply_to("✓"), format_ttl(ttl));
        }
        SessionCommand::Ttl { id } => {
            let key = keys::session_key(ctx.store.options().namespace.as_deref(), &id);
            let backend = ctx.store.backend();
            if !backend.exists(&key)? {
                bail!("session '{}' does not exist", id);
            }
            let ttl = backend.ttl(&key)?;
            if ctx.json_output {
                println!("{}", json!({ "id": id, "ttl_secs": ttl.map(|d| d.as_secs()) }));
            } else {
                println!("{}", format_ttl(ttl));
            }
        }
    }

    Ok(())
}

fn format_ttl(ttl: Option<std::time::Duration>) -> String {
    match ttl {
        Some(d) => format!("Expires in {}s", d.as_secs()),
        None => "Never expires".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(None), "Never expires");
        assert_eq!(
            format_ttl(Some(Duration::from_secs(90))),
            "Expires in 90s"
        );
    }
}
