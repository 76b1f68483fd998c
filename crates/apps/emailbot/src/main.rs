//! emailbot - Gmail from the command line
//!
//! Every command prints JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use mail::{
    GmailAuth, GmailClient, GmailCredentials, MailSettings, Mailbox, MessageId, Receipt,
    Transition,
};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;

mod cli;

use cli::{Cli, Command, ComposeArgs};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {e:#}");
    }

    let mut settings = MailSettings::load().context("Failed to load settings")?;
    if let Some(user) = cli.user {
        settings.user_id = user;
    }
    let mailbox = connect(settings)?;

    let output = match cli.command {
        Command::Send(args) => {
            let (body, attachments) = compose_input(&args)?;
            let receipt = mailbox.send(
                args.to.as_str(),
                args.from.as_str(),
                &args.subject,
                &body,
                attachments,
            )?;
            let ids = json!({ "id": receipt.record.id, "thread_id": receipt.record.thread_id });
            receipt_json(&receipt, ids)
        }
        Command::Draft(args) => {
            let (body, attachments) = compose_input(&args)?;
            let receipt = mailbox.draft(
                args.to.as_str(),
                args.from.as_str(),
                &args.subject,
                &body,
                attachments,
            )?;
            receipt_json(&receipt, json!({ "draft_id": receipt.record.id }))
        }
        Command::SendDraft { draft_id } => serde_json::to_value(mailbox.send_draft(&draft_id)?)?,
        Command::List(filters) => {
            serde_json::to_value(mailbox.list_messages(&filters.to_query())?)?
        }
        Command::Count(filters) => {
            json!({ "estimate": mailbox.count_messages(&filters.to_query())? })
        }
        Command::Show { id, html } => {
            let id = MessageId::new(id);
            json!({
                "id": id,
                "from": mailbox.sender_info(&id)?,
                "snippet": mailbox.message_snippet(&id)?,
                "body": mailbox.message_body(&id, html)?,
            })
        }
        Command::Headers { id, names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let filter = (!names.is_empty()).then_some(names.as_slice());
            serde_json::to_value(mailbox.message_headers(&MessageId::new(id), filter)?)?
        }
        Command::Attachments { id, dir } => {
            let dir = dir.unwrap_or_else(|| mailbox.settings().attachment_dir.clone());
            let saved = save_attachments(&mailbox, &MessageId::new(id), &dir)?;
            json!({ "saved": saved })
        }
        Command::Mark { action, ids } => {
            let ids: Vec<MessageId> = ids.into_iter().map(MessageId::new).collect();
            let transition = Transition::from(action);
            mailbox.batch_modify(&ids, &transition.delta()?)?;
            info!("{transition}: {} message(s)", ids.len());
            json!({ "updated": ids })
        }
        Command::Move {
            id,
            label,
            keep_inbox,
        } => {
            let labels = mailbox.move_to_label(&MessageId::new(id), &label, !keep_inbox)?;
            json!({ "labels": labels })
        }
        Command::Labels => serde_json::to_value(mailbox.list_labels()?)?,
        Command::CreateLabel { name } => serde_json::to_value(mailbox.create_label(&name, None)?)?,
        Command::Delete { id } => {
            let id = MessageId::new(id);
            mailbox.delete_message(&id)?;
            json!({ "deleted": id })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Build the Gmail client and hand it to the facade
fn connect(settings: MailSettings) -> Result<Mailbox> {
    let credentials = GmailCredentials::load()?;
    let auth = GmailAuth::from_credentials(&credentials)?;
    let client = GmailClient::for_user(auth, settings.user_id.clone());
    client.authenticate().context("Gmail authentication failed")?;
    Ok(Mailbox::new(Arc::new(client), settings))
}

fn compose_input(args: &ComposeArgs) -> Result<(String, Vec<std::path::PathBuf>)> {
    let body = match (&args.body, &args.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read body from {}", path.display()))?,
        (None, None) => String::new(),
    };
    Ok((body, args.attachments.clone()))
}

fn receipt_json<T>(receipt: &Receipt<T>, mut record: Value) -> Value {
    record["attachments"] = json!(receipt.attachment_count);
    record["skipped"] = json!(receipt.skipped.iter().map(ToString::to_string).collect::<Vec<_>>());
    record
}

/// Write each attachment into `dir`, keeping only the file name component
fn save_attachments(mailbox: &Mailbox, id: &MessageId, dir: &Path) -> Result<Vec<String>> {
    let attachments = mailbox.download_attachments(id)?;
    if attachments.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut saved = Vec::new();
    for (index, attachment) in attachments.iter().enumerate() {
        let name = Path::new(&attachment.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("attachment-{}", index + 1));
        let path = dir.join(name);
        fs::write(&path, &attachment.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {} ({} bytes)", path.display(), attachment.data.len());
        saved.push(path.display().to_string());
    }
    Ok(saved)
}
