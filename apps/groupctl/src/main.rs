use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    GroupEvent, GroupLifecycle, GroupStore, LifecycleConfig, SelectionCoordinator,
};
use shared::{
    domain::{GroupDraft, GroupId, SelectedGroup},
    protocol::{Notice, NoticeLevel},
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, DEFAULT_CONFIG_PATH};

/// Manage contact groups stored in a local SQLite database.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    undo_window_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List groups; trashed ones only with --all.
    List {
        #[arg(long)]
        all: bool,
    },
    Create {
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    /// Trash a group, then wait out the undo window. Ctrl-C undoes the deletion.
    Delete {
        id: String,
        /// Treat the group as the selected one while deleting it.
        #[arg(long)]
        selected: bool,
        /// Undo automatically after this many milliseconds.
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
    /// Purge every trashed group now.
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    if let Some(undo_window_ms) = cli.undo_window_ms {
        settings.undo_window_ms = undo_window_ms;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let storage = Storage::new(&settings.database_url)
        .await
        .map_err(|error| {
            error!(
                database_url = %settings.database_url,
                %error,
                "failed to open SQLite database"
            );
            error
        })?;
    storage.health_check().await?;
    let store: Arc<dyn GroupStore> = Arc::new(storage.clone());
    let selection = Arc::new(SelectionCoordinator::new());
    let lifecycle = GroupLifecycle::new(
        store.clone(),
        selection.clone(),
        LifecycleConfig {
            undo_window: settings.undo_window(),
        },
    );
    let printer = spawn_notice_printer(lifecycle.subscribe_events());

    let result = run(cli.command, &storage, &store, &lifecycle).await;
    let menu = lifecycle.menu().await;
    if let Some(group_id) = menu.edited_group_id {
        info!(%group_id, "inline edit left open");
    }

    lifecycle.shutdown().await;
    printer.abort();
    result
}

async fn run(
    command: Command,
    storage: &Storage,
    store: &Arc<dyn GroupStore>,
    lifecycle: &Arc<GroupLifecycle>,
) -> Result<()> {
    match command {
        Command::List { all } => {
            for record in storage.list_group_records().await? {
                if record.group.trashed && !all {
                    continue;
                }
                println!(
                    "{}\t{}{}\tupdated {}",
                    record.group.id,
                    record.group.name,
                    if record.group.trashed { " (trashed)" } else { "" },
                    record.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Create { name } => {
            let groups = store.list_groups().await?;
            if let Ok(group) = lifecycle
                .create_group(&groups, GroupDraft::named(name))
                .await
            {
                println!("created group_id={}", group.id);
            }
        }
        Command::Rename { id, name } => {
            let groups = store.list_groups().await?;
            let id = GroupId::new(id);
            lifecycle.edit_group(id.clone()).await;
            let _ = lifecycle.rename_group(&groups, &id, name).await;
        }
        Command::Delete {
            id,
            selected,
            cancel_after_ms,
        } => {
            delete_with_undo(storage, lifecycle, GroupId::new(id), selected, cancel_after_ms)
                .await?
        }
        Command::Sweep => {
            let purged = storage.clean_trashed_groups().await?;
            println!("purged {purged} trashed group(s)");
        }
    }

    // Let the printer flush notices emitted by the last intent.
    tokio::task::yield_now().await;
    Ok(())
}

async fn delete_with_undo(
    storage: &Storage,
    lifecycle: &Arc<GroupLifecycle>,
    id: GroupId,
    selected: bool,
    cancel_after_ms: Option<u64>,
) -> Result<()> {
    let group = storage
        .get_group(&id)
        .await?
        .filter(|group| group.is_active())
        .ok_or_else(|| anyhow!("no active group with id {id}"))?;
    if selected {
        lifecycle
            .selection()
            .set_selected_group(SelectedGroup::Group(group.clone()));
    }

    let mut events = lifecycle.subscribe_events();
    let Ok(flagged) = lifecycle.delete_group(&group).await else {
        return Ok(());
    };
    info!(
        group_id = %flagged.id,
        selection = ?lifecycle.selection().selected_group().group_id(),
        "group trashed"
    );

    let cancel_after = cancel_after_ms.map(Duration::from_millis);
    let deadline = lifecycle.config().undo_window * 2;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            lifecycle.cancel_delete(&flagged).await.ok();
        }
        _ = sleep_or_pending(cancel_after) => {
            lifecycle.cancel_delete(&flagged).await.ok();
        }
        swept = wait_for_sweep(&mut events) => {
            if !swept {
                error!("event stream closed before the sweep");
            }
        }
        _ = tokio::time::sleep(deadline) => {
            error!(group_id = %flagged.id, "sweep did not run within the expected window");
        }
    }
    Ok(())
}

async fn sleep_or_pending(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_sweep(events: &mut broadcast::Receiver<GroupEvent>) -> bool {
    loop {
        match events.recv().await {
            Ok(GroupEvent::Swept) => return true,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}

fn spawn_notice_printer(
    mut events: broadcast::Receiver<GroupEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(GroupEvent::Notice(notice)) => println!("{}", format_notice(&notice)),
                Ok(GroupEvent::Created(group)) => info!(group_id = %group.id, "group created"),
                Ok(GroupEvent::Swept) => println!("trashed groups purged"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    error!(skipped, "notice printer lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn format_notice(notice: &Notice) -> String {
    let level = match notice.level {
        NoticeLevel::Success => "success",
        NoticeLevel::Error => "error",
        NoticeLevel::Info => "info",
    };
    let mut line = format!("[{level}] {}", notice.key);
    for (key, value) in &notice.params {
        line.push_str(&format!(" {key}={value:?}"));
    }
    if let (Some(action), Some(duration)) = (&notice.action, notice.duration()) {
        line.push_str(&format!(
            " ({} within {}ms, Ctrl-C)",
            action.button_label_key(),
            duration.as_millis()
        ));
    }
    line
}
