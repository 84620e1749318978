//! Geomarks - command line front end for the marker store.

use std::sync::Arc;

use anyhow::Context;
use geomarks_client::application::services::DEFAULT_SUGGESTION_LIMIT;
use geomarks_client::infrastructure::http::MapsCoTransport;
use geomarks_client::infrastructure::platform::{FileStorage, SystemRandom};
use geomarks_client::{ClientSettings, MarkerStore};
use geomarks_domain::{EntityId, MarkerDraft};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: geomarks <command>

Commands:
  list                      List stored markers
  add <lat> <lng> [title]   Add a marker
  remove <id>               Remove a marker
  select <id|none>          Select a marker, or clear the selection
  selected                  Show the selected marker id
  clear                     Remove all markers and the selection
  suggest <query...>        Search for places
  reverse <lat> <lon>       Look up the address of a coordinate";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geomarks_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = ClientSettings::from_env();
    let storage = match &settings.storage_path {
        Some(path) => FileStorage::at(path.clone()),
        None => FileStorage::new(),
    };
    tracing::debug!(path = %storage.path().display(), "Using storage file");

    let transport = MapsCoTransport::new(
        &settings.geocode_base_url,
        settings.geocode_api_key.clone(),
    );
    let store = MarkerStore::from_settings(
        &settings,
        Arc::new(storage),
        Arc::new(SystemRandom::new()),
        Arc::new(transport),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) => (command.as_str(), rest),
        None => anyhow::bail!(USAGE),
    };

    match command {
        "list" => list(&store).await,
        "add" => add(&store, rest).await,
        "remove" => remove(&store, rest).await,
        "select" => select(&store, rest).await,
        "selected" => selected(&store).await,
        "clear" => {
            store.clear_all_markers().await?;
            println!("All markers removed");
            Ok(())
        }
        "suggest" => suggest(&store, rest).await,
        "reverse" => reverse(&store, rest).await,
        other => anyhow::bail!("Unknown command: {other}\n\n{USAGE}"),
    }
}

fn coordinate(args: &[String], index: usize, name: &str) -> anyhow::Result<f64> {
    let raw = args
        .get(index)
        .with_context(|| format!("missing <{name}>\n\n{USAGE}"))?;
    let value: f64 = raw
        .parse()
        .with_context(|| format!("<{name}> must be a number, got {raw:?}"))?;
    anyhow::ensure!(value.is_finite(), "<{name}> must be finite");
    Ok(value)
}

fn id_arg(args: &[String]) -> anyhow::Result<EntityId> {
    let id = args
        .first()
        .with_context(|| format!("missing <id>\n\n{USAGE}"))?;
    Ok(EntityId::from(id.as_str()))
}

async fn list(store: &MarkerStore) -> anyhow::Result<()> {
    let markers = store.fetch_markers().await;
    let selected = store.hydrate_selected_id().await;

    if markers.is_empty() {
        println!("No markers");
    }
    for marker in markers {
        let flag = if selected.as_ref() == Some(&marker.id) { "*" } else { " " };
        let address = marker.address.as_deref().unwrap_or("-");
        println!(
            "{flag} {}  {:<14} {:>10.5} {:>10.5}  {address}",
            marker.id, marker.title, marker.lat, marker.lng
        );
    }
    Ok(())
}

async fn add(store: &MarkerStore, args: &[String]) -> anyhow::Result<()> {
    let lat = coordinate(args, 0, "lat")?;
    let lng = coordinate(args, 1, "lng")?;
    let title = args.get(2..).map(|words| words.join(" ")).unwrap_or_default();

    // The address is a convenience; a failed lookup still adds the marker.
    let address = match store.reverse_geocode(lat, lng).await {
        Ok(address) => address,
        Err(e) => {
            tracing::warn!(error = %e, "Adding marker without address");
            None
        }
    };

    let marker = if title.trim().is_empty() {
        store.add_marker(lat, lng, address).await?
    } else {
        let mut draft = MarkerDraft::new(title.trim(), lat, lng);
        if let Some(address) = address {
            draft = draft.with_address(address);
        }
        store.add_draft(draft).await?
    };

    println!("{} {}", marker.id, marker.title);
    Ok(())
}

async fn remove(store: &MarkerStore, args: &[String]) -> anyhow::Result<()> {
    let id = id_arg(args)?;
    store.remove_marker(&id).await?;
    println!("Removed {id}");
    Ok(())
}

async fn select(store: &MarkerStore, args: &[String]) -> anyhow::Result<()> {
    let id = id_arg(args)?;
    if id.as_str() == "none" {
        store.set_selected_id(None).await?;
        println!("Selection cleared");
    } else {
        store.set_selected_id(Some(id.clone())).await?;
        println!("Selected {id}");
    }
    Ok(())
}

async fn selected(store: &MarkerStore) -> anyhow::Result<()> {
    match store.hydrate_selected_id().await {
        Some(id) => println!("{id}"),
        None => println!("No selection"),
    }
    Ok(())
}

async fn suggest(store: &MarkerStore, args: &[String]) -> anyhow::Result<()> {
    let query = args.join(" ");
    let items = store.fetch_suggestions(&query, DEFAULT_SUGGESTION_LIMIT).await;

    let state = store.state();
    if let Some(error) = state.error {
        anyhow::bail!(error);
    }
    if let Some(notice) = state.suggestion_notice.filter(|_| items.is_empty()) {
        let message = notice.to_string();
        if !message.is_empty() {
            println!("{message}");
        }
        return Ok(());
    }

    for suggestion in items {
        println!(
            "{:>10.5} {:>10.5}  {}",
            suggestion.value.lat, suggestion.value.lng, suggestion.label
        );
    }
    Ok(())
}

async fn reverse(store: &MarkerStore, args: &[String]) -> anyhow::Result<()> {
    let lat = coordinate(args, 0, "lat")?;
    let lon = coordinate(args, 1, "lon")?;

    let address = store.reverse_geocode(lat, lon).await.map_err(|e| {
        let hint = if e.is_transient() {
            "Lookup failed, try again later"
        } else {
            "Lookup was rejected"
        };
        anyhow::Error::new(e).context(hint)
    })?;

    match address {
        Some(address) => println!("{address}"),
        None => println!("No address found"),
    }
    Ok(())
}
