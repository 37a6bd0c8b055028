//! File watching and live reload.
//!
//! One watch binding is registered per asset class at startup, associating
//! a source glob with the chain to re-run. Debounced filesystem events flow
//! through a channel into a single dispatcher loop; the loop re-runs every
//! chain whose binding matched and signals connected browsers to reload
//! only after the triggered chains have fully completed, so a client never
//! reloads against a half-written output set. A failed chain sends no
//! reload and leaves the watcher running.

use std::collections::HashSet;
use std::env;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, DebouncedEvent, new_debouncer};
use tungstenite::WebSocket;

use crate::config::EnvConfig;
use crate::error::WatchError;
use crate::task::{Chain, run_concurrent};
use crate::transform::{SRC_DATA, SRC_SCRIPTS, SRC_STYLES, SRC_TEMPLATES};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Association between a source pattern and the chain to re-run on change.
/// Created once at watcher startup, immutable afterwards.
struct Binding {
    chain: &'static str,
    base: &'static str,
    pattern: Pattern,
}

fn bindings() -> Result<Vec<Binding>, WatchError> {
    [
        ("styles", SRC_STYLES, "**/*.scss"),
        ("templates", SRC_TEMPLATES, "**/*.html"),
        ("scripts", SRC_SCRIPTS, "**/*.js"),
        ("data", SRC_DATA, "**/*.json"),
    ]
    .into_iter()
    .map(|(chain, base, glob)| {
        Ok(Binding {
            chain,
            base,
            pattern: Pattern::new(Utf8Path::new(base).join(glob).as_str())?,
        })
    })
    .collect()
}

fn reserve_port() -> Result<(TcpListener, u16), WatchError> {
    // The conventional livereload port, falling back to an ephemeral one.
    let listener = match TcpListener::bind("127.0.0.1:35729") {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0").map_err(WatchError::Bind)?,
    };

    let addr = listener.local_addr().map_err(WatchError::Bind)?;
    Ok((listener, addr.port()))
}

pub fn watch(chains: &[Chain], config: &EnvConfig) -> Result<(), WatchError> {
    let root = env::current_dir()?;
    let bindings = bindings()?;

    let (tcp, port) = reserve_port()?;
    eprintln!("Live reload on ws://localhost:{port}/");

    let client = Arc::new(Mutex::new(vec![]));
    let thread_i = new_thread_ws_incoming(tcp, client.clone());
    let (tx_reload, thread_o) = new_thread_ws_reload(client.clone());

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, None, tx)?;

    for base in bindings.iter().map(|b| b.base).collect::<HashSet<_>>() {
        let base = Path::new(base);
        if base.exists() {
            debouncer.watch(base, RecursiveMode::Recursive)?;
        }
    }

    while let Ok(batch) = rx.recv() {
        let events = batch_events(batch);

        let changed = match events
            .iter()
            .filter(|de| {
                matches!(
                    de.event.kind,
                    EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
                )
            })
            .flat_map(|de| &de.event.paths)
            .try_fold(
                HashSet::new(),
                |mut acc, path| -> Result<_, anyhow::Error> {
                    let path = path.strip_prefix(&root).unwrap_or(path);
                    acc.insert(Utf8PathBuf::try_from(path.to_path_buf())?);
                    Ok(acc)
                },
            ) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("Ignoring unreadable change event: {e}");
                continue;
            }
        };

        if changed.is_empty() {
            continue;
        }

        let dirty = dirty_chains(chains, &bindings, &changed);
        if dirty.is_empty() {
            continue;
        }

        let start = Instant::now();
        let report = run_concurrent(&dirty, config);

        // Reload only once every triggered chain has finished, and only if
        // something actually rebuilt.
        if report.any_succeeded() {
            tx_reload.send(())?;
        }

        println!("Refreshed in {:?}", start.elapsed());
    }

    thread_i.join().expect("websocket accept thread panicked");
    thread_o.join().expect("websocket reload thread panicked");

    Ok(())
}

/// Unpack one debounced batch. A failed batch is logged and swallowed so
/// the dispatcher loop keeps running; only channel closure ends the watch.
fn batch_events(batch: DebounceEventResult) -> Vec<DebouncedEvent> {
    match batch {
        Ok(events) => events,
        Err(errors) => {
            for err in errors {
                tracing::warn!("Watch error: {err}");
            }

            Vec::new()
        }
    }
}

/// Select the chains whose binding matches at least one changed path.
/// Bindings are independent; an edit touching several asset classes fires
/// each of their chains.
fn dirty_chains<'a>(
    chains: &'a [Chain],
    bindings: &[Binding],
    changed: &HashSet<Utf8PathBuf>,
) -> Vec<&'a Chain> {
    chains
        .iter()
        .filter(|chain| {
            bindings.iter().any(|binding| {
                binding.chain == chain.name
                    && changed.iter().any(|path| binding.pattern.matches_path(path.as_std_path()))
            })
        })
        .collect()
}

fn new_thread_ws_incoming(
    server: TcpListener,
    client: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Rejected websocket connection: {e}");
                    continue;
                }
            };

            match tungstenite::accept(stream) {
                Ok(socket) => client.lock().unwrap().push(socket),
                Err(e) => tracing::warn!("Websocket handshake failed: {e}"),
            }
        }
    })
}

fn new_thread_ws_reload(
    client: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
) -> (Sender<()>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = std::thread::spawn(move || {
        while rx.recv().is_ok() {
            let mut clients = client.lock().unwrap();

            // Drop clients whose pipe broke; browsers reconnect on reload.
            clients.retain_mut(|socket| match socket.send("reload".into()) {
                Ok(_) => true,
                Err(tungstenite::error::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::BrokenPipe =>
                {
                    false
                }
                Err(e) => {
                    tracing::warn!("Websocket send failed: {e}");
                    true
                }
            });
        }
    });

    (tx, thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn noop_chain(name: &'static str) -> Chain {
        Chain::new(name).then(Task::new("noop", |_| Ok(())))
    }

    #[test]
    fn test_bindings_route_to_their_chain() {
        let chains = vec![
            noop_chain("styles"),
            noop_chain("templates"),
            noop_chain("scripts"),
            noop_chain("data"),
        ];
        let bindings = bindings().unwrap();

        let changed = HashSet::from([Utf8PathBuf::from("src/assets/scss/parts/_card.scss")]);
        let dirty = dirty_chains(&chains, &bindings, &changed);
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].name, "styles");

        let changed = HashSet::from([Utf8PathBuf::from("src/data/feed.json")]);
        let dirty = dirty_chains(&chains, &bindings, &changed);
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].name, "data");
    }

    #[test]
    fn test_concurrent_edits_fire_independent_chains() {
        let chains = vec![noop_chain("styles"), noop_chain("scripts")];
        let bindings = bindings().unwrap();

        let changed = HashSet::from([
            Utf8PathBuf::from("src/assets/scss/style.scss"),
            Utf8PathBuf::from("src/assets/js/utils/date.js"),
        ]);

        let mut dirty: Vec<_> = dirty_chains(&chains, &bindings, &changed)
            .iter()
            .map(|c| c.name)
            .collect();
        dirty.sort_unstable();
        assert_eq!(dirty, vec!["scripts", "styles"]);
    }

    #[test]
    fn test_error_batches_are_swallowed() {
        // A failed notify batch yields no events instead of ending the
        // dispatcher loop.
        let errors = vec![notify::Error::generic("watch backend hiccup")];
        assert!(batch_events(Err(errors)).is_empty());

        assert!(batch_events(Ok(Vec::new())).is_empty());
    }

    #[test]
    fn test_unrelated_changes_fire_nothing() {
        let chains = vec![noop_chain("styles")];
        let bindings = bindings().unwrap();

        let changed = HashSet::from([Utf8PathBuf::from("README.md")]);
        assert!(dirty_chains(&chains, &bindings, &changed).is_empty());

        // Images are rebuilt only by the build entry point, never watched.
        let changed = HashSet::from([Utf8PathBuf::from("src/assets/images/photo.png")]);
        assert!(dirty_chains(&chains, &bindings, &changed).is_empty());
    }
}
