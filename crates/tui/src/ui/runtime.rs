//! Runtime: event loop and effect execution for the TUI.
//!
//! - Owns the terminal lifecycle (raw mode, alternate screen).
//! - Input is read on a dedicated task and forwarded over a channel.
//! - A single `select!` loop multiplexes input, ticks, finished external
//!   actions and Ctrl+C.
//! - Ticks are fast (100 ms) while an action is in flight or a notification
//!   is visible, and slow (1 s) otherwise; the slow tick still drives the
//!   periodic MCP tool refresh.
//! - Effects returned by state transitions are executed right away through
//!   [`cmd::run_from_effects`].

use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::{StreamExt, stream::FuturesUnordered};
use ratatui::{Terminal, prelude::CrosstermBackend};
use skitz_engine::{ActionGateway, WizardRegistry};
use skitz_types::{ActionCompletion, Effect, Msg};
use tokio::task::JoinHandle;
use tokio::{
    signal,
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::app::{App, SharedCtx};
use crate::cmd;
use crate::ui::main::MainView;
use crate::ui::theme::{self, Theme};

type Backend = CrosstermBackend<Stdout>;

/// Forward terminal events from a dedicated blocking task.
fn spawn_input_thread() -> mpsc::Receiver<Event> {
    let (sender, receiver) = mpsc::channel(500);
    tokio::task::spawn_blocking(move || {
        let poll_interval = Duration::from_millis(16);
        loop {
            match event::poll(poll_interval) {
                Ok(false) => {
                    if sender.is_closed() {
                        break;
                    }
                }
                Ok(true) => match event::read() {
                    Ok(event) => {
                        if sender.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!("Failed to read event: {}", error);
                        break;
                    }
                },
                Err(error) => {
                    warn!("Failed to poll for events: {}", error);
                    break;
                }
            }
        }
    });
    receiver
}

fn setup_terminal() -> Result<Terminal<Backend>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")
}

fn cleanup_terminal(terminal: &mut Terminal<Backend>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn render(terminal: &mut Terminal<Backend>, app: &App, view: &mut MainView, theme: &dyn Theme) -> Result<()> {
    terminal.draw(|frame| view.draw(frame, app, theme))?;
    Ok(())
}

fn handle_input_event(app: &mut App, event: Event) -> Vec<Effect> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => app.handle_key(key),
        Event::Resize(width, height) => app.update(Msg::Resize(width, height)),
        _ => Vec::new(),
    }
}

/// Run effects until no follow-ups remain, collecting spawned actions.
fn process_effects(
    app: &mut App,
    mut effects: Vec<Effect>,
    gateway: &Arc<dyn ActionGateway>,
    pending: &mut FuturesUnordered<JoinHandle<ActionCompletion>>,
) {
    while !effects.is_empty() {
        let batch = cmd::run_from_effects(app, effects, gateway);
        pending.extend(batch.pending);
        effects = batch.follow_up;
    }
}

/// Set up the terminal, run the event loop until the user quits, and restore the terminal.
pub async fn run_app(ctx: SharedCtx, registry: Arc<WizardRegistry>, gateway: Arc<dyn ActionGateway>) -> Result<()> {
    let theme = theme::load();
    let mut app = App::new(ctx, registry);
    let mut view = MainView::default();
    let mut pending: FuturesUnordered<JoinHandle<ActionCompletion>> = FuturesUnordered::new();

    let mut terminal = setup_terminal()?;
    let mut input_receiver = spawn_input_thread();

    // Discover MCP tools once at startup; later refreshes follow the configured interval.
    process_effects(&mut app, vec![Effect::RefreshTools], &gateway, &mut pending);

    let fast_interval = Duration::from_millis(100);
    let idle_interval = Duration::from_millis(1000);
    let mut current_interval = idle_interval;
    let mut ticker = time::interval(current_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = async {
        render(&mut terminal, &app, &mut view, theme.as_ref())?;
        loop {
            let needs_animation = !pending.is_empty() || !app.notifications.is_empty();
            let target_interval = if needs_animation { fast_interval } else { idle_interval };
            if target_interval != current_interval {
                current_interval = target_interval;
                ticker = time::interval(current_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }

            tokio::select! {
                maybe_event = input_receiver.recv() => {
                    let Some(event) = maybe_event else {
                        debug!("input channel closed");
                        break;
                    };
                    let effects = handle_input_event(&mut app, event);
                    process_effects(&mut app, effects, &gateway, &mut pending);
                }
                _ = ticker.tick() => {
                    let effects = app.update(Msg::Tick);
                    process_effects(&mut app, effects, &gateway, &mut pending);
                }
                Some(joined) = pending.next(), if !pending.is_empty() => {
                    match joined {
                        Ok(completion) => {
                            let effects = app.update(Msg::ActionCompleted(completion));
                            process_effects(&mut app, effects, &gateway, &mut pending);
                        }
                        Err(error) => warn!("Action task failed: {}", error),
                    }
                }
                _ = signal::ctrl_c() => break,
            }

            if app.should_quit {
                break;
            }
            render(&mut terminal, &app, &mut view, theme.as_ref())?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    cleanup_terminal(&mut terminal)?;
    result
}
