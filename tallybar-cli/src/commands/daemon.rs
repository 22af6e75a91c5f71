//! Daemon command - poll on the configured interval until interrupted.
//!
//! The poll interval comes from the settings file. The file is re-read once
//! a minute and on `SIGHUP`, so `tallybar config set` in another shell
//! takes effect from the next tick. A second ticker redraws the "Last
//! updated" label once a minute without polling. On Unix, `SIGUSR1`
//! requests an immediate poll.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::io::{Write, stdout};
use std::sync::Arc;
use std::time::Duration;
use tallybar_core::{Alert, UsageEvent};
use tallybar_providers::{PollOutcome, UsagePoller};
use tallybar_store::SettingsStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::Cli;
use crate::app::{App, Output};

/// How often the "Last updated" label is recomputed and settings re-read.
const LABEL_TICK: Duration = Duration::from_secs(60);

/// Arguments for the daemon command.
#[derive(Args)]
pub struct DaemonArgs {
    /// Print each result below the last instead of redrawing the screen.
    #[arg(long)]
    pub no_clear: bool,
}

/// Runs the daemon command.
pub async fn run(args: &DaemonArgs, cli: &Cli) -> Result<()> {
    let app = App::build(cli).await?;
    let out = Output::new(cli);
    let redraw = !args.no_clear && !out.is_json() && !cli.quiet;

    let mut schedule = PollSchedule::new(app.settings.poll_interval().await);
    info!(interval_secs = schedule.period().as_secs(), "Starting daemon");

    let mut settings_rx = app.settings.subscribe();
    let mut events = app.usage.subscribe();
    let mut manual = SignalStream::user_defined1()?;
    let mut hangup = SignalStream::hangup()?;

    let mut label_timer = interval_at(Instant::now() + LABEL_TICK, LABEL_TICK);
    let mut last_alert: Option<Alert> = None;

    loop {
        tokio::select! {
            () = schedule.tick() => {
                spawn_poll(&app.poller, false);
            }
            Some(()) = manual.recv() => {
                spawn_poll(&app.poller, true);
            }
            Some(()) = hangup.recv() => {
                info!("SIGHUP received, re-reading settings");
                reload_settings(&app.settings).await;
            }
            changed = settings_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                schedule.retune(app.settings.poll_interval().await);
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(alert) = app.alerts.evaluate(event.snapshot()).await {
                        if !out.is_json() {
                            print!("\x07");
                        }
                        last_alert = Some(alert.clone());
                        if !redraw {
                            emit_alert(&out, &alert)?;
                        }
                    } else if !app.settings.alert_state().await.alert_shown_for_current_window {
                        last_alert = None;
                    }
                    if redraw {
                        draw(&app, &out, schedule.period(), last_alert.as_ref()).await?;
                    } else {
                        emit_event(&out, cli, &event)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed usage events"),
                Err(RecvError::Closed) => break,
            },
            _ = label_timer.tick() => {
                reload_settings(&app.settings).await;
                if redraw {
                    draw(&app, &out, schedule.period(), last_alert.as_ref()).await?;
                } else if let Some(snapshot) = app.usage.snapshot().await {
                    debug!(label = %snapshot.updated_label(Utc::now()), "Last updated");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, exiting");
                break;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Scheduling
// ============================================================================

/// Poll timer whose period can change between ticks.
struct PollSchedule {
    period: Duration,
    timer: Interval,
}

impl PollSchedule {
    /// Creates a schedule whose first tick fires immediately.
    fn new(period: Duration) -> Self {
        Self {
            period,
            timer: poll_interval(Instant::now(), period),
        }
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) {
        self.timer.tick().await;
    }

    /// Applies `period` from the next tick on, counted from now.
    ///
    /// Returns false when the period is unchanged.
    fn retune(&mut self, period: Duration) -> bool {
        if period == self.period {
            return false;
        }
        info!(
            old_secs = self.period.as_secs(),
            new_secs = period.as_secs(),
            "Poll interval changed"
        );
        self.period = period;
        self.timer = poll_interval(Instant::now() + period, period);
        true
    }
}

fn poll_interval(start: Instant, period: Duration) -> Interval {
    let mut timer = interval_at(start, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Runs a poll in its own task so a schedule change never cancels it.
fn spawn_poll(poller: &Arc<UsagePoller>, manual: bool) -> JoinHandle<PollOutcome> {
    let poller = Arc::clone(poller);
    tokio::spawn(async move {
        let outcome = if manual {
            poller.trigger().await
        } else {
            poller.poll().await
        };
        debug!(?outcome, "Poll finished");
        outcome
    })
}

/// Picks up settings written by other processes; a change reaches the loop
/// through the settings watch.
async fn reload_settings(settings: &SettingsStore) {
    if let Err(e) = settings.reload().await {
        warn!(path = %settings.path().display(), error = %e, "Failed to re-read settings");
    }
}

// ============================================================================
// Output
// ============================================================================

fn emit_event(out: &Output, cli: &Cli, event: &UsageEvent) -> Result<()> {
    if out.is_json() {
        println!("{}", out.json.format_event(event)?);
        return Ok(());
    }
    let stamp = event.at.with_timezone(&chrono::Local).format("%H:%M");
    match &event.result {
        Ok(snapshot) => println!("[{stamp}] {}", snapshot.tooltip()),
        Err(error) if !cli.quiet => println!("[{stamp}] {}", out.text.format_error(error)),
        Err(_) => {}
    }
    Ok(())
}

fn emit_alert(out: &Output, alert: &Alert) -> Result<()> {
    if out.is_json() {
        println!("{}", out.json.format_alert(alert)?);
    } else {
        println!("{}", out.text.format_alert(alert));
    }
    Ok(())
}

async fn draw(app: &App, out: &Output, period: Duration, alert: Option<&Alert>) -> Result<()> {
    // Clear screen
    print!("\x1b[2J\x1b[H");

    let now = Utc::now();
    println!(
        "TallyBar - {} (poll: {} min)",
        now.with_timezone(&chrono::Local).format("%H:%M:%S"),
        period.as_secs() / 60
    );
    println!("{}", "─".repeat(50));
    println!();

    match (app.usage.snapshot().await, app.usage.error().await) {
        (Some(snapshot), _) => println!("{}", out.text.format_usage(&snapshot, now)),
        (None, Some(error)) => println!("{}", out.text.format_error(&error)),
        (None, None) => println!("Waiting for first poll..."),
    }

    if let Some(alert) = alert {
        println!();
        println!("{}", out.text.format_alert(alert));
    }

    println!();
    println!("Press Ctrl+C to exit");
    stdout().flush()?;
    Ok(())
}

// ============================================================================
// Signals
// ============================================================================

/// A Unix signal as a stream of `()`; never fires elsewhere.
#[cfg(unix)]
struct SignalStream(tokio::signal::unix::Signal);

#[cfg(unix)]
impl SignalStream {
    fn user_defined1() -> Result<Self> {
        Self::of(tokio::signal::unix::SignalKind::user_defined1())
    }

    fn hangup() -> Result<Self> {
        Self::of(tokio::signal::unix::SignalKind::hangup())
    }

    fn of(kind: tokio::signal::unix::SignalKind) -> Result<Self> {
        Ok(Self(tokio::signal::unix::signal(kind)?))
    }

    async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

#[cfg(not(unix))]
struct SignalStream;

#[cfg(not(unix))]
impl SignalStream {
    #[allow(clippy::unnecessary_wraps)]
    fn user_defined1() -> Result<Self> {
        Ok(Self)
    }

    #[allow(clippy::unnecessary_wraps)]
    fn hangup() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}

// ============================================================================
// Tests
// ============================================================================
