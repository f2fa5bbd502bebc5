//! `carepal` - CLI for the carepal lifecycle core
//!
//! This binary drives the order, booking and errand stores and the call and
//! payment simulators from the command line. Stores are restored from the
//! local database on start and saved after every mutating command.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};

use carepal::call::session_from_config;
use carepal::cli::{
    BookingCommand, CallCommand, Cli, Command, ConfigCommand, ErrandCommand, OrderCommand,
    OutputFormat, SetStatusArgs,
};
use carepal::clock::system_clock;
use carepal::{
    drive_realtime, drive_virtual, AppState, BookingStatus, CallSession, Checkout, Config,
    ErrandStatus, Lifecycle, OrderStatus, Schedule, StatusTracker, Storage, Timed, Tracked,
    UpdateOutcome,
};
use carepal::init_logging;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Commands that never touch the stores
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        Command::Call(call_cmd) => return handle_call(&config, call_cmd),
        other => other,
    };

    let storage = Storage::open(config.database_path())?;
    let mut state = AppState::load(&storage, config.lifecycle.policy, system_clock())?;
    let mutates = command.mutates_state();

    match command {
        Command::Order(cmd) => handle_order(&config, &mut state, cmd)?,
        Command::Booking(cmd) => handle_booking(&mut state, cmd)?,
        Command::Errand(cmd) => handle_errand(&mut state, cmd)?,
        Command::Reset(cmd) => handle_reset(&storage, &mut state, cmd.yes)?,
        Command::Status(cmd) => handle_status(&config, &storage, &state, cmd.json)?,
        Command::Config(_) | Command::Call(_) => {}
    }

    if mutates {
        if config.storage.autosave {
            state.save(&storage)?;
        } else {
            warn!("autosave is disabled; changes were not saved");
        }
    }
    Ok(())
}

fn handle_order(config: &Config, state: &mut AppState, cmd: OrderCommand) -> CliResult {
    match cmd {
        OrderCommand::Create { title, amount } => {
            let id = state.place_order(title, amount);
            println!("{id}");
        }
        OrderCommand::List(args) => {
            print_records(&state.orders, args.format, &["ID", "STATUS", "AMOUNT", "SERVICE"], |o| {
                vec![
                    o.id.clone(),
                    o.status.to_string(),
                    o.amount.to_string(),
                    o.service_title.clone(),
                ]
            })?;
        }
        OrderCommand::Set(args) => {
            let status: OrderStatus = args.status.parse()?;
            let outcome = state.set_order_status(&args.id, status)?;
            report_update(&args, outcome);
        }
        OrderCommand::Checkout { id, seed, realtime } => {
            let mut payment = config.payment.clone();
            if seed.is_some() {
                payment.seed = seed;
            }
            let mut checkout = Checkout::simulated(&payment)?;
            checkout.begin(state, &id)?;
            println!(
                "Payment submitted for {id}; settling in {}ms",
                payment.processing_delay_ms
            );
            play(&mut checkout.run(state), Duration::MAX, realtime, |step| {
                println!("{step}");
            })?;
            if let Some(order) = state.orders.get(&id) {
                println!("{id} is now {}", order.status);
            }
        }
    }
    Ok(())
}

fn handle_booking(state: &mut AppState, cmd: BookingCommand) -> CliResult {
    match cmd {
        BookingCommand::Create {
            pal,
            price,
            date,
            start,
            hours,
            notes,
        } => {
            let schedule = Schedule {
                date,
                start_time: start,
                duration_hours: hours,
            };
            let id = state.request_booking(pal, price, schedule, notes);
            println!("{id}");
        }
        BookingCommand::List(args) => {
            print_records(
                &state.bookings,
                args.format,
                &["ID", "STATUS", "PAL", "PRICE", "WHEN"],
                |b| {
                    vec![
                        b.id.clone(),
                        b.status.to_string(),
                        b.pal_id.clone(),
                        b.price.to_string(),
                        format!(
                            "{} {} ({}h)",
                            b.schedule.date,
                            b.schedule.start_time.format("%H:%M"),
                            b.schedule.duration_hours
                        ),
                    ]
                },
            )?;
        }
        BookingCommand::Set(args) => {
            let status: BookingStatus = args.status.parse()?;
            let outcome = state.set_booking_status(&args.id, status)?;
            report_update(&args, outcome);
        }
    }
    Ok(())
}

fn handle_errand(state: &mut AppState, cmd: ErrandCommand) -> CliResult {
    match cmd {
        ErrandCommand::Create { title, reward } => {
            let id = state.post_errand(title, reward);
            println!("{id}");
        }
        ErrandCommand::List(args) => {
            print_records(
                &state.errands,
                args.format,
                &["ID", "STATUS", "REWARD", "PAL", "TITLE"],
                |e| {
                    vec![
                        e.id.clone(),
                        e.status.to_string(),
                        e.reward.to_string(),
                        e.assigned_pal.clone().unwrap_or_else(|| "-".to_string()),
                        e.title.clone(),
                    ]
                },
            )?;
        }
        ErrandCommand::Set(args) => {
            let status: ErrandStatus = args.status.parse()?;
            let outcome = state.set_errand_status(&args.id, status)?;
            report_update(&args, outcome);
        }
        ErrandCommand::Start { id, pal } => {
            let outcome = state.start_errand(&id, pal)?;
            let args = SetStatusArgs {
                id,
                status: ErrandStatus::InProgress.to_string(),
            };
            report_update(&args, outcome);
        }
    }
    Ok(())
}

fn report_update<S: Lifecycle>(args: &SetStatusArgs, outcome: UpdateOutcome<S>) {
    match outcome {
        UpdateOutcome::Updated { from, to } => println!("{}: {from} -> {to}", args.id),
        UpdateOutcome::Unchanged => println!("{}: already {}", args.id, args.status),
        UpdateOutcome::NotFound => println!("No {} with id '{}'; nothing changed.", S::ENTITY, args.id),
    }
}

fn print_records<E: Tracked>(
    tracker: &StatusTracker<E>,
    format: OutputFormat,
    headers: &[&str],
    row: impl Fn(&E) -> Vec<String>,
) -> CliResult {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&tracker.snapshot())?);
        return Ok(());
    }
    if tracker.is_empty() {
        println!("No {}s.", E::Status::ENTITY);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tracker.iter().map(row).collect();
    match format {
        OutputFormat::Table => {
            let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
            for r in &rows {
                for (width, cell) in widths.iter_mut().zip(r) {
                    *width = (*width).max(cell.chars().count());
                }
            }
            let line = |cells: Vec<String>| {
                cells
                    .iter()
                    .zip(&widths)
                    .map(|(c, &w)| format!("{c:<w$}"))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            };
            println!("{}", line(headers.iter().map(ToString::to_string).collect()));
            println!("{}", line(widths.iter().map(|w| "-".repeat(*w)).collect()));
            for r in rows {
                println!("{}", line(r));
            }
        }
        OutputFormat::Plain | OutputFormat::Json => {
            for r in rows {
                println!("{}", r.join("  "));
            }
        }
    }
    Ok(())
}

fn handle_call(config: &Config, cmd: CallCommand) -> CliResult {
    let CallCommand::Simulate {
        contact,
        end_at_ms,
        reject_at_ms,
        duration_ms,
        realtime,
    } = cmd;

    let limit = Duration::from_millis(duration_ms);
    let cutoff = end_at_ms
        .or(reject_at_ms)
        .map_or(limit, Duration::from_millis)
        .min(limit);

    let mut session = session_from_config(contact, &config.call)?;
    session.start()?;
    print_last(&session);

    play(&mut session, cutoff, realtime, |step| println!("{step}"))?;
    let rest = cutoff.saturating_sub(session.elapsed());
    if realtime {
        sleep_blocking(rest)?;
    }
    for step in session.advance(rest) {
        println!("{step}");
    }

    if !session.status().is_terminal() {
        let before = session.history().len();
        if reject_at_ms.is_some_and(|at| Duration::from_millis(at) <= limit) {
            if let Err(e) = session.reject() {
                println!("Cannot reject: {e}");
                session.end();
            }
        } else {
            session.end();
        }
        if session.history().len() > before {
            print_last(&session);
        }
    }

    println!(
        "Call with {} finished: {} after {}s of conversation",
        session.contact(),
        session.status(),
        session.duration_secs()
    );
    Ok(())
}

fn print_last(session: &CallSession) {
    if let Some(change) = session.history().last() {
        println!("{change}");
    }
}

/// Drive `timed` up to `until`, in virtual time or on the tokio clock.
fn play<T: Timed>(
    timed: &mut T,
    until: Duration,
    realtime: bool,
    mut on_step: impl FnMut(&T::Step),
) -> CliResult {
    if realtime {
        debug!("driving timers in real time");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(drive_realtime(timed, until, &mut on_step));
    } else {
        drive_virtual(timed, until, &mut on_step);
    }
    Ok(())
}

fn sleep_blocking(by: Duration) -> CliResult {
    if by.is_zero() {
        return Ok(());
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(tokio::time::sleep(by));
    Ok(())
}

fn handle_reset(storage: &Storage, state: &mut AppState, yes: bool) -> CliResult {
    if !yes {
        println!(
            "This will delete {} orders, {} bookings and {} errands.",
            state.orders.len(),
            state.bookings.len(),
            state.errands.len()
        );
        println!("Use --yes to confirm.");
        return Ok(());
    }
    let summary = state.clear_all();
    storage.clear()?;
    println!("Cleared {} records.", summary.total());
    Ok(())
}

fn handle_status(config: &Config, storage: &Storage, state: &AppState, json: bool) -> CliResult {
    let stats = storage.stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "policy": config.lifecycle.policy,
            "orders": state.orders.len(),
            "bookings": state.bookings.len(),
            "errands": state.errands.len(),
            "storage": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("carepal status");
        println!("--------------");
        println!("Database:      {}", storage.path().display());
        println!("Policy:        {}", config.lifecycle.policy);
        println!("Orders:        {}", state.orders.len());
        println!("Bookings:      {}", state.bookings.len());
        println!("Errands:       {}", state.errands.len());
        println!("Snapshots:     {}", stats.namespaces);
        println!("Payload bytes: {}", stats.payload_bytes);
        println!("DB size:       {} bytes", stats.db_size_bytes);
        match stats.last_write {
            Some(at) => println!("Last saved:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last saved:    never"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Autosave:           {}", config.storage.autosave);
                println!();
                println!("[Call]");
                println!("  Ringing after:      {}ms", config.call.ringing_after_ms);
                println!("  Connecting after:   {}ms", config.call.connecting_after_ms);
                println!("  Active after:       {}ms", config.call.active_after_ms);
                println!("  No answer after:    {}ms", config.call.no_answer_after_ms);
                println!();
                println!("[Payment]");
                println!("  Success rate:       {}", config.payment.success_rate);
                println!("  Processing delay:   {}ms", config.payment.processing_delay_ms);
                println!(
                    "  Auto-confirm after: {}ms",
                    config.payment.auto_confirm_after_ms
                );
                match config.payment.seed {
                    Some(seed) => println!("  Seed:               {seed}"),
                    None => println!("  Seed:               random"),
                }
                println!();
                println!("[Lifecycle]");
                println!("  Policy:             {}", config.lifecycle.policy);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
