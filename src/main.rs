mod active;
mod cache;
mod completion;
mod cycle;
mod date;
mod error;
mod habits;
mod model;
mod output;
mod points;
mod settings;
mod stable_json;
mod store;

use crate::cache::{invalidate, is_within_window, read_cache, read_envelope, write_cache};
use crate::completion::with_completion;
use crate::cycle::resolve_cycle_start;
use crate::date::{
    effective_date_key, parse_date_key, parse_stamp, system_now, LocalStamp, ResetTime,
};
use crate::error::CliError;
use crate::habits::{
    add_increment, load_habits, make_habit, mark_done, mark_undone, next_habit_id, save_habits,
    select_habit, snooze, stable_habit_sort, unsnooze,
};
use crate::model::{Frequency, Habit, Weekday};
use crate::output::{render_table, Styler};
use crate::points::{add_points, total_points};
use crate::settings::{load_reset_time, save_reset_time};
use crate::stable_json::stable_to_string_pretty;
use crate::store::{resolve_store_path, FileStore};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FrequencyArg {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl FrequencyArg {
    fn to_frequency(self) -> Frequency {
        match self {
            FrequencyArg::Once => Frequency::OneTime,
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "habitboard", version, about = "Local-first habit cycle tracker")]
struct Cli {
    /// Overrides the store path for this invocation.
    #[arg(long, global = true)]
    store: Option<String>,

    /// Logical "now" (YYYY-MM-DD or YYYY-MM-DDTHH:MM) for deterministic
    /// scheduling. A bare date is taken late in the day, so it denotes that
    /// habit day under any reset boundary.
    #[arg(long, global = true)]
    now: Option<String>,

    #[arg(long, global = true, value_enum, default_value = "table")]
    format: Format,

    /// Disables ANSI color output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Add(AddArgs),
    List(ListArgs),
    Show(SelectorArgs),
    Archive(SelectorArgs),
    Unarchive(SelectorArgs),
    /// Marks the current cycle complete and awards points.
    Done(DoneArgs),
    Undone(SelectorArgs),
    /// Adds quantity progress (miles, reps, ...) to the current cycle.
    Log(LogArgs),
    Snooze(SnoozeArgs),
    Unsnooze(SelectorArgs),
    /// Prints the cycle-start key completion lookups use at --now.
    Cycle(SelectorArgs),
    /// Scheduled habits for a day, annotated with completion state.
    Today(TodayArgs),
    Cache(CacheArgs),
    ResetTime(ResetTimeArgs),
    Points,
}

#[derive(Args, Debug)]
struct AddArgs {
    name: String,

    #[arg(long, value_enum, default_value = "daily")]
    frequency: FrequencyArg,

    /// Earliest active date (YYYY-MM-DD). Defaults to the effective today.
    #[arg(long)]
    start: Option<String>,

    /// Weekly only: comma-separated weekday names (mon,tue,...,sun).
    #[arg(long, value_delimiter = ',')]
    days: Vec<String>,

    /// One-time only: stay active until explicitly completed.
    #[arg(long)]
    keep_until: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Include archived habits
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct SelectorArgs {
    /// Habit selector: exact id (h0001) or unique name prefix (case-insensitive)
    habit: String,
}

#[derive(Args, Debug)]
struct DoneArgs {
    /// Habit selector: exact id (h0001) or unique name prefix (case-insensitive)
    habit: String,

    /// Points awarded for a newly completed cycle.
    #[arg(long, default_value_t = 1)]
    points: u64,
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Habit selector: exact id (h0001) or unique name prefix (case-insensitive)
    habit: String,

    /// Amount to add, > 0. Fractions allowed.
    #[arg(long)]
    amount: f64,
}

#[derive(Args, Debug)]
struct SnoozeArgs {
    /// Habit selector: exact id (h0001) or unique name prefix (case-insensitive)
    habit: String,

    /// Hidden while the effective day is before this date.
    #[arg(long)]
    until: String,
}

#[derive(Args, Debug)]
struct TodayArgs {
    /// Evaluate a different day than --now (YYYY-MM-DD).
    #[arg(long)]
    date: Option<String>,

    /// Skip the habits cache and read the habit store directly.
    #[arg(long)]
    no_cache: bool,

    /// Include habits that are not scheduled for the day.
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Rebuilds the cache from the habit store for the window around --now.
    Sync,
    Show,
    Clear,
}

#[derive(Args, Debug)]
struct ResetTimeArgs {
    #[command(subcommand)]
    command: ResetTimeCommand,
}

#[derive(Subcommand, Debug)]
enum ResetTimeCommand {
    Show,
    /// Sets the end-of-day boundary (24-hour clock).
    Set(ResetTimeSetArgs),
}

#[derive(Args, Debug)]
struct ResetTimeSetArgs {
    #[arg(long)]
    hour: u32,

    #[arg(long)]
    minute: u32,
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let exit = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code
        }
    };

    std::process::exit(exit);
}

fn print_line(s: &str) {
    println!("{}", s);
}

fn print_json<T: serde::Serialize>(obj: &T) -> Result<(), CliError> {
    let s = stable_to_string_pretty(obj).map_err(|_| CliError::io("Store IO error"))?;
    println!("{}", s);
    Ok(())
}

fn resolve_now(cli_now: Option<&str>) -> Result<LocalStamp, CliError> {
    if let Some(n) = cli_now {
        return parse_stamp(n);
    }

    if let Ok(n) = std::env::var("HABITBOARD_NOW") {
        let nn = n.trim();
        if !nn.is_empty() {
            return parse_stamp(nn);
        }
    }

    Ok(system_now())
}

fn resolve_color_enabled(no_color_flag: bool) -> bool {
    if no_color_flag {
        return false;
    }
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    true
}

fn parse_days(days: &[String]) -> Result<BTreeSet<Weekday>, CliError> {
    let mut out = BTreeSet::new();
    for raw in days {
        let day = Weekday::parse(raw)
            .ok_or_else(|| CliError::usage(format!("Invalid weekday: {}", raw)))?;
        out.insert(day);
    }
    Ok(out)
}

fn frequency_cell(habit: &Habit) -> String {
    match habit.frequency {
        Frequency::Weekly => {
            let days: Vec<&str> = habit.selected_days.iter().map(|d| d.name()).collect();
            format!("weekly ({})", days.join(","))
        }
        other => other.as_label().to_string(),
    }
}

fn amount_cell(amount: f64) -> String {
    if amount == 0.0 {
        "-".to_string()
    } else if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let store_path = resolve_store_path(cli.store.as_deref())?;
    let now = resolve_now(cli.now.as_deref())?;
    let mut store = FileStore::new(store_path);
    let reset = load_reset_time(&store);

    let styler = Styler::new(resolve_color_enabled(cli.no_color));

    match cli.command {
        Command::Add(args) => {
            let start = match args.start.as_deref() {
                Some(s) => {
                    parse_date_key(s)?;
                    s.to_string()
                }
                None => effective_date_key(&now, reset),
            };
            let selected_days = parse_days(&args.days)?;

            let mut habits = load_habits(&store)?;
            let habit = make_habit(
                next_habit_id(&habits),
                &args.name,
                args.frequency.to_frequency(),
                &start,
                selected_days,
                args.keep_until,
            )?;
            habits.push(habit.clone());
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                }
                print_json(&Out { habit })?;
            } else {
                print_line(&render_table(
                    &["id", "name", "frequency", "start"],
                    &[vec![
                        habit.id.clone(),
                        habit.name.clone(),
                        frequency_cell(&habit),
                        habit.start_date.clone(),
                    ]],
                ));
            }

            Ok(())
        }

        Command::List(args) => {
            let mut habits: Vec<Habit> = load_habits(&store)?
                .into_iter()
                .filter(|h| args.all || !h.archived)
                .collect();
            habits.sort_by(stable_habit_sort);

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habits: Vec<Habit>,
                }
                print_json(&Out { habits })?;
            } else {
                let rows: Vec<Vec<String>> = habits
                    .iter()
                    .map(|h| {
                        vec![
                            h.id.clone(),
                            h.name.clone(),
                            frequency_cell(h),
                            h.start_date.clone(),
                            h.streak.to_string(),
                            if h.archived { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                print_line(&render_table(
                    &["id", "name", "frequency", "start", "streak", "archived"],
                    &rows,
                ));
            }

            Ok(())
        }

        Command::Show(args) => {
            let habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            let habit = habits[idx].clone();
            let cycle = resolve_cycle_start(&habit, &now, reset);

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                    cycle: String,
                }
                print_json(&Out { habit, cycle })?;
            } else {
                print_line(&format!("{} ({})", habit.name, habit.id));
                print_line(&format!("frequency: {}", frequency_cell(&habit)));
                print_line(&format!("start_date: {}", habit.start_date));
                print_line(&format!("current cycle: {}", cycle));
                print_line(&format!(
                    "streak: {} (best {})",
                    habit.streak, habit.best_streak
                ));
                if let Some(s) = habit.snoozed_until.as_deref() {
                    print_line(&format!("snoozed_until: {}", s));
                }
                if let Some(d) = habit.last_completed_date.as_deref() {
                    print_line(&format!("last_completed: {}", d));
                }
                if !habit.completion_history.is_empty() {
                    print_line("completed cycles:");
                    for key in habit.completion_history.iter() {
                        print_line(&format!("- {}", key));
                    }
                }
                if !habit.increment_history.is_empty() {
                    print_line("progress:");
                    for (key, amount) in habit.increment_history.iter() {
                        print_line(&format!("- {} {}", key, amount_cell(*amount)));
                    }
                }
            }

            Ok(())
        }

        Command::Archive(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            habits[idx].archived = true;
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                }
                print_json(&Out { habit })?;
            } else {
                print_line(&format!("Archived: {} ({})", habit.name, habit.id));
            }

            Ok(())
        }

        Command::Unarchive(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            habits[idx].archived = false;
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                }
                print_json(&Out { habit })?;
            } else {
                print_line(&format!("Unarchived: {} ({})", habit.name, habit.id));
            }

            Ok(())
        }

        Command::Done(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            let cycle = resolve_cycle_start(&habits[idx], &now, reset);
            let newly_completed = mark_done(&mut habits[idx], &cycle);
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            let total = if newly_completed {
                add_points(&mut store, args.points)?
            } else {
                total_points(&store)
            };

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                    cycle: String,
                    newly_completed: bool,
                    total_points: u64,
                }
                print_json(&Out {
                    habit,
                    cycle,
                    newly_completed,
                    total_points: total,
                })?;
            } else if newly_completed {
                print_line(&styler.green(&format!(
                    "Done: {} for cycle {} ({} points total)",
                    habit.name, cycle, total
                )));
            } else {
                print_line(&styler.gray(&format!(
                    "Already done: {} for cycle {}",
                    habit.name, cycle
                )));
            }

            Ok(())
        }

        Command::Undone(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            let cycle = resolve_cycle_start(&habits[idx], &now, reset);
            let removed = mark_undone(&mut habits[idx], &cycle);
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                    cycle: String,
                    removed: bool,
                }
                print_json(&Out {
                    habit,
                    cycle,
                    removed,
                })?;
            } else if removed {
                print_line(&format!("Undone: {} for cycle {}", habit.name, cycle));
            } else {
                print_line(&format!(
                    "Nothing recorded for {} on cycle {}",
                    habit.name, cycle
                ));
            }

            Ok(())
        }

        Command::Log(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            let cycle = resolve_cycle_start(&habits[idx], &now, reset);
            let total = add_increment(&mut habits[idx], &cycle, args.amount)?;
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                    cycle: String,
                    amount: f64,
                }
                print_json(&Out {
                    habit,
                    cycle,
                    amount: total,
                })?;
            } else {
                print_line(&format!(
                    "Logged: {} now at {} for cycle {}",
                    habit.name,
                    amount_cell(total),
                    cycle
                ));
            }

            Ok(())
        }

        Command::Snooze(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            snooze(&mut habits[idx], &args.until)?;
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                }
                print_json(&Out { habit })?;
            } else {
                print_line(&format!("Snoozed: {} until {}", habit.name, args.until));
            }

            Ok(())
        }

        Command::Unsnooze(args) => {
            let mut habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            unsnooze(&mut habits[idx]);
            let habit = habits[idx].clone();
            save_habits(&mut store, &habits)?;

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    habit: Habit,
                }
                print_json(&Out { habit })?;
            } else {
                print_line(&format!("Unsnoozed: {}", habit.name));
            }

            Ok(())
        }

        Command::Cycle(args) => {
            let habits = load_habits(&store)?;
            let idx = select_habit(&habits, &args.habit)?;
            let cycle = resolve_cycle_start(&habits[idx], &now, reset);

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    id: String,
                    cycle: String,
                }
                print_json(&Out {
                    id: habits[idx].id.clone(),
                    cycle,
                })?;
            } else {
                print_line(&cycle);
            }

            Ok(())
        }

        Command::Today(args) => {
            let stamp = match args.date.as_deref() {
                Some(d) => parse_stamp(d)?,
                None => now,
            };
            let day = effective_date_key(&stamp, reset);

            // The cache may only serve dates near the real "now"; beyond the
            // window the store is authoritative.
            let mut source = "store";
            let habits = if !args.no_cache && is_within_window(&day, &now, reset) {
                match read_cache(&store) {
                    Some(cached) => {
                        source = "cache";
                        cached
                    }
                    None => load_habits(&store)?,
                }
            } else {
                load_habits(&store)?
            };

            let mut statuses: Vec<_> = with_completion(&habits, &stamp, reset)
                .into_iter()
                .filter(|s| !s.habit.archived && (args.all || s.active))
                .collect();
            statuses.sort_by(|a, b| stable_habit_sort(&a.habit, &b.habit));

            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    date: String,
                    source: String,
                    habits: Vec<crate::completion::HabitStatus>,
                }
                print_json(&Out {
                    date: day,
                    source: source.to_string(),
                    habits: statuses,
                })?;
            } else {
                let rows: Vec<Vec<String>> = statuses
                    .iter()
                    .map(|s| {
                        vec![
                            s.habit.id.clone(),
                            s.habit.name.clone(),
                            frequency_cell(&s.habit),
                            s.cycle.clone(),
                            if s.completed {
                                styler.green("done")
                            } else if s.active {
                                "due".to_string()
                            } else {
                                styler.gray("off")
                            },
                            amount_cell(s.increment_amount),
                        ]
                    })
                    .collect();
                print_line(&format!("{} ({})", day, source));
                print_line(&render_table(
                    &["id", "name", "frequency", "cycle", "state", "amount"],
                    &rows,
                ));
            }

            Ok(())
        }

        Command::Cache(args) => match args.command {
            CacheCommand::Sync => {
                let habits = load_habits(&store)?;
                write_cache(&mut store, &habits, &now, reset)?;
                let envelope = read_envelope(&store)
                    .ok_or_else(|| CliError::io("Store IO error"))?;

                if cli.format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        cached: usize,
                        cached_for_dates: Vec<String>,
                    }
                    print_json(&Out {
                        cached: envelope.habits.len(),
                        cached_for_dates: envelope.cached_for_dates,
                    })?;
                } else {
                    print_line(&format!(
                        "Cached {} habits for {} .. {}",
                        envelope.habits.len(),
                        envelope.cached_for_dates.first().map(String::as_str).unwrap_or("?"),
                        envelope.cached_for_dates.last().map(String::as_str).unwrap_or("?"),
                    ));
                }

                Ok(())
            }

            CacheCommand::Show => {
                let envelope = read_envelope(&store);

                if cli.format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        cache: Option<crate::cache::CacheEnvelope>,
                    }
                    print_json(&Out { cache: envelope })?;
                } else {
                    match envelope {
                        Some(env) => {
                            print_line(&format!(
                                "{} habits cached at {} for {} dates",
                                env.habits.len(),
                                env.cached_at,
                                env.cached_for_dates.len()
                            ));
                            for d in env.cached_for_dates.iter() {
                                print_line(&format!("- {}", d));
                            }
                        }
                        None => print_line("cache: empty"),
                    }
                }

                Ok(())
            }

            CacheCommand::Clear => {
                invalidate(&mut store);
                if cli.format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        cleared: bool,
                    }
                    print_json(&Out { cleared: true })?;
                } else {
                    print_line("cache: cleared");
                }
                Ok(())
            }
        },

        Command::ResetTime(args) => match args.command {
            ResetTimeCommand::Show => {
                if cli.format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        reset_time: ResetTime,
                    }
                    print_json(&Out { reset_time: reset })?;
                } else {
                    print_line(&format!("{:02}:{:02}", reset.hour, reset.minute));
                }
                Ok(())
            }

            ResetTimeCommand::Set(set) => {
                let new_reset = ResetTime {
                    hour: set.hour,
                    minute: set.minute,
                };
                save_reset_time(&mut store, new_reset)?;
                if cli.format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        reset_time: ResetTime,
                    }
                    print_json(&Out {
                        reset_time: new_reset,
                    })?;
                } else {
                    print_line(&format!(
                        "Reset time set to {:02}:{:02}",
                        new_reset.hour, new_reset.minute
                    ));
                }
                Ok(())
            }
        },

        Command::Points => {
            let total = total_points(&store);
            if cli.format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    total_points: u64,
                }
                print_json(&Out {
                    total_points: total,
                })?;
            } else {
                print_line(&format!("{}", total));
            }
            Ok(())
        }
    }
}
