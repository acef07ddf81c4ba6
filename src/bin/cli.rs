use chrono::{Datelike, NaiveDateTime};
use due_date_scheduler::calendar::{CalendarPolicy, parse_calendar_date};
use due_date_scheduler::{
    AssignmentSource, DueDateBoard, DueDateState, RequestTask, compute_latest_start,
    compute_suggested_due_date, load_board_from_csv, load_board_from_json, load_policy_from_json,
    month_grid, save_board_to_csv, save_board_to_json, save_policy_to_json,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

fn parse_id_list(s: &str) -> Vec<i32> {
    s.split(',')
        .filter_map(|p| p.trim().parse::<i32>().ok())
        .collect()
}

/// Accepts a bare day (midnight) or a day with a time of day.
fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            parse_calendar_date(s)
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })
}

fn parse_switch(s: &str) -> Option<bool> {
    match s {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn format_date_time(date: Option<NaiveDateTime>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.iter().enumerate() {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(widths[ci].saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_tasks_as_text_table(board: &DueDateBoard) -> String {
    let headers = [
        "id",
        "request_no",
        "name",
        "request_date",
        "hours",
        "state",
        "due_date",
        "source",
    ];
    let rows: Vec<[String; 8]> = board
        .tasks()
        .iter()
        .map(|task| {
            let source = match task.due {
                DueDateState::Assigned { source, .. } => source.as_str().to_string(),
                _ => String::new(),
            };
            [
                task.id.to_string(),
                task.request_no.clone(),
                task.name.clone(),
                format_date_time(Some(task.request_date)),
                task.duration_hours.to_string(),
                task.due.as_str().to_string(),
                format_date_time(task.effective_due_date()),
                source,
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    out.push_str(&render_row(&header_cells, &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &rows {
        out.push_str(&render_row(row, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

/// Month view: `!` exceptional day, `.` skipped weekend, `#` has due tasks.
fn render_month(board: &DueDateBoard, year: i32, month: u32) -> Option<String> {
    let days = month_grid(year, month, board.policy())?;
    let mut out = String::from(" Su   Mo   Tu   We   Th   Fr   Sa\n");
    for week in days.chunks(7) {
        for day in week {
            if !day.in_month {
                out.push_str("     ");
                continue;
            }
            let marker = if day.is_exceptional {
                '!'
            } else if !day.is_working_day {
                '.'
            } else if !board.tasks_due_on(day.date).is_empty() {
                '#'
            } else {
                ' '
            };
            out.push_str(&format!(" {:>2}{}", day.date.day(), marker));
            out.push(' ');
        }
        out.push('\n');
    }
    Some(out)
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show request tasks\n  add <id> <hours> <request_date> <name...>\n                                     Add a request task (date YYYY-MM-DD[THH:MM])\n  delete <id>                        Remove a request task\n  assign <id> <date>                 Assign a due date manually\n  drop <id> <YYYY-MM-DD>             Assign a calendar day (end of working hours)\n  bulk <ids_csv> <date>              Assign one due date to several tasks\n  accept <id>                        Accept the suggested due date\n  clear <id>                         Clear the due date\n  recompute                          Refresh suggested due dates\n  overlay                            Show due dates with latest starts\n  suggest <request_date> <hours>     Compute a suggested due date\n  latest <due_date> <hours>          Compute the latest start date\n  calendar <year> <month>            Show a month view\n  policy show                        Show the calendar policy\n  policy weekends <on|off>           Skip weekends\n  policy workhours <on|off>          Use the working-hours window\n  policy hours <start> <end>         Set the working-hours window\n  policy except <YYYY-MM-DD>         Add an exceptional day\n  policy unexcept <YYYY-MM-DD>       Remove an exceptional day\n  policy load <json_path>            Load policy from JSON file\n  policy save <json_path>            Save policy to JSON file\n  save <json|csv> <path>             Persist the board to disk\n  load <json|csv> <path>             Load the board from disk\n  quit|exit                          Exit"
    );
}

fn print_policy(policy: &CalendarPolicy) {
    let exceptional = policy
        .exceptional_days
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("Skip weekends      : {}", policy.skip_weekends);
    println!("Use working hours  : {}", policy.use_working_hours);
    println!(
        "Working hours      : {:02}:00-{:02}:00 ({}h/day)",
        policy.working_hours_start,
        policy.working_hours_end,
        policy.working_hours_per_day()
    );
    println!("Exceptional days   : {}", exceptional);
}

fn update_policy<F>(board: &mut DueDateBoard, mutator: F)
where
    F: FnOnce(&mut CalendarPolicy),
{
    match board.update_policy_with(mutator) {
        Ok(summary) => println!("Policy updated ({}).", summary.to_cli_summary()),
        Err(e) => println!("Policy error: {}", e),
    }
}

fn handle_policy<'a>(board: &mut DueDateBoard, mut parts: impl Iterator<Item = &'a str>) {
    let sub = parts.next().unwrap_or("show");
    let arg = parts.next();
    match (sub, arg) {
        ("show", _) => print_policy(board.policy()),
        ("weekends", Some(value)) => match parse_switch(value) {
            Some(on) => update_policy(board, |p| p.skip_weekends = on),
            None => println!("Usage: policy weekends <on|off>"),
        },
        ("workhours", Some(value)) => match parse_switch(value) {
            Some(on) => update_policy(board, |p| p.use_working_hours = on),
            None => println!("Usage: policy workhours <on|off>"),
        },
        ("hours", Some(start_s)) => {
            let start = start_s.parse::<u32>();
            let end = parts.next().map(str::parse::<u32>);
            match (start, end) {
                (Ok(start), Some(Ok(end))) => update_policy(board, |p| {
                    p.working_hours_start = start;
                    p.working_hours_end = end;
                }),
                _ => println!("Usage: policy hours <start> <end>"),
            }
        }
        ("except", Some(value)) | ("unexcept", Some(value)) => match parse_calendar_date(value) {
            Ok(day) if sub == "except" => update_policy(board, |p| {
                p.add_exceptional_day(day);
            }),
            Ok(day) => update_policy(board, |p| {
                p.remove_exceptional_day(day);
            }),
            Err(e) => println!("{}", e),
        },
        ("load", Some(path)) => match load_policy_from_json(path) {
            Ok(policy) => match board.set_policy(policy) {
                Ok(summary) => println!(
                    "Policy loaded from {} ({}).",
                    path,
                    summary.to_cli_summary()
                ),
                Err(e) => println!("Policy error: {}", e),
            },
            Err(e) => println!("Load error: {}", e),
        },
        ("save", Some(path)) => match save_policy_to_json(board.policy(), path) {
            Ok(()) => println!("Policy saved to {}.", path),
            Err(e) => println!("Save error: {}", e),
        },
        _ => println!("Usage: policy <show|weekends|workhours|hours|except|unexcept|load|save> ..."),
    }
}

fn parse_task_id(s: Option<&str>) -> Option<i32> {
    s.and_then(|v| v.parse::<i32>().ok())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut board = DueDateBoard::new(CalendarPolicy::default());

    println!("Due-Date Scheduler (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => println!("{}", render_tasks_as_text_table(&board)),
            "add" => {
                let id = parse_task_id(parts.next());
                let hours = parts.next().map(str::parse::<f64>);
                let request = parts.next().map(parse_date_time);
                let name = parts.collect::<Vec<_>>().join(" ");
                match (id, hours, request) {
                    (Some(id), Some(Ok(hours)), Some(Some(request_date))) => {
                        let name = if name.is_empty() {
                            format!("Request {id}")
                        } else {
                            name
                        };
                        let task = RequestTask::new(id, name, request_date, hours);
                        let mut staged = board.clone();
                        let result = staged.add_task(task).and_then(|_| staged.recompute());
                        match result {
                            Ok(_) => {
                                board = staged;
                                println!("Task added.");
                                println!("{}", render_tasks_as_text_table(&board));
                            }
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: add <id> <hours> <request_date> <name...>"),
                }
            }
            "delete" => match parse_task_id(parts.next()) {
                Some(id) => {
                    if board.remove_task(id) {
                        println!("Deleted task {id}.");
                    } else {
                        println!("Task {id} not found.");
                    }
                }
                None => println!("Usage: delete <id>"),
            },
            "assign" => {
                let id = parse_task_id(parts.next());
                let date = parts.next().and_then(parse_date_time);
                match (id, date) {
                    (Some(id), Some(date)) => {
                        match board.assign_due_date(id, date, AssignmentSource::Manual) {
                            Ok(()) => println!(
                                "Assigned {} to task {id}.",
                                format_date_time(Some(date))
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: assign <id> <date>"),
                }
            }
            "drop" => {
                let id = parse_task_id(parts.next());
                let day = parts.next().map(parse_calendar_date);
                match (id, day) {
                    (Some(id), Some(Ok(day))) => match board.drop_on_day(id, day) {
                        Ok(date) => println!("Assigned {} to task {id}.", format_date_time(Some(date))),
                        Err(e) => println!("Error: {}", e),
                    },
                    (_, Some(Err(e))) => println!("{}", e),
                    _ => println!("Usage: drop <id> <YYYY-MM-DD>"),
                }
            }
            "bulk" => {
                let ids = parts.next().map(parse_id_list).unwrap_or_default();
                let date = parts.next().and_then(parse_date_time);
                match date {
                    Some(date) if !ids.is_empty() => match board.bulk_assign(&ids, date) {
                        Ok(count) => println!("Assigned {} to {count} task(s).", format_date_time(Some(date))),
                        Err(e) => println!("Error: {}", e),
                    },
                    _ => println!("Usage: bulk <ids_csv> <date>"),
                }
            }
            "accept" => match parse_task_id(parts.next()) {
                Some(id) => match board.accept_suggestion(id) {
                    Ok(date) => println!("Accepted {} for task {id}.", format_date_time(Some(date))),
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: accept <id>"),
            },
            "clear" => match parse_task_id(parts.next()) {
                Some(id) => match board.clear_due_date(id) {
                    Ok(_) => println!("Cleared due date of task {id}."),
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: clear <id>"),
            },
            "recompute" => match board.recompute() {
                Ok(summary) => {
                    println!(
                        "Recomputed ({})\n{}",
                        summary.to_cli_summary(),
                        render_tasks_as_text_table(&board)
                    );
                }
                Err(e) => println!("Recompute error: {}", e),
            },
            "overlay" => match board.schedule_overlay() {
                Ok(entries) => {
                    for entry in entries {
                        println!(
                            "{:>4} {:<24} {:<11} due={:<16} latest_start={}",
                            entry.task_id,
                            entry.name,
                            entry.due.as_str(),
                            format_date_time(entry.due.date()),
                            format_date_time(entry.latest_start)
                        );
                    }
                }
                Err(e) => println!("Overlay error: {}", e),
            },
            "suggest" | "latest" => {
                let anchor = parts.next().and_then(parse_date_time);
                let hours = parts.next().map(str::parse::<f64>);
                match (anchor, hours) {
                    (Some(anchor), Some(Ok(hours))) => {
                        let result = if cmd == "suggest" {
                            compute_suggested_due_date(anchor, hours, board.policy())
                        } else {
                            compute_latest_start(anchor, hours, board.policy())
                        };
                        match result {
                            Ok(date) => println!("{}", format_date_time(Some(date))),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: {cmd} <date> <hours>"),
                }
            }
            "calendar" => {
                let year = parts.next().and_then(|v| v.parse::<i32>().ok());
                let month = parts.next().and_then(|v| v.parse::<u32>().ok());
                match (year, month) {
                    (Some(year), Some(month)) => match render_month(&board, year, month) {
                        Some(view) => println!("{}", view),
                        None => println!("Invalid month {year}-{month}"),
                    },
                    _ => println!("Usage: calendar <year> <month>"),
                }
            }
            "policy" => handle_policy(&mut board, parts),
            "save" => {
                let kind = parts.next();
                let path = parts.next();
                match (kind, path) {
                    (Some("json"), Some(path)) => match save_board_to_json(&board, path) {
                        Ok(()) => println!("Board saved to {}", path),
                        Err(e) => println!("Save error: {}", e),
                    },
                    (Some("csv"), Some(path)) => match save_board_to_csv(&board, path) {
                        Ok(()) => println!("Board saved to {}", path),
                        Err(e) => println!("Save error: {}", e),
                    },
                    _ => println!("Usage: save <json|csv> <path>"),
                }
            }
            "load" => {
                let kind = parts.next();
                let path = parts.next();
                let loaded = match (kind, path) {
                    (Some("json"), Some(path)) => Some(load_board_from_json(path)),
                    (Some("csv"), Some(path)) => {
                        Some(load_board_from_csv(path, board.policy().clone()))
                    }
                    _ => None,
                };
                match loaded {
                    Some(Ok(loaded)) => {
                        board = loaded;
                        println!("Board loaded from {}", path.unwrap_or_default());
                        println!("{}", render_tasks_as_text_table(&board));
                    }
                    Some(Err(e)) => println!("Load error: {}", e),
                    None => println!("Usage: load <json|csv> <path>"),
                }
            }
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
