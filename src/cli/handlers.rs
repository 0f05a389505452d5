use std::error::Error;
use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::info;

use crate::cli::commands::*;
use crate::cli::edit::{apply_at, Edit, Outcome};
use crate::cli::output::*;
use crate::cli::shell::Shell;
use crate::io::store::{autosave_hook, load_tree, save_tree, try_load_tree, Format, StoreError};
use crate::model::config::{AppConfig, StorageConfig};
use crate::model::task::{format_path, Task};
use crate::ops::controller::EditController;
use crate::ops::filter::TaskFilter;

type CmdResult = Result<(), Box<dyn Error>>;

/// The loaded tree and where it goes back to
struct Session {
    ctl: EditController,
    file: PathBuf,
    autosave: bool,
}

impl Session {
    fn open(file: PathBuf, storage: &StorageConfig) -> Result<Session, StoreError> {
        // Refuse unknown extensions up front rather than losing edits on save
        Format::from_path(&file)?;
        let tree = load_tree(&file, &storage.root_name);
        let mut ctl = EditController::new(tree);
        if storage.autosave {
            ctl.set_on_change(Some(autosave_hook(&file)));
        }
        Ok(Session {
            ctl,
            file,
            autosave: storage.autosave,
        })
    }

    fn task_at(&self, path: &[usize]) -> Result<&Task, Box<dyn Error>> {
        self.ctl
            .task()
            .get(path)
            .ok_or_else(|| format!("no task at path '{}'", format_path(path)).into())
    }

    /// Without auto-save the tree is written once, after the command
    fn finish(&self, changed: bool) -> Result<(), StoreError> {
        if changed && !self.autosave {
            save_tree(&self.file, self.ctl.task())?;
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, config: &AppConfig) -> CmdResult {
    let json = cli.json;
    let file = cli.file.unwrap_or_else(|| config.storage.file.clone());
    let mut session = Session::open(file, &config.storage)?;

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&session, args, json),
        Commands::Show(args) => cmd_show(&session, args, json),

        // Write commands
        Commands::Add(args) => {
            let edit = Edit::Add {
                name: args.name,
                due_date: args.due,
                priority: args.priority,
            };
            let level = args.at.path();
            if let Outcome::Added(index) = run_edit(&mut session, level, &edit)? {
                let mut path = level.to_vec();
                path.push(index);
                println!("{}", format_path(&path));
            }
            Ok(())
        }
        Commands::Edit(args) => {
            let edit = Edit::Rename {
                index: args.index,
                name: args.name,
            };
            run_edit(&mut session, args.at.path(), &edit).map(drop)
        }
        Commands::Rm(args) => {
            run_edit(&mut session, args.at.path(), &Edit::Delete { index: args.index }).map(drop)
        }
        Commands::Mv(args) => {
            let edit = Edit::Move {
                from: args.from,
                to: args.to,
            };
            run_edit(&mut session, args.at.path(), &edit).map(drop)
        }
        Commands::Done(args) => {
            run_edit(&mut session, args.at.path(), &Edit::Complete { index: args.index }).map(drop)
        }
        Commands::Undone(args) => {
            run_edit(&mut session, args.at.path(), &Edit::Reopen { index: args.index }).map(drop)
        }
        Commands::Due(args) => {
            let edit = Edit::Due {
                index: args.index,
                date: args.date,
            };
            run_edit(&mut session, args.at.path(), &edit).map(drop)
        }
        Commands::Priority(args) => {
            let edit = Edit::Priority {
                index: args.index,
                priority: args.priority,
            };
            run_edit(&mut session, args.at.path(), &edit).map(drop)
        }
        Commands::Sort(args) => {
            if run_edit(&mut session, args.at.path(), &Edit::Sort(args.key))? == Outcome::Unchanged {
                eprintln!("already sorted");
            }
            Ok(())
        }

        // Files
        Commands::Export(args) => cmd_export(&session, args),
        Commands::Import(args) => cmd_import(&session, args),
        Commands::Shell => cmd_shell(&mut session),
    }
}

fn run_edit(session: &mut Session, level: &[usize], edit: &Edit) -> Result<Outcome, Box<dyn Error>> {
    let outcome = apply_at(&mut session.ctl, level, edit)?;
    session.finish(outcome.changed())?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(session: &Session, args: ListArgs, json: bool) -> CmdResult {
    let level = args.at.path();
    let parent = session.task_at(level)?;
    let filter = TaskFilter::new()
        .text(args.search.unwrap_or_default())
        .hide_completed(args.hide_completed)
        .completed_only(args.completed)
        .due_before(args.due_before)
        .due_after(args.due_after)
        .priority_above(args.priority_above)
        .priority_below(args.priority_below);
    let rows = filter.apply(&parent.sub_tasks);
    let today = today();

    if json {
        let out: Vec<TaskLineJson> = rows
            .iter()
            .map(|&(i, task)| {
                let mut path = level.to_vec();
                path.push(i);
                task_line_json(&path, task, today)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_listing(rows, today) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(session: &Session, args: ShowArgs, json: bool) -> CmdResult {
    let task = session.task_at(args.path.as_deref().unwrap_or_default())?;
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        for line in format_task_tree(task, today()) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Files and shell
// ---------------------------------------------------------------------------

fn cmd_export(session: &Session, args: FileArgs) -> CmdResult {
    save_tree(&args.path, session.ctl.task())?;
    info!(path = %args.path.display(), "exported task tree");
    Ok(())
}

fn cmd_import(session: &Session, args: FileArgs) -> CmdResult {
    let tree = try_load_tree(&args.path)?;
    save_tree(&session.file, &tree)?;
    println!(
        "imported {} task(s) into {}",
        tree.descendant_count() + 1,
        session.file.display()
    );
    Ok(())
}

fn cmd_shell(session: &mut Session) -> CmdResult {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut shell = Shell::new(stdin.lock(), stdout.lock(), today());
    let changed = shell.run(&mut session.ctl)?;
    session.finish(changed)?;
    Ok(())
}
