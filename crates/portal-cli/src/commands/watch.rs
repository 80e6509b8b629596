//! Interactive live session: stdin commands and feed deliveries on one loop.

use portal_core::prefs::PreferenceStore;
use portal_core::remote::RemoteCollection;
use portal_core::session::{FeedDelivery, SWITCH_PORTAL_PROMPT};
use portal_core::util::unix_millis_now;
use portal_core::{GrievanceStatus, PortalSession, Screen, StatusFilter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::common::{
    format_notification, render_view, require_portal, resolve_grievance_id, short_id,
};
use crate::commands::open::replace_unreachable_portal;
use crate::commands::switch::is_affirmative;
use crate::error::CliError;

const HELP: &str = "\
Commands:
  add <title> | <description>   submit a grievance
  status <id> <status>          pending, in-progress or resolved
  filter <status|all>           change the list filter
  list                          show the list again
  enter <code> / new            enter or create a portal
  code                          print the portal code
  switch                        leave the portal
  help                          show this help
  quit                          exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Add { title: String, description: String },
    Status { id: String, status: GrievanceStatus },
    Filter(StatusFilter),
    List,
    Enter(String),
    New,
    Code,
    Switch,
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

enum Input {
    Line(Option<String>),
    Feed(FeedDelivery),
}

pub async fn run_watch<R, P>(
    session: &mut PortalSession<R, P>,
    filter: StatusFilter,
) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    session.set_filter(filter);
    let mut lines = spawn_stdin_reader();
    let mut awaiting_switch = false;

    render(session);
    eprintln!("Type `help` for commands.");

    loop {
        let input = tokio::select! {
            line = lines.recv() => Input::Line(line),
            delivery = session.next_feed_event() => Input::Feed(delivery),
        };

        match input {
            Input::Feed(delivery) => {
                if session.apply_feed_event(delivery) {
                    print_notifications(session);
                    render(session);
                }
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => {
                if awaiting_switch {
                    awaiting_switch = false;
                    if session.switch_portal(|_| is_affirmative(&line)) {
                        render(session);
                    }
                    continue;
                }

                let flow = match parse_command(&line) {
                    Ok(ReplCommand::Switch) => {
                        if require_portal(session).is_ok() {
                            eprint!("{SWITCH_PORTAL_PROMPT} [y/N] ");
                            awaiting_switch = true;
                        } else {
                            eprintln!("error: {}", CliError::NoActivePortal);
                        }
                        Ok(Flow::Continue)
                    }
                    Ok(command) => execute(session, command).await,
                    Err(message) => {
                        eprintln!("{message}");
                        Ok(Flow::Continue)
                    }
                };

                print_notifications(session);
                match flow {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) | Err(CliError::Core(_)) => {}
                    Err(error) => eprintln!("error: {error}"),
                }
            }
        }
    }

    Ok(())
}

/// Parse one line of REPL input.
pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    match verb.to_ascii_lowercase().as_str() {
        "" => Ok(ReplCommand::Nothing),
        "add" => {
            let (title, description) = rest
                .split_once('|')
                .ok_or_else(|| "usage: add <title> | <description>".to_string())?;
            Ok(ReplCommand::Add {
                title: title.trim().to_string(),
                description: description.trim().to_string(),
            })
        }
        "status" => {
            let mut parts = rest.split_whitespace();
            let (Some(id), Some(status), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err("usage: status <id> <status>".to_string());
            };
            Ok(ReplCommand::Status {
                id: id.to_string(),
                status: status.parse()?,
            })
        }
        "filter" => Ok(ReplCommand::Filter(if rest.is_empty() {
            StatusFilter::All
        } else {
            rest.parse()?
        })),
        "list" | "ls" => Ok(ReplCommand::List),
        "enter" | "open" if !rest.is_empty() => Ok(ReplCommand::Enter(rest.to_string())),
        "enter" | "open" => Err("usage: enter <code>".to_string()),
        "new" => Ok(ReplCommand::New),
        "code" => Ok(ReplCommand::Code),
        "switch" => Ok(ReplCommand::Switch),
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        other => Err(format!("Unknown command '{other}'. Type `help` for commands.")),
    }
}

async fn execute<R, P>(
    session: &mut PortalSession<R, P>,
    command: ReplCommand,
) -> Result<Flow, CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    match command {
        ReplCommand::Add { title, description } => {
            require_portal(session)?;
            session.submit_item(title, description).await?;
        }
        ReplCommand::Status { id, status } => {
            require_portal(session)?;
            let id = resolve_grievance_id(session.snapshot().unwrap_or_default(), &id)?;
            session.change_item_status(&id, status).await?;
            eprintln!("{} -> {}", short_id(&id), status.label());
        }
        ReplCommand::Filter(filter) => {
            session.set_filter(filter);
            render(session);
        }
        ReplCommand::List => render(session),
        ReplCommand::Enter(code) => enter(session, Some(&code)).await?,
        ReplCommand::New => enter(session, None).await?,
        ReplCommand::Code => println!("{}", require_portal(session)?),
        ReplCommand::Switch | ReplCommand::Nothing => {}
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

async fn enter<R, P>(session: &mut PortalSession<R, P>, code: Option<&str>) -> Result<(), CliError>
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    if session.screen() == Screen::Active {
        if let Some(current) = session.portal() {
            return Err(CliError::AlreadyInPortal(current.to_string()));
        }
    }
    replace_unreachable_portal(session, code);
    let portal = session.resolve_portal(code)?;
    session.enter_portal(portal).await?;
    render(session);
    Ok(())
}

fn render<R, P>(session: &PortalSession<R, P>)
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    println!();
    for line in render_view(&session.view(unix_millis_now())) {
        println!("{line}");
    }
}

fn print_notifications<R, P>(session: &mut PortalSession<R, P>)
where
    R: RemoteCollection,
    P: PreferenceStore,
{
    for notification in session.take_notifications() {
        eprintln!("{}", format_notification(&notification));
    }
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!("Error reading stdin: {}", error);
                    break;
                }
            }
        }
    });
    rx
}
