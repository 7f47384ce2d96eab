use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::{
    get_styles, print_empty_list, print_error, print_journal_entry, print_key_value, TableBuilder,
};
use contacts_journal::config::{AppConfig, CliConfig, FileConfig, LoggingLevel, Markup};
use contacts_journal::contact::{ContactQuery, CustomFieldValues, QueryColumn, SortDirection};
use contacts_journal::journal::LineStyle;
use contacts_journal::manager::{ContactManager, ContactRow};
use contacts_journal::metrics;
use contacts_journal::store::{now_seconds, SqliteContactStore};
use contacts_journal::user::{Permission, Role, User};

const SECONDS_PER_DAY: i64 = 86_400;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles(), about = "Inspect contacts and their change history")]
struct CliArgs {
    /// Contacts database; looked up in the current directory and its parents
    /// when omitted.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[clap(long, value_enum, default_value_t = LoggingLevel::Info)]
    pub logging_level: LoggingLevel,

    #[clap(long, value_enum, default_value_t = Markup::Plain)]
    pub markup: Markup,

    #[clap(long, default_value_t = 25)]
    pub per_page: usize,

    /// Prints the metrics collected while running the command.
    #[clap(long)]
    pub metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows the history of a contact as the given user sees it.
    History {
        contact_id: i64,
        #[clap(long = "as")]
        login: String,
        /// Newest first, whatever the user's preference.
        #[clap(long)]
        reverse: bool,
        /// Shorthand for --markup markdown.
        #[clap(long)]
        markdown: bool,
    },

    /// Lists raw journals recorded after the watermark, every journal when
    /// no watermark is given.
    After {
        contact_id: i64,
        watermark: Option<i64>,
    },

    /// Shows who last changed each contact, as the given user sees it.
    LastUpdatedBy {
        #[clap(long = "as")]
        login: String,
        #[clap(required = true)]
        contact_ids: Vec<i64>,
    },

    /// Lists contacts matching the filters.
    List {
        #[clap(long = "as")]
        login: String,
        #[clap(long)]
        project: Option<i64>,
        /// `field:operator:value1,value2`, e.g. `first_name:~:jo`.
        #[clap(long = "filter")]
        filters: Vec<String>,
        /// Keywords matched against name, company, email and phone.
        #[clap(long)]
        search: Option<String>,
        /// `column:asc` or `column:desc`.
        #[clap(long)]
        sort: Vec<String>,
        /// Columns to show, comma separated.
        #[clap(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[clap(long, default_value_t = 1)]
        page: usize,
    },

    /// Lists contacts updated in the last days, as the given user sees them.
    Activity {
        #[clap(long = "as")]
        login: String,
        #[clap(long, default_value_t = 30)]
        days: i64,
    },

    /// Shows the roles a user holds in a project and what they allow.
    Roles {
        login: String,
        project: i64,
    },

    /// Shows the path of the contacts database.
    Where,
}

fn init_logging(level: LoggingLevel) {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(
                    level
                        .as_filter()
                        .parse::<LevelFilter>()
                        .unwrap_or(LevelFilter::INFO)
                        .into(),
                )
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn find_user(manager: &ContactManager, login: &str) -> Result<User> {
    manager
        .store()
        .get_user_by_login(login)?
        .ok_or_else(|| anyhow!("No user with login {}", login))
}

fn build_query(
    project: Option<i64>,
    filters: &[String],
    search: Option<&str>,
    sort: &[String],
    columns: &[String],
) -> Result<ContactQuery> {
    let mut query = ContactQuery::new(project);
    for filter in filters {
        query.add_filter_expression(filter).map_err(|e| anyhow!(e))?;
    }
    if let Some(search) = search {
        query.set_search(search);
    }
    if !columns.is_empty() {
        query.columns = columns
            .iter()
            .map(|name| QueryColumn::parse(name).ok_or_else(|| anyhow!("Unknown column {}", name)))
            .collect::<Result<_>>()?;
    }
    if !sort.is_empty() {
        query.sort = sort
            .iter()
            .map(|expression| {
                let (name, direction) = expression
                    .split_once(':')
                    .unwrap_or((expression.as_str(), "asc"));
                let column = QueryColumn::parse(name)
                    .ok_or_else(|| anyhow!("Unknown sort column {}", name))?;
                let direction = SortDirection::parse(direction)
                    .ok_or_else(|| anyhow!("Unknown sort direction {}", direction))?;
                Ok((column, direction))
            })
            .collect::<Result<_>>()?;
    }
    Ok(query)
}

fn cell(row: &ContactRow, values: &CustomFieldValues, column: &QueryColumn) -> String {
    let contact = &row.contact;
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    match column {
        QueryColumn::Id => contact.id.to_string(),
        QueryColumn::FirstName => text(&contact.first_name),
        QueryColumn::LastName => text(&contact.last_name),
        QueryColumn::Company => text(&contact.company),
        QueryColumn::Phone => text(&contact.phone),
        QueryColumn::Email => text(&contact.email),
        QueryColumn::CreatedOn => format_timestamp(contact.created_on),
        QueryColumn::UpdatedOn => format_timestamp(contact.updated_on),
        QueryColumn::LastUpdatedBy => row
            .last_updated_by
            .as_ref()
            .map(User::name)
            .unwrap_or_default(),
        QueryColumn::CustomField(id) => values.get(id).map(|v| v.join(", ")).unwrap_or_default(),
    }
}

/// One row per role, one `x` per permission it grants.
fn role_rows(roles: &[Role]) -> Vec<Vec<String>> {
    roles
        .iter()
        .map(|role| {
            std::iter::once(role.name.clone())
                .chain(Permission::ALL.iter().map(|permission| {
                    let mark = if role.allows(*permission) { "x" } else { "" };
                    mark.to_string()
                }))
                .collect()
        })
        .collect()
}

fn run(cli_args: CliArgs) -> Result<()> {
    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone().or_else(SqliteContactStore::infer_path),
        logging_level: cli_args.logging_level,
        markup: cli_args.markup,
        per_page: cli_args.per_page,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;
    init_logging(config.logging_level);

    if let Command::Where = cli_args.command {
        println!("{}", config.db_path.display());
        return Ok(());
    }

    let store = SqliteContactStore::new(&config.db_path)
        .with_context(|| format!("Failed to open {:?}", config.db_path))?;
    let manager = ContactManager::new(Arc::new(store), config.manager_config());

    match cli_args.command {
        Command::History {
            contact_id,
            login,
            reverse,
            markdown,
        } => {
            let user = find_user(&manager, &login)?;
            let style = if markdown {
                LineStyle::Markdown
            } else {
                LineStyle::from(config.journal.markup)
            };
            let contact = manager.find_contact(contact_id, &user)?;
            print_key_value("Contact", &contact.to_string());
            println!();

            let mut history = manager.format_history(contact_id, &user, style)?;
            if reverse {
                history.sort_by(|(a, _), (b, _)| b.indice.cmp(&a.indice));
            }
            if history.is_empty() {
                print_empty_list("No history");
            }
            for (journal, lines) in history {
                print_journal_entry(
                    journal.indice,
                    &journal.user_name,
                    &format_timestamp(journal.created_on),
                    journal.private_notes,
                    journal.notes.as_deref(),
                    &lines,
                );
            }
        }
        Command::After {
            contact_id,
            watermark,
        } => {
            let journals = manager.journals_after(contact_id, watermark)?;
            if journals.is_empty() {
                print_empty_list("No journals");
            }
            for journal in journals {
                println!("{}", serde_json::to_string(&journal)?);
            }
        }
        Command::LastUpdatedBy { login, contact_ids } => {
            let user = find_user(&manager, &login)?;
            let authors = manager.resolve_last_updated_by(&contact_ids, &user)?;
            let mut table = TableBuilder::new(vec!["Contact".to_string(), "Last updated by".to_string()]);
            for id in &contact_ids {
                let author = authors
                    .get(id)
                    .and_then(|a| a.as_ref())
                    .map(User::name)
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![id.to_string(), author]);
            }
            table.print();
        }
        Command::List {
            login,
            project,
            filters,
            search,
            sort,
            columns,
            page,
        } => {
            if page == 0 {
                bail!("Pages start at 1");
            }
            let user = find_user(&manager, &login)?;
            let query = build_query(project, &filters, search.as_deref(), &sort, &columns)?;
            let total = manager.contact_count(&query, &user)?;
            let per_page = config.query.per_page;
            let rows = manager.contacts(&query, &user, per_page, (page - 1) * per_page)?;

            if rows.is_empty() {
                print_empty_list("No contacts");
            } else {
                let mut table = TableBuilder::new(query.columns.iter().map(|c| c.name()).collect());
                let wants_custom_values = query
                    .columns
                    .iter()
                    .any(|c| matches!(c, QueryColumn::CustomField(_)));
                for row in &rows {
                    let values = if wants_custom_values {
                        manager.store().get_custom_values(row.contact.id)?
                    } else {
                        CustomFieldValues::new()
                    };
                    table.add_row(query.columns.iter().map(|c| cell(row, &values, c)).collect());
                }
                table.print();
            }
            print_key_value("Total", &total.to_string());
        }
        Command::Activity { login, days } => {
            if days < 0 {
                bail!("Days cannot be negative");
            }
            let user = find_user(&manager, &login)?;
            let to = now_seconds();
            let from = to.saturating_sub(days.saturating_mul(SECONDS_PER_DAY));
            let events = manager.activity(&user, from, to)?;
            if events.is_empty() {
                print_empty_list("No activity");
            } else {
                let mut table = TableBuilder::new(vec![
                    "Updated".to_string(),
                    "Contact".to_string(),
                    "Author".to_string(),
                    "Description".to_string(),
                ]);
                for event in events {
                    table.add_row(vec![
                        format_timestamp(event.datetime()),
                        event.title,
                        event.author.as_ref().map(User::name).unwrap_or_default(),
                        event.description,
                    ]);
                }
                table.print();
            }
        }
        Command::Roles { login, project } => {
            let user = find_user(&manager, &login)?;
            let roles = manager.store().get_user_roles(user.id, project)?;
            if roles.is_empty() {
                print_empty_list("No roles");
            } else {
                let mut table = TableBuilder::new(
                    std::iter::once("Role".to_string())
                        .chain(Permission::ALL.iter().map(|p| p.to_string()))
                        .collect(),
                );
                for row in role_rows(&roles) {
                    table.add_row(row);
                }
                table.print();
            }
            if user.admin {
                print_key_value("Admin", "holds every permission");
            }
        }
        Command::Where => {}
    }
    if cli_args.metrics {
        print!("{}", metrics::render_metrics());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    match run(cli_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
