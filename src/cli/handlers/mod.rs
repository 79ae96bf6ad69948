use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::bus::EventBus;
use crate::io::config_io::{self, ConfigError};
use crate::io::document_store::{Document, DocumentStore};
use crate::io::persistence::{PersistError, Persistence};
use crate::model::block::{Edge, Timeframe};
use crate::model::config::Config;
use crate::model::event::ViewId;
use crate::model::item::{ItemKind, PriorityTier};
use crate::ops::ordering;
use crate::ops::time_grid::Unschedule;
use crate::session::{PlannerSession, SessionError};
use crate::store::{BlockStore, ItemStore};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// `--config`, or planwell.toml next to the data file
pub fn config_path(cli: &Cli) -> PathBuf {
    match &cli.config {
        Some(path) => PathBuf::from(path),
        None => Path::new(&cli.data).with_file_name("planwell.toml"),
    }
}

pub fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    config_io::read_config(&config_path(cli))
}

/// Everything a command needs: the backend and how to open views on it
struct Context {
    store: Arc<DocumentStore>,
    config: Config,
    bus: EventBus,
    json: bool,
}

impl Context {
    async fn session(&self, kind: ItemKind) -> Result<PlannerSession, PersistError> {
        let backend: Arc<dyn Persistence> = self.store.clone();
        let mut session = PlannerSession::new(
            kind,
            ViewId::new(format!("cli-{}", kind)),
            backend,
            self.bus.clone(),
            &self.config,
        );
        session.load().await?;
        Ok(session)
    }

    async fn kind_of(&self, id: &str) -> Result<ItemKind, SessionError> {
        self.store
            .item(id)
            .await
            .map(|i| i.kind)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// The list a block's item belongs to
    async fn block_kind(&self, block_id: &str) -> Result<ItemKind, SessionError> {
        let doc = self.store.snapshot().await;
        let block = doc
            .blocks
            .iter()
            .find(|b| b.id == block_id)
            .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))?;
        self.kind_of(&block.item_id).await
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> CmdResult {
    let store = Arc::new(DocumentStore::open(Path::new(&cli.data))?);
    let ctx = Context {
        store,
        config,
        bus: EventBus::new(),
        json: cli.json,
    };

    match cli.command {
        // Lists
        Commands::Add(args) => cmd_add(&ctx, args).await,
        Commands::Show(args) => cmd_show(&ctx, args).await,
        Commands::Mv(args) => cmd_mv(&ctx, args).await,
        Commands::Toggle(args) => cmd_toggle(&ctx, args).await,
        Commands::Check(args) => cmd_check(&ctx, args).await,
        Commands::Rm(args) => cmd_rm(&ctx, args).await,
        Commands::Note(args) => cmd_note(&ctx, args).await,

        // Timeline
        Commands::Schedule(args) => cmd_schedule(&ctx, args).await,
        Commands::BlockMove(args) => cmd_block_move(&ctx, args).await,
        Commands::Resize(args) => cmd_resize(&ctx, args).await,
        Commands::Drop(args) => cmd_drop(&ctx, args).await,
        Commands::Unschedule(args) => cmd_unschedule(&ctx, args).await,
        Commands::Blocks(args) => cmd_blocks(&ctx, args).await,
    }
}

/// Wait for the session's writes and report anything that did not stick
async fn finish(session: &mut PlannerSession) {
    for notice in session.settle().await {
        eprintln!("warning: {}", notice);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, String> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {}", s, e)),
        None => Ok(Local::now().date_naive()),
    }
}

/// Next free id: `T-3` style for top-level items, `T-3.2` for children
fn next_id(doc: &Document, kind: ItemKind, parent: Option<&str>) -> String {
    let prefix = match parent {
        Some(pid) => format!("{}.", pid),
        None => match kind {
            ItemKind::Task => "T-".to_string(),
            ItemKind::List => "L-".to_string(),
            ItemKind::Project => "P-".to_string(),
        },
    };
    let highest = doc
        .items
        .iter()
        .filter_map(|i| i.id.strip_prefix(&prefix))
        .filter_map(|rest| rest.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{}", prefix, highest + 1)
}

// ---------------------------------------------------------------------------
// List commands
// ---------------------------------------------------------------------------

async fn cmd_add(ctx: &Context, args: AddArgs) -> CmdResult {
    let kind = match &args.parent {
        Some(pid) => ctx.kind_of(pid).await?,
        None => args.kind.parse::<ItemKind>()?,
    };
    let tier = args
        .tier
        .as_deref()
        .map(str::parse::<PriorityTier>)
        .transpose()?;

    let doc = ctx.store.snapshot().await;
    let id = next_id(&doc, kind, args.parent.as_deref());
    let mut session = ctx.session(kind).await?;
    let item = session.create_item(id, args.title, args.parent.as_deref(), tier)?;
    finish(&mut session).await;

    if ctx.json {
        return print_json(&item);
    }
    println!("{}", item.id);
    Ok(())
}

async fn cmd_show(ctx: &Context, args: ShowArgs) -> CmdResult {
    let kind = args.kind.parse::<ItemKind>()?;
    let mut session = ctx.session(kind).await?;

    let parents: Vec<String> = if args.all {
        session
            .items()
            .iter()
            .filter(|i| i.is_top_level() && session.items().has_children(&i.id))
            .map(|i| i.id.clone())
            .collect()
    } else {
        args.expand
    };
    let view = session.view_mut();
    view.expanded.extend(parents);
    view.show_completed = args.completed;
    for tier in &args.collapse {
        view.collapsed_tiers.insert(tier.parse::<PriorityTier>()?);
    }

    let rows = session.flattened_display();
    if ctx.json {
        return print_json(&rows_to_json(&rows, session.items()));
    }
    for line in format_rows(&rows, session.items()) {
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_mv(ctx: &Context, args: MvArgs) -> CmdResult {
    let kind = ctx.kind_of(&args.id).await?;
    let mut session = ctx.session(kind).await?;

    // A child's rows only exist while its parent is expanded
    let mut expand = args.expand.clone();
    for id in [Some(&args.id), args.target.as_ref()].into_iter().flatten() {
        if let Some(pid) = session.items().get(id).and_then(|i| i.parent_id.clone()) {
            expand.push(pid);
        }
    }
    session.view_mut().expanded.extend(expand);

    let plan = if let Some(index) = args.at {
        session.on_drop_at_index(&args.id, index)?
    } else if let Some(target) = &args.target {
        session.on_drag_commit(&args.id, target)?
    } else if let Some(tier) = &args.tier {
        session.set_tier(&args.id, tier.parse::<PriorityTier>()?)?
    } else {
        return Err("nothing to do: give a target, --at or --tier".into());
    };
    finish(&mut session).await;

    if ctx.json {
        return print_json(&plan);
    }
    for line in format_plan(&plan) {
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_toggle(ctx: &Context, args: ToggleArgs) -> CmdResult {
    let kind = ctx.kind_of(&args.id).await?;
    let mut session = ctx.session(kind).await?;
    let outcome = session
        .on_toggle_completion(&args.id, Utc::now())
        .ok_or_else(|| SessionError::NotFound(args.id.clone()))?;
    finish(&mut session).await;

    let item = session
        .items()
        .get(&args.id)
        .ok_or_else(|| SessionError::NotFound(args.id.clone()))?;
    if ctx.json {
        return print_json(&ToggleJson {
            item,
            outcome: &outcome,
        });
    }
    for line in format_toggle(item, &outcome) {
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_check(ctx: &Context, args: CheckArgs) -> CmdResult {
    let doc = ctx.store.snapshot().await;
    let items = ItemStore::from_items(doc.items);
    let violations = ordering::validate_all(&items);

    let mut fixed = 0;
    if args.fix && !violations.is_empty() {
        let updates = ordering::repair_all(&items);
        ctx.store.update_sort_orders(&updates).await?;
        fixed = updates.len();
    }

    if ctx.json {
        return print_json(&CheckJson { violations, fixed });
    }
    if violations.is_empty() {
        println!("all groups in order");
        return Ok(());
    }
    for violation in &violations {
        println!("{}", format_violation(violation));
    }
    if args.fix {
        println!("fixed {} sort orders", fixed);
    } else {
        return Err(format!("{} groups out of order (run with --fix)", violations.len()).into());
    }
    Ok(())
}

async fn cmd_rm(ctx: &Context, args: IdArgs) -> CmdResult {
    let kind = ctx.kind_of(&args.id).await?;
    let mut session = ctx.session(kind).await?;
    let removed = session.delete_item(&args.id);
    finish(&mut session).await;

    if ctx.json {
        return print_json(&removed);
    }
    println!("deleted {}", removed.join(", "));
    Ok(())
}

async fn cmd_note(ctx: &Context, args: NoteArgs) -> CmdResult {
    let kind = ctx.kind_of(&args.id).await?;
    let mut session = ctx.session(kind).await?;
    session.set_note(&args.id, args.text);
    finish(&mut session).await;

    if ctx.json
        && let Some(item) = session.items().get(&args.id)
    {
        return print_json(item);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Timeline commands
// ---------------------------------------------------------------------------

fn print_block(ctx: &Context, session: &PlannerSession, block_id: &str) -> CmdResult {
    let block = session
        .blocks()
        .get(block_id)
        .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))?;
    if ctx.json {
        return print_json(&block_to_json(block));
    }
    let title = session.items().get(&block.item_id).map(|i| i.title.as_str());
    println!("{}", format_block(block, title));
    Ok(())
}

async fn cmd_schedule(ctx: &Context, args: ScheduleArgs) -> CmdResult {
    let timeframe = args.timeframe.parse::<Timeframe>()?;
    let date = parse_date(args.date.as_deref())?;
    let kind = ctx.kind_of(&args.item).await?;
    let mut session = ctx.session(kind).await?;
    let block = session
        .schedule(&args.item, timeframe, &args.section, date)
        .ok_or_else(|| SessionError::NotFound(args.item.clone()))?;
    finish(&mut session).await;
    print_block(ctx, &session, &block.id)
}

async fn cmd_block_move(ctx: &Context, args: BlockMoveArgs) -> CmdResult {
    let kind = ctx.block_kind(&args.block).await?;
    let mut session = ctx.session(kind).await?;
    session
        .on_schedule_move(&args.block, args.pixels)
        .ok_or_else(|| format!("block is not on the timeline: {}", args.block))?;
    finish(&mut session).await;
    print_block(ctx, &session, &args.block)
}

async fn cmd_resize(ctx: &Context, args: ResizeArgs) -> CmdResult {
    let edge = args.edge.parse::<Edge>()?;
    let kind = ctx.block_kind(&args.block).await?;
    let mut session = ctx.session(kind).await?;
    session
        .on_schedule_resize(&args.block, edge, args.pixels)
        .ok_or_else(|| format!("block is not on the timeline: {}", args.block))?;
    finish(&mut session).await;
    print_block(ctx, &session, &args.block)
}

async fn cmd_drop(ctx: &Context, args: DropArgs) -> CmdResult {
    let timeframe = args.timeframe.parse::<Timeframe>()?;
    let date = parse_date(args.date.as_deref())?;
    let kind = ctx.kind_of(&args.item).await?;
    let mut session = ctx.session(kind).await?;
    session.set_timeline_origin(args.origin);
    let block = session
        .on_schedule_drop_create(&args.item, args.y, date, timeframe, &args.section)
        .ok_or_else(|| SessionError::NotFound(args.item.clone()))?;
    finish(&mut session).await;
    print_block(ctx, &session, &block.id)
}

async fn cmd_unschedule(ctx: &Context, args: BlockIdArgs) -> CmdResult {
    let kind = ctx.block_kind(&args.block).await?;
    let mut session = ctx.session(kind).await?;
    let action = session
        .unschedule(&args.block)
        .ok_or_else(|| SessionError::BlockNotFound(args.block.clone()))?;
    finish(&mut session).await;

    if ctx.json {
        return print_json(&action);
    }
    match action {
        Unschedule::DeleteBlock(id) => println!("deleted block {}", id),
        Unschedule::ClearTime(id) => println!("cleared time on block {}", id),
    }
    Ok(())
}

async fn cmd_blocks(ctx: &Context, args: BlocksArgs) -> CmdResult {
    let doc = ctx.store.snapshot().await;
    let items = ItemStore::from_items(doc.items);
    let blocks = BlockStore::from_blocks(doc.blocks);
    let listed = match args.date.as_deref() {
        Some(date) => blocks.on_date(parse_date(Some(date))?),
        None => blocks.iter().collect(),
    };

    if ctx.json {
        let out: Vec<_> = listed.iter().map(|b| block_to_json(b)).collect();
        return print_json(&out);
    }
    for block in listed {
        let title = items.get(&block.item_id).map(|i| i.title.as_str());
        println!("{}", format_block(block, title));
    }
    Ok(())
}
