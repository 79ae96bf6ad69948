use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pw", about = concat!("planwell v", env!("CARGO_PKG_VERSION"), " - order, complete and schedule your plans"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Data file holding items and blocks
    #[arg(long, global = true, default_value = "planwell.json")]
    pub data: String,

    /// Config file (default: planwell.toml next to the data file)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add an item (or a child with --parent)
    Add(AddArgs),
    /// Show a list the way a view would render it
    Show(ShowArgs),
    /// Move an item next to another, to a row index, or to another tier
    Mv(MvArgs),
    /// Toggle completion, cascading to children or parent
    Toggle(ToggleArgs),
    /// Validate sort orders
    Check(CheckArgs),
    /// Commit an item to a timeframe without a time
    Schedule(ScheduleArgs),
    /// Drag a placed block along the timeline
    BlockMove(BlockMoveArgs),
    /// Drag one edge of a placed block
    Resize(ResizeArgs),
    /// Drop an item onto the timeline
    Drop(DropArgs),
    /// Take a block off the timeline
    Unschedule(BlockIdArgs),
    /// List scheduled blocks
    Blocks(BlocksArgs),
    /// Delete an item with its children and blocks
    Rm(IdArgs),
    /// Set or clear an item's note
    Note(NoteArgs),
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Item title
    pub title: String,
    /// task, list or project
    #[arg(long, default_value = "task")]
    pub kind: String,
    /// Add as a child of this item
    #[arg(long)]
    pub parent: Option<String>,
    /// Priority tier for top-level tasks (high, medium, low)
    #[arg(long)]
    pub tier: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// task, list or project
    #[arg(long, default_value = "task")]
    pub kind: String,
    /// Show children of these items
    #[arg(long, short = 'e')]
    pub expand: Vec<String>,
    /// Show children of every item
    #[arg(long)]
    pub all: bool,
    /// Hide the items of these tiers
    #[arg(long)]
    pub collapse: Vec<String>,
    /// Include completed items
    #[arg(long)]
    pub completed: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Item to move
    pub id: String,
    /// Item it is dropped onto
    pub target: Option<String>,
    /// Row index from `pw show` to drop at
    #[arg(long, conflicts_with_all = ["target", "tier"])]
    pub at: Option<usize>,
    /// Move to the end of this tier
    #[arg(long, conflicts_with = "target")]
    pub tier: Option<String>,
    /// Rows are counted with these items expanded (for --at)
    #[arg(long, short = 'e')]
    pub expand: Vec<String>,
}

#[derive(Args)]
pub struct ToggleArgs {
    /// Item to complete or reopen
    pub id: String,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Renumber broken groups
    #[arg(long)]
    pub fix: bool,
}

#[derive(Args)]
pub struct IdArgs {
    /// Item ID
    pub id: String,
}

#[derive(Args)]
pub struct NoteArgs {
    /// Item ID
    pub id: String,
    /// Note text (omit to clear)
    pub text: Option<String>,
}

// ---------------------------------------------------------------------------
// Scheduling commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ScheduleArgs {
    /// Item to commit
    pub item: String,
    /// daily, weekly, monthly or yearly
    #[arg(long, default_value = "daily")]
    pub timeframe: String,
    /// Planning bucket within the timeframe
    #[arg(long, default_value = "today")]
    pub section: String,
    /// YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args)]
pub struct BlockMoveArgs {
    /// Block ID
    pub block: String,
    /// Vertical drag distance in pixels (negative moves earlier)
    #[arg(allow_hyphen_values = true)]
    pub pixels: f64,
}

#[derive(Args)]
pub struct ResizeArgs {
    /// Block ID
    pub block: String,
    /// top or bottom
    pub edge: String,
    /// Vertical drag distance in pixels
    #[arg(allow_hyphen_values = true)]
    pub pixels: f64,
}

#[derive(Args)]
pub struct DropArgs {
    /// Item to drop
    pub item: String,
    /// Screen y of the drop point
    #[arg(allow_hyphen_values = true)]
    pub y: f64,
    /// Screen y of the timeline's midnight line
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub origin: f64,
    /// daily, weekly, monthly or yearly
    #[arg(long, default_value = "daily")]
    pub timeframe: String,
    #[arg(long, default_value = "today")]
    pub section: String,
    /// YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args)]
pub struct BlockIdArgs {
    /// Block ID
    pub block: String,
}

#[derive(Args)]
pub struct BlocksArgs {
    /// Only blocks on this date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
}
