use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::io::bus::{EventBus, Subscription};
use crate::io::config_io::ConfigError;
use crate::io::persistence::{PersistError, Persistence};
use crate::model::block::{BlockFields, Edge, ScheduledBlock, Timeframe};
use crate::model::config::Config;
use crate::model::event::{CompletionEvent, ViewId};
use crate::model::item::{Item, ItemKind, PriorityTier, SiblingGroup, SortOrderUpdate};
use crate::ops::cascade::{self, CascadeOutcome};
use crate::ops::display::{self, DisplayRow, ViewState};
use crate::ops::ordering::{self, MoveRejected, ReorderPlan};
use crate::ops::time_grid::{self, MoveGesture, TimeGrid, Unschedule};
use crate::store::{BlockStore, ItemStore};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] MoveRejected),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("{0} cannot have children")]
    InvalidParent(String),
    #[error("item already exists: {0}")]
    Duplicate(String),
}

/// Something the user should be told after writes settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum SessionNotice {
    /// A reorder did not stick; the group was re-fetched
    ReorderFailed { groups: Vec<SiblingGroup>, message: String },
    WriteFailed { id: String, message: String },
}

impl std::fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionNotice::ReorderFailed { message, .. } => {
                write!(f, "could not save new order ({}); order reloaded", message)
            }
            SessionNotice::WriteFailed { id, message } => {
                write!(f, "could not save {} ({})", id, message)
            }
        }
    }
}

/// Spacing between live reorders during one drag
#[derive(Debug, Clone)]
pub struct ReorderThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ReorderThrottle {
    pub fn new(interval: Duration) -> Self {
        ReorderThrottle {
            interval,
            last: None,
        }
    }

    /// True when enough time has passed since the last accepted trigger.
    /// Accepting records `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// An item being dragged. Nothing here touches the stores.
#[derive(Debug, Clone)]
struct DragState {
    source: String,
    hover: Option<String>,
    preview: Option<ReorderPlan>,
}

/// What an in-flight write was for, so a failure can be handled
#[derive(Debug, Clone)]
enum WriteTarget {
    Reorder(Vec<SiblingGroup>),
    Item(String),
    Block(String),
    Note(String),
}

struct WriteOutcome {
    target: WriteTarget,
    result: Result<(), PersistError>,
}

type WriteFuture = Pin<Box<dyn Future<Output = Result<(), PersistError>> + Send>>;

struct WriteJob {
    target: WriteTarget,
    write: WriteFuture,
}

/// One session's writes, run one at a time in submission order by a
/// background task. Submitting never waits.
#[derive(Default)]
struct WriteQueue {
    worker: Option<(
        mpsc::UnboundedSender<WriteJob>,
        mpsc::UnboundedReceiver<WriteOutcome>,
    )>,
    pending: usize,
}

impl WriteQueue {
    fn submit(&mut self, job: WriteJob) {
        let (jobs, _) = self.worker.get_or_insert_with(spawn_writer);
        match jobs.send(job) {
            Ok(()) => self.pending += 1,
            Err(e) => warn!(write = ?e.0.target, "writer gone, write dropped"),
        }
    }

    /// Next finished write, or None once everything submitted has finished
    async fn next(&mut self) -> Option<WriteOutcome> {
        if self.pending == 0 {
            return None;
        }
        let (_, done) = self.worker.as_mut()?;
        match done.recv().await {
            Some(outcome) => {
                self.pending -= 1;
                Some(outcome)
            }
            None => {
                warn!(lost = self.pending, "writer stopped early");
                self.pending = 0;
                self.worker = None;
                None
            }
        }
    }
}

fn spawn_writer() -> (
    mpsc::UnboundedSender<WriteJob>,
    mpsc::UnboundedReceiver<WriteOutcome>,
) {
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<WriteJob>();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(job) = job_rx.recv().await {
            let result = job.write.await;
            // Keep draining after the session is dropped
            let _ = done_tx.send(WriteOutcome {
                target: job.target,
                result,
            });
        }
        debug!("writer finished");
    });
    (job_tx, done_rx)
}

/// The view-model for one list. Owns the local stores, applies every user
/// action optimistically and hands the matching writes to the backend.
pub struct PlannerSession {
    kind: ItemKind,
    view_id: ViewId,
    items: ItemStore,
    blocks: BlockStore,
    view: ViewState,
    grid: TimeGrid,
    persistence: Arc<dyn Persistence>,
    bus: EventBus,
    inbox: Subscription,
    throttle: ReorderThrottle,
    drag: Option<DragState>,
    /// Screen y of the timeline's midnight line, tracking scroll
    timeline_origin: f64,
    writes: WriteQueue,
}

impl PlannerSession {
    pub fn new(
        kind: ItemKind,
        view_id: ViewId,
        persistence: Arc<dyn Persistence>,
        bus: EventBus,
        config: &Config,
    ) -> Self {
        let inbox = bus.subscribe(view_id.clone());
        PlannerSession {
            kind,
            view_id,
            items: ItemStore::new(),
            blocks: BlockStore::new(),
            view: ViewState::default(),
            grid: TimeGrid::from_config(&config.timeline),
            persistence,
            bus,
            inbox,
            throttle: ReorderThrottle::new(Duration::from_millis(config.drag.reorder_interval_ms)),
            drag: None,
            timeline_origin: 0.0,
            writes: WriteQueue::default(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Writes submitted but not yet settled
    pub fn pending_writes(&self) -> usize {
        self.writes.pending
    }

    /// Replace local state with the backend's copy of this list
    pub async fn load(&mut self) -> Result<(), PersistError> {
        let top = self.persistence.fetch_items(self.kind).await?;
        let mut all = Vec::with_capacity(top.len());
        for item in top {
            let children = self.persistence.fetch_children(&item.id).await?;
            all.push(item);
            all.extend(children);
        }
        self.items = ItemStore::from_items(all);

        let blocks = self.persistence.fetch_blocks().await?;
        self.blocks = BlockStore::from_blocks(
            blocks
                .into_iter()
                .filter(|b| self.items.contains(&b.item_id)),
        );
        info!(
            kind = %self.kind,
            items = self.items.len(),
            blocks = self.blocks.len(),
            "loaded list"
        );
        Ok(())
    }

    pub fn flattened_display(&self) -> Vec<DisplayRow> {
        display::flatten(&self.items, self.kind, &self.view)
    }

    // -----------------------------------------------------------------------
    // Drag and drop
    // -----------------------------------------------------------------------

    pub fn begin_drag(&mut self, id: &str) -> Result<(), MoveRejected> {
        let item = self
            .items
            .get(id)
            .ok_or_else(|| MoveRejected::NotFound(id.to_string()))?;
        if item.is_completed {
            return Err(MoveRejected::Completed(id.to_string()));
        }
        self.throttle.reset();
        self.drag = Some(DragState {
            source: id.to_string(),
            hover: None,
            preview: None,
        });
        debug!(item = id, "drag started");
        Ok(())
    }

    /// The dragged item passed over `nearest_id`. Returns true when the
    /// preview moved; calls inside the throttle interval are ignored.
    pub fn drag_over(&mut self, nearest_id: &str, now: Instant) -> bool {
        let Some(source) = self.drag.as_ref().map(|d| d.source.clone()) else {
            return false;
        };
        if !self.throttle.ready(now) {
            return false;
        }
        match self.plan_drag(&source, nearest_id) {
            Ok(plan) => {
                if let Some(drag) = self.drag.as_mut() {
                    drag.hover = Some(nearest_id.to_string());
                    drag.preview = Some(plan);
                }
                true
            }
            Err(e) => {
                debug!(source = %source, target = nearest_id, error = %e, "drag target rejected");
                false
            }
        }
    }

    /// The move the current drag would make if released now
    pub fn drag_preview(&self) -> Option<&ReorderPlan> {
        self.drag.as_ref()?.preview.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Abandon the drag. No state changes and nothing is written.
    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!(item = %drag.source, "drag cancelled");
        }
    }

    /// Release the dragged item over the last accepted target
    pub fn end_drag(&mut self) -> Result<ReorderPlan, MoveRejected> {
        let Some(drag) = self.drag.take() else {
            return Ok(ReorderPlan::default());
        };
        match drag.hover {
            Some(nearest) => self.on_drag_commit(&drag.source, &nearest),
            None => Ok(ReorderPlan::default()),
        }
    }

    /// Move `source` next to `nearest` and persist the new order
    pub fn on_drag_commit(
        &mut self,
        source: &str,
        nearest: &str,
    ) -> Result<ReorderPlan, MoveRejected> {
        let plan = self.plan_drag(source, nearest).inspect_err(|e| {
            debug!(source, target = nearest, error = %e, "move rejected");
        })?;
        self.commit_plan(source, &plan);
        Ok(plan)
    }

    /// Move `source` to the slot at `flat_index` in the displayed rows
    pub fn on_drop_at_index(
        &mut self,
        source: &str,
        flat_index: usize,
    ) -> Result<ReorderPlan, MoveRejected> {
        let rows = self.flattened_display();
        let plan = display::resolve_group_and_position(&rows, &self.items, source, flat_index)
            .and_then(|target| {
                ordering::move_to_position(&self.items, source, &target.group, target.position)
            })
            .inspect_err(|e| debug!(source, flat_index, error = %e, "drop rejected"))?;
        self.commit_plan(source, &plan);
        Ok(plan)
    }

    /// Move a top-level task to the end of another tier
    pub fn set_tier(&mut self, id: &str, tier: PriorityTier) -> Result<ReorderPlan, MoveRejected> {
        let plan = ordering::retier(&self.items, id, tier)?;
        self.commit_plan(id, &plan);
        Ok(plan)
    }

    fn plan_drag(&self, source: &str, nearest: &str) -> Result<ReorderPlan, MoveRejected> {
        let rows = self.flattened_display();
        let index = display::row_index(&rows, nearest)
            .ok_or_else(|| MoveRejected::NotFound(nearest.to_string()))?;
        let target = display::resolve_group_and_position(&rows, &self.items, source, index)?;
        ordering::reorder(&self.items, source, nearest, &target.group)
    }

    fn commit_plan(&mut self, source: &str, plan: &ReorderPlan) {
        if plan.is_noop() {
            return;
        }
        let from_group = self.items.group_of(source);
        ordering::apply_plan(&mut self.items, plan);

        let mut groups: Vec<SiblingGroup> = from_group.into_iter().collect();
        if let Some(to_group) = self.items.group_of(source)
            && !groups.contains(&to_group)
        {
            groups.push(to_group);
        }

        if plan.tier_change.is_some()
            && let Some(item) = self.items.get(source).cloned()
        {
            let p = Arc::clone(&self.persistence);
            self.spawn_write(WriteTarget::Reorder(groups.clone()), async move {
                p.update_item(&item).await
            });
        }
        let updates: Vec<SortOrderUpdate> = plan.all_updates().cloned().collect();
        if !updates.is_empty() {
            let p = Arc::clone(&self.persistence);
            self.spawn_write(WriteTarget::Reorder(groups), async move {
                p.update_sort_orders(&updates).await
            });
        }
        info!(
            item = source,
            updates = plan.updates.len() + plan.vacated.len(),
            tier_change = plan.tier_change.is_some(),
            "reordered"
        );
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Toggle an item with its cascade, keep every touched group dense,
    /// persist the changes and tell other views.
    pub fn on_toggle_completion(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Option<CascadeOutcome> {
        let outcome = cascade::toggle_completion(&mut self.items, id, now)?;
        if outcome.changed.is_empty() {
            return Some(outcome);
        }

        let mut groups: Vec<SiblingGroup> = Vec::new();
        for changed in &outcome.changed {
            if let Some(item) = self.items.get(changed) {
                let group = item.sibling_group();
                if !groups.contains(&group) {
                    groups.push(group);
                }
            }
        }

        let mut renumbered: Vec<SortOrderUpdate> = Vec::new();
        for group in &groups {
            let rejoining: Vec<String> = outcome
                .reactivated
                .iter()
                .filter(|r| {
                    self.items
                        .get(r)
                        .is_some_and(|i| i.sibling_group() == *group)
                })
                .cloned()
                .collect();
            let batch = ordering::normalize_group(&self.items, group, &rejoining);
            self.items.apply_sort_orders(&batch);
            renumbered.extend(batch);
        }

        for changed in &outcome.changed {
            if let Some(item) = self.items.get(changed).cloned() {
                let p = Arc::clone(&self.persistence);
                self.spawn_write(WriteTarget::Item(item.id.clone()), async move {
                    p.update_item(&item).await
                });
            }
        }
        let others: Vec<SortOrderUpdate> = renumbered
            .into_iter()
            .filter(|u| !outcome.changed.contains(&u.id))
            .collect();
        if !others.is_empty() {
            let p = Arc::clone(&self.persistence);
            self.spawn_write(WriteTarget::Reorder(groups), async move {
                p.update_sort_orders(&others).await
            });
        }

        self.announce(id, outcome.children_changed);
        if outcome.parent_changed
            && let Some(parent_id) = self.items.get(id).and_then(|i| i.parent_id.clone())
        {
            self.announce(&parent_id, true);
        }
        info!(
            item = id,
            changed = outcome.changed.len(),
            parent_changed = outcome.parent_changed,
            "toggled completion"
        );
        Some(outcome)
    }

    fn announce(&self, id: &str, children_changed: bool) {
        if let Some(item) = self.items.get(id) {
            self.bus.publish(CompletionEvent {
                item_id: item.id.clone(),
                is_completed: item.is_completed,
                completed_at: item.completed_at,
                origin: self.view_id.clone(),
                children_changed,
            });
        }
    }

    /// Apply another view's completion change to the cached copy.
    /// Returns false for own events and unknown items.
    pub async fn apply_remote_event(
        &mut self,
        event: &CompletionEvent,
    ) -> Result<bool, PersistError> {
        if event.origin == self.view_id {
            return Ok(false);
        }
        let Some(item) = self.items.get_mut(&event.item_id) else {
            return Ok(false);
        };
        let reactivated = item.is_completed && !event.is_completed;
        item.is_completed = event.is_completed;
        item.completed_at = event.completed_at;
        let group = item.sibling_group();

        // The origin view already stored its renumbering; mirror it locally
        let rejoining = if reactivated {
            vec![event.item_id.clone()]
        } else {
            Vec::new()
        };
        let updates = ordering::normalize_group(&self.items, &group, &rejoining);
        self.items.apply_sort_orders(&updates);

        if event.children_changed {
            let children = self.persistence.fetch_children(&event.item_id).await?;
            self.items.reconcile_children(&event.item_id, children);
        }
        debug!(item = %event.item_id, origin = %event.origin, "applied remote completion");
        Ok(true)
    }

    /// Apply every queued event from other views. Returns how many applied.
    pub async fn sync_remote(&mut self) -> usize {
        let mut applied = 0;
        for event in self.inbox.drain() {
            match self.apply_remote_event(&event).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => warn!(item = %event.item_id, error = %e, "could not refresh children"),
            }
        }
        applied
    }

    // -----------------------------------------------------------------------
    // Timeline
    // -----------------------------------------------------------------------

    pub fn set_timeline_origin(&mut self, y: f64) {
        self.timeline_origin = y;
    }

    /// Drag a placed block by `pixel_delta`. Returns the new fields.
    pub fn on_schedule_move(&mut self, block_id: &str, pixel_delta: f64) -> Option<BlockFields> {
        let block = self.blocks.get(block_id)?;
        let gesture = MoveGesture::begin(&self.grid, block)?;
        let start = gesture.commit(&self.grid, pixel_delta, block.date);

        let block = self.blocks.get_mut(block_id)?;
        block.scheduled_start_time = Some(start);
        let fields = BlockFields::from(&*block);
        debug!(block = block_id, %start, "block moved");
        self.persist_block_fields(block_id, fields);
        Some(fields)
    }

    /// Drag one edge of a placed block by `pixel_delta`
    pub fn on_schedule_resize(
        &mut self,
        block_id: &str,
        edge: Edge,
        pixel_delta: f64,
    ) -> Option<BlockFields> {
        let block = self.blocks.get_mut(block_id)?;
        let start = block.scheduled_start_time?;
        let duration = block.duration_minutes.unwrap_or(self.grid.default_duration_minutes);
        let (start, duration) = self.grid.resize(start, duration, edge, pixel_delta);
        block.scheduled_start_time = Some(start);
        block.duration_minutes = Some(duration);
        let fields = BlockFields::from(&*block);
        debug!(block = block_id, ?edge, %start, duration, "block resized");
        self.persist_block_fields(block_id, fields);
        Some(fields)
    }

    /// Drop an item onto the timeline at screen position `screen_y`
    pub fn on_schedule_drop_create(
        &mut self,
        item_id: &str,
        screen_y: f64,
        date: NaiveDate,
        timeframe: Timeframe,
        section: &str,
    ) -> Option<ScheduledBlock> {
        if !self.items.contains(item_id) {
            return None;
        }
        let block = self.grid.drop_create(
            item_id,
            screen_y,
            self.timeline_origin,
            date,
            timeframe,
            section,
        );
        self.blocks.insert(block.clone());
        let p = Arc::clone(&self.persistence);
        let stored = block.clone();
        self.spawn_write(WriteTarget::Block(block.id.clone()), async move {
            p.create_scheduled_block(&stored).await.map(|_| ())
        });
        info!(block = %block.id, item = item_id, "block created from drop");
        Some(block)
    }

    /// Commit an item to a timeframe without placing it on the timeline
    pub fn schedule(
        &mut self,
        item_id: &str,
        timeframe: Timeframe,
        section: &str,
        date: NaiveDate,
    ) -> Option<ScheduledBlock> {
        if !self.items.contains(item_id) {
            return None;
        }
        let block = ScheduledBlock::new(item_id, timeframe, section, date);
        self.blocks.insert(block.clone());
        let p = Arc::clone(&self.persistence);
        let stored = block.clone();
        self.spawn_write(WriteTarget::Block(block.id.clone()), async move {
            p.create_scheduled_block(&stored).await.map(|_| ())
        });
        Some(block)
    }

    /// Take a block off the timeline: blocks that only exist because of a
    /// drop are deleted, others keep their commitment without a time.
    pub fn unschedule(&mut self, block_id: &str) -> Option<Unschedule> {
        let action = time_grid::unschedule(self.blocks.get(block_id)?);
        match &action {
            Unschedule::DeleteBlock(id) => {
                self.blocks.remove(id);
                let p = Arc::clone(&self.persistence);
                let id = id.clone();
                self.spawn_write(WriteTarget::Block(id.clone()), async move {
                    p.delete_scheduled_block(&id).await
                });
            }
            Unschedule::ClearTime(id) => {
                let block = self.blocks.get_mut(id)?;
                block.clear_time();
                let fields = BlockFields::from(&*block);
                self.persist_block_fields(id, fields);
            }
        }
        debug!(block = block_id, ?action, "unscheduled");
        Some(action)
    }

    fn persist_block_fields(&mut self, block_id: &str, fields: BlockFields) {
        let p = Arc::clone(&self.persistence);
        let id = block_id.to_string();
        self.spawn_write(WriteTarget::Block(id.clone()), async move {
            p.update_scheduled_block(&id, fields).await
        });
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Add an item at the end of its group. Children take their parent's kind.
    pub fn create_item(
        &mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<&str>,
        tier: Option<PriorityTier>,
    ) -> Result<Item, SessionError> {
        let id = id.into();
        if self.items.contains(&id) {
            return Err(SessionError::Duplicate(id));
        }
        let mut item = match parent_id {
            Some(pid) => {
                let parent = self
                    .items
                    .get(pid)
                    .ok_or_else(|| SessionError::NotFound(pid.to_string()))?;
                if !parent.is_top_level() {
                    return Err(SessionError::InvalidParent(pid.to_string()));
                }
                Item::child_of(parent, id, title)
            }
            None => Item::new(id, self.kind, title).with_tier(tier.unwrap_or_default()),
        };
        item.sort_order = ordering::next_sort_order(&self.items, &item.sibling_group());
        self.items.insert(item.clone());

        let p = Arc::clone(&self.persistence);
        let stored = item.clone();
        self.spawn_write(WriteTarget::Item(item.id.clone()), async move {
            p.create_item(&stored).await
        });
        info!(item = %item.id, group = %item.sibling_group(), "created item");
        Ok(item)
    }

    /// Delete an item, its children and their blocks. Returns the removed ids.
    pub fn delete_item(&mut self, id: &str) -> Vec<String> {
        let group = self.items.group_of(id);
        let removed: Vec<String> = self
            .items
            .remove_with_children(id)
            .into_iter()
            .map(|i| i.id)
            .collect();
        if removed.is_empty() {
            return removed;
        }
        let blocks = self.blocks.remove_for_items(&removed);

        let p = Arc::clone(&self.persistence);
        let doomed = id.to_string();
        self.spawn_write(WriteTarget::Item(doomed.clone()), async move {
            p.delete_item(&doomed).await
        });

        if let Some(group) = group {
            let updates = ordering::normalize_group(&self.items, &group, &[]);
            if !updates.is_empty() {
                self.items.apply_sort_orders(&updates);
                let p = Arc::clone(&self.persistence);
                self.spawn_write(WriteTarget::Reorder(vec![group]), async move {
                    p.update_sort_orders(&updates).await
                });
            }
        }
        info!(item = id, removed = removed.len(), blocks = blocks.len(), "deleted item");
        removed
    }

    /// Set or clear an item's note. Failures are logged and left alone.
    pub fn set_note(&mut self, id: &str, text: Option<String>) -> bool {
        let Some(item) = self.items.get_mut(id) else {
            return false;
        };
        item.note = text.filter(|t| !t.trim().is_empty());
        let stored = item.clone();
        let p = Arc::clone(&self.persistence);
        self.spawn_write(WriteTarget::Note(id.to_string()), async move {
            p.update_item(&stored).await
        });
        true
    }

    // -----------------------------------------------------------------------
    // Write settlement
    // -----------------------------------------------------------------------

    fn spawn_write<F>(&mut self, target: WriteTarget, write: F)
    where
        F: Future<Output = Result<(), PersistError>> + Send + 'static,
    {
        self.writes.submit(WriteJob {
            target,
            write: Box::pin(write),
        });
    }

    /// Wait for every in-flight write. Failed reorders re-fetch the groups
    /// involved; nothing is retried.
    pub async fn settle(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        let mut stale: Vec<SiblingGroup> = Vec::new();

        while let Some(outcome) = self.writes.next().await {
            let Err(e) = outcome.result else {
                continue;
            };
            match outcome.target {
                WriteTarget::Reorder(groups) => {
                    warn!(error = %e, "reorder write failed");
                    for group in &groups {
                        if !stale.contains(group) {
                            stale.push(group.clone());
                        }
                    }
                    notices.push(SessionNotice::ReorderFailed {
                        groups,
                        message: e.to_string(),
                    });
                }
                WriteTarget::Item(id) | WriteTarget::Block(id) => {
                    warn!(id = %id, error = %e, "write failed");
                    notices.push(SessionNotice::WriteFailed {
                        id,
                        message: e.to_string(),
                    });
                }
                WriteTarget::Note(id) => {
                    warn!(id = %id, error = %e, "note write failed");
                }
            }
        }

        for group in stale {
            if let Err(e) = self.reconcile_group(&group).await {
                warn!(group = %group, error = %e, "re-fetch failed");
            }
        }
        notices
    }

    /// Replace a group with the backend's canonical copy
    pub async fn reconcile_group(&mut self, group: &SiblingGroup) -> Result<(), PersistError> {
        match group {
            SiblingGroup::TopLevel { kind, .. } => {
                let fetched = self.persistence.fetch_items(*kind).await?;
                self.items.reconcile_top_level(*kind, fetched);
            }
            SiblingGroup::Children { parent_id } => {
                let fetched = self.persistence.fetch_children(parent_id).await?;
                self.items.reconcile_children(parent_id, fetched);
            }
        }
        info!(group = %group, "re-fetched group");
        Ok(())
    }
}
