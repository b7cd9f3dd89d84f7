use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::drag::{DragController, DragSource, DropOutcome, ListLayout};
use crate::app::save::{SaveEvent, SavePipeline, SaveStatus};
use crate::config::AppConfig;
use crate::identity::UserId;
use crate::links::catalog::CATALOG_VERSION;
use crate::links::{
    resolve_all, LinkEntry, LinkId, LinkRecord, LinkStore, Platform, StoreChange, StoreError,
    StoreNotice,
};
use crate::profile::ProfileDetails;
use crate::storage::LinkRepository;

pub const EMPTY_LINK_MESSAGE: &str = "Can't be empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Platform,
    Link,
}

#[derive(Debug, Clone, Copy)]
pub struct EditorOptions {
    pub preview_links: usize,
    pub max_link_len: usize,
    pub mouse: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            preview_links: 5,
            max_link_len: 2048,
            mouse: true,
        }
    }
}

impl From<&AppConfig> for EditorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            preview_links: usize::from(config.preview_links),
            max_link_len: config.editor.max_link_len,
            mouse: config.editor.mouse,
        }
    }
}

/// Single-line text field bound to one row by id.
#[derive(Debug, Clone)]
pub struct LinkInput {
    id: LinkId,
    buffer: String,
    cursor: usize,
    max_len: usize,
}

impl LinkInput {
    fn new(id: LinkId, buffer: String, max_len: usize) -> Self {
        let cursor = buffer.len();
        Self {
            id,
            buffer,
            cursor,
            max_len,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Display width of the text before the cursor.
    pub fn cursor_column(&self) -> usize {
        self.buffer[..self.cursor].width()
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.buffer.len() + ch.len_utf8() > self.max_len {
            return false;
        }
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        true
    }

    /// Whether `text`, minus control characters, fits in the remaining length.
    pub fn fits(&self, text: &str) -> bool {
        let extra: usize = text
            .chars()
            .filter(|ch| !ch.is_control())
            .map(char::len_utf8)
            .sum();
        self.buffer.len() + extra <= self.max_len
    }

    /// Inserts all of `text` or nothing.
    pub fn insert_str(&mut self, text: &str) -> bool {
        if !self.fits(text) {
            return false;
        }
        let mut changed = false;
        for ch in text.chars() {
            changed |= self.insert_char(ch);
        }
        changed
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        self.buffer.clear();
        self.cursor = 0;
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        true
    }

    pub fn move_right(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        true
    }

    pub fn move_home(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = 0;
        true
    }

    pub fn move_end(&mut self) -> bool {
        if self.cursor == self.buffer.len() {
            return false;
        }
        self.cursor = self.buffer.len();
        true
    }

    /// Jumps back to just after the previous URL separator.
    pub fn move_segment_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let mut idx = prev_grapheme_boundary(&self.buffer, self.cursor);
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if is_separator(&self.buffer[prev..idx]) {
                break;
            }
            idx = prev;
        }
        self.cursor = idx;
        true
    }

    pub fn move_segment_right(&mut self) -> bool {
        let len = self.buffer.len();
        if self.cursor >= len {
            return false;
        }
        let mut idx = next_grapheme_boundary(&self.buffer, self.cursor);
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if is_separator(&self.buffer[idx..next]) {
                idx = next;
                break;
            }
            idx = next;
        }
        self.cursor = idx;
        true
    }
}

/// Platform picker overlay for the row with `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformPicker {
    pub id: LinkId,
    pub highlighted: Platform,
}

/// One rendered row, in display order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub entry: &'a LinkEntry,
    pub number: usize,
    pub selected: bool,
    pub dragging: bool,
    pub error: Option<&'static str>,
    pub input: Option<&'a LinkInput>,
}

/// Editing session: owns the store for the lifetime of the editor screen and
/// routes every gesture into it.
pub struct AppState {
    store: LinkStore,
    notices: Receiver<StoreNotice>,
    repository: Arc<dyn LinkRepository>,
    save: SavePipeline,
    drag: DragController,
    layout: ListLayout,
    selected: usize,
    field: Field,
    picker: Option<PlatformPicker>,
    input: Option<LinkInput>,
    touched: HashSet<LinkId>,
    save_attempted: bool,
    clean_revision: u64,
    needs_redraw: bool,
    status_message: Option<String>,
    options: EditorOptions,
    pub profile: Option<ProfileDetails>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn LinkRepository>,
        user_id: UserId,
        mut store: LinkStore,
        options: EditorOptions,
    ) -> Self {
        let notices = store.subscribe();
        let clean_revision = store.revision();
        let save = SavePipeline::new(Arc::clone(&repository), user_id);
        Self {
            store,
            notices,
            repository,
            save,
            drag: DragController::new(),
            layout: ListLayout::default(),
            selected: 0,
            field: Field::Link,
            picker: None,
            input: None,
            touched: HashSet::new(),
            save_attempted: false,
            clean_revision,
            needs_redraw: true,
            status_message: None,
            options,
            profile: None,
        }
    }

    /// Opens a session pre-populated from the persisted list.
    pub fn load(
        repository: Arc<dyn LinkRepository>,
        user_id: UserId,
        options: EditorOptions,
    ) -> Result<Self> {
        let records = fetch_records(repository.as_ref(), &user_id)?;
        tracing::info!(
            user = %user_id,
            count = records.len(),
            catalog = CATALOG_VERSION,
            "editing session started"
        );
        let store = LinkStore::from_records(records);
        Ok(Self::new(repository, user_id, store, options))
    }

    pub fn store(&self) -> &LinkStore {
        &self.store
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn picker(&self) -> Option<&PlatformPicker> {
        self.picker.as_ref()
    }

    pub fn input(&self) -> Option<&LinkInput> {
        self.input.as_ref()
    }

    /// Position the viewport keeps on screen: the drag target while a drag
    /// runs, otherwise the selection.
    pub fn focus_index(&self) -> usize {
        self.drag
            .over()
            .or_else(|| self.drag.active())
            .and_then(|id| self.store.position_of(id))
            .unwrap_or(self.selected)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_source(&self) -> Option<DragSource> {
        self.drag.source()
    }

    pub fn layout(&self) -> &ListLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: ListLayout) {
        self.layout = layout;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
        self.needs_redraw = true;
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save.status(self.store.entries())
    }

    pub fn can_save(&self) -> bool {
        self.save.is_enabled(self.store.entries())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.store.revision() != self.clean_revision
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Returns whether anything changed since the previous call.
    pub fn take_redraw(&mut self) -> bool {
        self.pump_notices();
        std::mem::take(&mut self.needs_redraw)
    }

    /// Inline validation message for the row at `index`.
    pub fn row_error(&self, index: usize) -> Option<&'static str> {
        let entry = self.store.get(index)?;
        if entry.has_link() {
            return None;
        }
        let shown = self.save_attempted
            || self.touched.contains(&entry.id)
            || entry.link.is_some();
        shown.then_some(EMPTY_LINK_MESSAGE)
    }

    /// Rows in display order. While a drag is running this is the previewed
    /// order, not the store's.
    pub fn rows(&self) -> Vec<RowView<'_>> {
        let ids = self.store.ids();
        let order = self.drag.preview_order(&ids);
        let active = self.drag.active();
        let selected_id = self.store.get(self.selected).map(|entry| entry.id);
        order
            .iter()
            .enumerate()
            .filter_map(|(display, id)| {
                let index = self.store.position_of(*id)?;
                let entry = self.store.get(index)?;
                Some(RowView {
                    entry,
                    number: display + 1,
                    selected: Some(*id) == selected_id,
                    dragging: Some(*id) == active,
                    error: self.row_error(index),
                    input: self.input.as_ref().filter(|input| input.id == *id),
                })
            })
            .collect()
    }

    /// Platform and link of the first entries that have a link, for the
    /// phone preview.
    pub fn preview_links(&self) -> Vec<(Platform, &str)> {
        self.store
            .entries()
            .iter()
            .filter(|entry| entry.has_link())
            .filter_map(|entry| entry.link.as_deref().map(|link| (entry.platform, link)))
            .take(self.options.preview_links)
            .collect()
    }

    pub fn add_link(&mut self) {
        self.close_link_input();
        self.store.add_entry();
        self.pump_notices();
        self.selected = self.store.len() - 1;
        self.field = Field::Link;
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.store.is_empty() {
            return;
        }
        self.close_link_input();
        let last = self.store.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
        self.needs_redraw = true;
    }

    pub fn select_index(&mut self, index: usize) {
        if index < self.store.len() && index != self.selected {
            self.close_link_input();
            self.selected = index;
            self.needs_redraw = true;
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            Field::Platform => Field::Link,
            Field::Link => Field::Platform,
        };
        self.needs_redraw = true;
    }

    pub fn open_platform_picker(&mut self) {
        let Some((id, highlighted)) = self
            .store
            .get(self.selected)
            .map(|entry| (entry.id, entry.platform))
        else {
            return;
        };
        self.close_link_input();
        self.picker = Some(PlatformPicker { id, highlighted });
        self.field = Field::Platform;
        self.needs_redraw = true;
    }

    pub fn picker_move(&mut self, delta: isize) {
        if let Some(picker) = self.picker.as_mut() {
            picker.highlighted = picker.highlighted.cycle(delta);
            self.needs_redraw = true;
        }
    }

    pub fn picker_cancel(&mut self) {
        if self.picker.take().is_some() {
            self.needs_redraw = true;
        }
    }

    pub fn picker_confirm(&mut self) -> Result<(), StoreError> {
        let Some(picker) = self.picker.take() else {
            return Ok(());
        };
        self.needs_redraw = true;
        let Some(index) = self.store.position_of(picker.id) else {
            return Ok(());
        };
        self.store.set_platform(index, picker.highlighted)?;
        self.pump_notices();
        Ok(())
    }

    pub fn begin_link_input(&mut self) {
        let Some(entry) = self.store.get(self.selected) else {
            return;
        };
        let current = entry.link.clone().unwrap_or_default();
        self.input = Some(LinkInput::new(entry.id, current, self.options.max_link_len));
        self.field = Field::Link;
        self.needs_redraw = true;
    }

    pub fn close_link_input(&mut self) {
        if let Some(input) = self.input.take() {
            self.touched.insert(input.id);
            self.needs_redraw = true;
        }
    }

    /// Applies a text edit and writes the result through to the store.
    pub fn edit_link<F>(&mut self, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut LinkInput) -> bool,
    {
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };
        let changed = edit(input);
        let id = input.id;
        let text = input.buffer.clone();
        self.needs_redraw = true;
        if !changed || self.current_link(id) == Some(text.as_str()) {
            return Ok(());
        }
        match self.store.position_of(id) {
            Some(index) => {
                self.store.set_link(index, text)?;
                self.touched.insert(id);
                self.pump_notices();
            }
            None => self.input = None,
        }
        Ok(())
    }

    /// Pastes into the open link input. A paste that would overflow the
    /// length limit is refused whole.
    pub fn paste_link(&mut self, text: &str) -> Result<(), StoreError> {
        let Some(input) = self.input.as_ref() else {
            return Ok(());
        };
        if !input.fits(text) {
            tracing::debug!(len = text.len(), "paste refused");
            self.set_status_message(Some(format!(
                "Paste refused: links are limited to {} bytes",
                self.options.max_link_len
            )));
            return Ok(());
        }
        self.edit_link(|input| input.insert_str(text))
    }

    pub fn remove_selected(&mut self) -> Result<Option<LinkEntry>, StoreError> {
        if self.store.is_empty() {
            return Ok(None);
        }
        self.close_link_input();
        let removed = self.store.remove_entry(self.selected)?;
        self.touched.remove(&removed.id);
        self.pump_notices();
        Ok(Some(removed))
    }

    /// Space: grab the selected row, or drop the one already grabbed.
    /// Returns `None` when a grab started.
    pub fn toggle_grab(&mut self) -> Result<Option<DropOutcome>, StoreError> {
        if self.drag.is_dragging() {
            let outcome = self.drag.drop_on(&mut self.store)?;
            self.pump_notices();
            self.needs_redraw = true;
            return Ok(Some(outcome));
        }
        let Some(entry) = self.store.get(self.selected) else {
            return Ok(Some(DropOutcome::Cancelled));
        };
        let id = entry.id;
        self.close_link_input();
        self.drag.begin(id, DragSource::Keyboard);
        self.needs_redraw = true;
        Ok(None)
    }

    pub fn drag_step(&mut self, delta: isize) {
        let ids = self.store.ids();
        self.drag.step(delta, &ids);
        self.needs_redraw = true;
    }

    pub fn cancel_drag(&mut self) -> DropOutcome {
        self.needs_redraw = true;
        self.drag.cancel()
    }

    pub fn pointer_down(&mut self, column: u16, row: u16) {
        if !self.options.mouse || !self.layout.contains(column, row) {
            return;
        }
        let Some(slot) = self.layout.slot_at(row) else {
            return;
        };
        let Some(entry) = self.store.get(slot) else {
            return;
        };
        let id = entry.id;
        self.select_index(slot);
        if self.layout.on_handle(column) {
            self.close_link_input();
            self.drag.begin(id, DragSource::Pointer);
        }
        self.needs_redraw = true;
    }

    pub fn pointer_moved(&mut self, column: u16, row: u16) {
        if self.drag.source() != Some(DragSource::Pointer) {
            return;
        }
        let ids = self.store.ids();
        self.drag.pointer_moved(column, row, &self.layout, &ids);
        self.needs_redraw = true;
    }

    pub fn pointer_up(&mut self, column: u16, row: u16) -> Result<Option<DropOutcome>, StoreError> {
        if self.drag.source() != Some(DragSource::Pointer) {
            return Ok(None);
        }
        self.pointer_moved(column, row);
        let outcome = self.drag.drop_on(&mut self.store)?;
        self.pump_notices();
        Ok(Some(outcome))
    }

    /// Save click. Returns whether a submission was started.
    pub fn save(&mut self) -> Result<bool> {
        self.save_attempted = true;
        self.close_link_input();
        let blockers = self.save.blockers(self.store.entries());
        let started = self.save.submit(&self.store)?;
        if started {
            self.set_status_message(Some("Saving links…"));
        } else {
            self.set_status_message(Some(format!("Can't save yet: {}", blockers.describe())));
        }
        Ok(started)
    }

    /// Picks up a finished save, if any.
    pub fn on_tick(&mut self) -> Option<SaveEvent> {
        let event = self.save.poll()?;
        self.apply_save_event(&event);
        Some(event)
    }

    pub fn wait_for_save(&mut self, timeout: Duration) -> Option<SaveEvent> {
        let event = self.save.wait(timeout)?;
        self.apply_save_event(&event);
        Some(event)
    }

    /// Replaces the session's collection with what persistence holds now.
    pub fn reload(&mut self) -> Result<()> {
        let records = fetch_records(self.repository.as_ref(), self.save.user_id())?;
        self.drag.cancel();
        self.picker = None;
        self.input = None;
        self.store.replace_all(records);
        self.pump_notices();
        self.clean_revision = self.store.revision();
        self.save_attempted = false;
        self.touched.clear();
        Ok(())
    }

    fn apply_save_event(&mut self, event: &SaveEvent) {
        self.needs_redraw = true;
        match event {
            SaveEvent::Saved { revision, .. } => {
                if *revision != self.store.revision() {
                    self.clean_revision = *revision;
                    self.set_status_message(Some(
                        "Links saved; newer edits are still unsaved",
                    ));
                    return;
                }
                match self.reload() {
                    Ok(()) => self.set_status_message(Some("Your changes have been saved")),
                    Err(err) => {
                        tracing::error!(error = ?err, "reload after save failed");
                        self.clean_revision = *revision;
                        self.set_status_message(Some("Links saved; reload failed, see logs"));
                    }
                }
            }
            SaveEvent::Failed { message } => {
                self.set_status_message(Some(format!("Save failed: {message}")));
            }
        }
    }

    fn current_link(&self, id: LinkId) -> Option<&str> {
        let index = self.store.position_of(id)?;
        self.store.entries()[index].link.as_deref()
    }

    fn pump_notices(&mut self) {
        let mut seen = false;
        for notice in self.notices.try_iter() {
            seen = true;
            match notice.change {
                StoreChange::Removed { index, .. } if index < self.selected => {
                    self.selected -= 1;
                }
                StoreChange::Reordered { from, to } => {
                    self.selected = follow_reorder(self.selected, from, to);
                }
                _ => {}
            }
        }
        if seen {
            self.needs_redraw = true;
        }
        if self.selected >= self.store.len() {
            self.selected = self.store.len().saturating_sub(1);
        }
    }
}

fn fetch_records(
    repository: &dyn LinkRepository,
    user_id: &UserId,
) -> Result<Vec<LinkRecord>> {
    let stored = repository
        .get_links_for_user(user_id)
        .with_context(|| format!("loading links for user {user_id}"))?;
    let records = resolve_all(&stored).context("stored links reference a retired platform")?;
    Ok(records)
}

/// Where the entry at `selected` ends up after `reorder(from, to)`.
fn follow_reorder(selected: usize, from: usize, to: usize) -> usize {
    if selected == from {
        to
    } else if from < to && selected > from && selected <= to {
        selected - 1
    } else if to < from && selected >= to && selected < from {
        selected + 1
    } else {
        selected
    }
}

fn is_separator(grapheme: &str) -> bool {
    matches!(grapheme, "/" | "." | "?" | "&" | "=" | "#")
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}
