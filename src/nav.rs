use anyhow::{Context, Result};

use crate::farcaster::CastGroup;
use crate::focus::{Focus, FocusTarget};
use crate::format::BlockRenderer;
use crate::history::{Entry, History, Location};
use crate::thread;
use crate::viewport::{ViewSnapshot, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Up,
    Down,
    Activate,
    Back,
    Reload,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Unchanged,
    Render,
    Load(Location),
    OpenExternal(String),
    Busy,
    AtRoot,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Push,
    Pop { restore: ViewSnapshot },
    Refresh { restore: ViewSnapshot },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    location: Location,
    transition: Transition,
}

pub struct Navigator {
    history: History,
    viewport: Viewport,
    focus: Focus,
    group: CastGroup,
    renderer: Box<dyn BlockRenderer + Send>,
    pending: Option<Pending>,
}

impl Navigator {
    pub fn new(
        start: Location,
        renderer: Box<dyn BlockRenderer + Send>,
        history_capacity: usize,
        height: usize,
    ) -> Self {
        let mut history = History::new(history_capacity);
        history.push(Entry::new(start));
        Self {
            history,
            viewport: Viewport::new(height),
            focus: Focus::Unfocused,
            group: CastGroup::new(),
            renderer,
            pending: None,
        }
    }

    pub fn handle(&mut self, intent: Intent) -> Effect {
        match intent {
            Intent::Quit => Effect::Quit,
            Intent::Up => self.step(-1),
            Intent::Down => self.step(1),
            Intent::Activate => self.activate(),
            Intent::Back => self.back(),
            Intent::Reload => self.reload(),
        }
    }

    fn step(&mut self, delta: isize) -> Effect {
        let changed = if self.focus.is_focused() {
            self.focus.cycle(delta)
        } else if delta < 0 {
            self.viewport.move_up()
        } else {
            self.viewport.move_down()
        };
        if changed {
            Effect::Render
        } else {
            Effect::Unchanged
        }
    }

    fn activate(&mut self) -> Effect {
        if self.pending.is_some() {
            return Effect::Busy;
        }
        let Some(current) = self.current_location() else {
            return Effect::Unchanged;
        };
        match current {
            Location::List { .. } => match self.viewport.cursor_block().map(|block| block.id) {
                Some(id) => self.begin(Location::Thread(id), Transition::Push),
                None => Effect::Unchanged,
            },
            Location::Thread(_) | Location::Cast(_) => {
                if !self.focus.is_focused() {
                    return self.focus_cursor();
                }
                match self.focus.target().cloned() {
                    Some(FocusTarget::Author(fid)) => {
                        self.begin(Location::List { fid }, Transition::Push)
                    }
                    Some(FocusTarget::Cast(id)) => {
                        self.begin(Location::Thread(id), Transition::Push)
                    }
                    Some(FocusTarget::Link(url)) => Effect::OpenExternal(url),
                    None => Effect::Unchanged,
                }
            }
        }
    }

    fn focus_cursor(&mut self) -> Effect {
        let cursor = self.viewport.cursor();
        let Some(block) = self.viewport.cursor_block() else {
            return Effect::Unchanged;
        };
        let Some(node) = self.group.get(&block.id.hash) else {
            return Effect::Unchanged;
        };
        self.focus = Focus::focus(cursor, &node.cast);
        Effect::Render
    }

    fn back(&mut self) -> Effect {
        if self.focus.is_focused() {
            self.focus.clear();
            return Effect::Render;
        }
        if self.pending.is_some() {
            return Effect::Busy;
        }
        match self.history.previous().ok().copied() {
            Some(previous) => self.begin(
                previous.location,
                Transition::Pop {
                    restore: previous.view,
                },
            ),
            None => Effect::AtRoot,
        }
    }

    fn reload(&mut self) -> Effect {
        if self.pending.is_some() {
            return Effect::Busy;
        }
        let Some(location) = self.current_location() else {
            return Effect::Unchanged;
        };
        let restore = self.viewport.snapshot();
        self.begin(location, Transition::Refresh { restore })
    }

    pub fn start(&mut self) -> Effect {
        self.reload()
    }

    fn begin(&mut self, location: Location, transition: Transition) -> Effect {
        tracing::debug!(%location, ?transition, "load requested");
        self.pending = Some(Pending {
            location,
            transition,
        });
        Effect::Load(location)
    }

    // On error the pending transition is dropped and the current view is kept.
    pub fn complete(&mut self, result: Result<CastGroup>) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            tracing::warn!("load completed with nothing pending");
            return Ok(());
        };
        let group = match result {
            Ok(group) => group,
            Err(err) => {
                tracing::warn!(location = %pending.location, error = %err, "load failed");
                return Err(err.context(format!("load {}", pending.location)));
            }
        };

        match pending.transition {
            Transition::Push => {
                self.history
                    .set_view(self.viewport.snapshot())
                    .context("save view before leaving it")?;
                self.history.push(Entry::new(pending.location));
                self.install(group, None);
            }
            Transition::Pop { restore } => {
                debug_assert!(self.history.len() > 1, "back would drain the history");
                self.history.pop().context("pop history")?;
                self.install(group, Some(restore));
            }
            Transition::Refresh { restore } => {
                self.install(group, Some(restore));
            }
        }
        tracing::debug!(
            location = %pending.location,
            blocks = self.viewport.len(),
            depth = self.history.len(),
            "view loaded"
        );
        Ok(())
    }

    fn install(&mut self, group: CastGroup, restore: Option<ViewSnapshot>) {
        let blocks = thread::flatten(&group, group.head, self.renderer.as_ref());
        let budget = self.viewport.budget();
        self.viewport.reset(blocks, budget);
        if let Some(snapshot) = restore {
            self.viewport.restore(snapshot);
        }
        self.group = group;
        self.focus.clear();
    }

    pub fn resize(&mut self, height: usize) {
        self.viewport.resize(height);
    }

    pub fn current_location(&self) -> Option<Location> {
        self.history.peek().ok().map(|entry| entry.location)
    }

    pub fn pending_location(&self) -> Option<Location> {
        self.pending.map(|pending| pending.location)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn group(&self) -> &CastGroup {
        &self.group
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}
