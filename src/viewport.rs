use crate::thread::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub cursor: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewLine<'a> {
    pub text: &'a str,
    pub selected: bool,
}

const BLANK_LINE: ViewLine<'static> = ViewLine {
    text: "",
    selected: false,
};

// Each block costs its height plus a separator line. A block taller than
// the budget may still fill the window alone.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    blocks: Vec<Block>,
    cursor: usize,
    start: usize,
    end: usize,
    budget: usize,
}

impl Viewport {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn reset(&mut self, blocks: Vec<Block>, budget: usize) {
        self.blocks = blocks;
        self.budget = budget;
        self.cursor = 0;
        self.start = 0;
        self.end = if self.blocks.is_empty() {
            0
        } else {
            self.fill_forward(0)
        };
    }

    pub fn move_up(&mut self) -> bool {
        if self.cursor == 0 || self.blocks.is_empty() {
            return false;
        }
        self.cursor -= 1;
        if self.cursor < self.start {
            self.start = self.cursor;
            self.end = self.fill_forward(self.start);
        }
        true
    }

    pub fn move_down(&mut self) -> bool {
        if self.cursor + 1 >= self.blocks.len() {
            return false;
        }
        self.cursor += 1;
        if self.cursor > self.end {
            self.end = self.cursor;
            self.start = self.fill_backward(self.end);
        }
        true
    }

    // Verbatim unless the budget shrank or the blocks grew since the save.
    pub fn restore(&mut self, snapshot: ViewSnapshot) {
        if self.blocks.is_empty() {
            self.cursor = 0;
            self.start = 0;
            self.end = 0;
            return;
        }
        let last = self.blocks.len() - 1;
        self.cursor = snapshot.cursor.min(last);
        self.end = snapshot.end.min(last).max(self.cursor);
        self.start = snapshot.start.min(self.cursor);
        if self.start != self.end && self.window_cost() > self.budget {
            self.refit();
        }
    }

    pub fn resize(&mut self, budget: usize) {
        if budget == self.budget {
            return;
        }
        self.budget = budget;
        if self.blocks.is_empty() {
            return;
        }
        self.refit();
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            cursor: self.cursor,
            start: self.start,
            end: self.end,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn cursor_block(&self) -> Option<&Block> {
        self.blocks.get(self.cursor)
    }

    pub fn render(&self) -> Vec<ViewLine<'_>> {
        let mut lines: Vec<ViewLine<'_>> = Vec::with_capacity(self.budget);
        for (index, block) in self.blocks.iter().enumerate().skip(self.start) {
            let remaining = self.budget.saturating_sub(lines.len());
            if remaining == 0 {
                break;
            }
            let selected = index == self.cursor;
            let mut text_lines = block.text.lines();
            if block.height + 1 <= remaining {
                for _ in 0..block.height {
                    let text = text_lines.next().unwrap_or_default();
                    lines.push(ViewLine { text, selected });
                }
                lines.push(BLANK_LINE);
            } else {
                for _ in 0..remaining.min(block.height) {
                    let text = text_lines.next().unwrap_or_default();
                    lines.push(ViewLine { text, selected });
                }
                break;
            }
        }
        lines.resize(self.budget, BLANK_LINE);
        lines
    }

    fn cost(&self, index: usize) -> usize {
        self.blocks[index].height + 1
    }

    fn window_cost(&self) -> usize {
        (self.start..=self.end).map(|index| self.cost(index)).sum()
    }

    fn refit(&mut self) {
        self.end = self.fill_forward(self.start);
        if self.cursor > self.end {
            self.end = self.cursor;
            self.start = self.fill_backward(self.end);
        }
    }

    fn fill_forward(&self, start: usize) -> usize {
        let mut used = 0;
        let mut end = start;
        for index in start..self.blocks.len() {
            let cost = self.cost(index);
            if used + cost > self.budget {
                break;
            }
            used += cost;
            end = index;
        }
        end
    }

    fn fill_backward(&self, end: usize) -> usize {
        let mut used = 0;
        let mut start = end;
        for index in (0..=end).rev() {
            let cost = self.cost(index);
            if used + cost > self.budget {
                break;
            }
            used += cost;
            start = index;
        }
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farcaster::{CastId, Hash, HASH_LEN};

    fn blocks(heights: &[usize]) -> Vec<Block> {
        heights
            .iter()
            .enumerate()
            .map(|(index, height)| Block {
                id: CastId::new(index as u64, Hash::new([index as u8; HASH_LEN])),
                depth: 0,
                text: (0..*height)
                    .map(|line| format!("b{index}l{line}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                height: *height,
            })
            .collect()
    }

    fn make_viewport(heights: &[usize], budget: usize) -> Viewport {
        let mut viewport = Viewport::new(budget);
        viewport.reset(blocks(heights), budget);
        viewport
    }

    fn window_height(viewport: &Viewport) -> usize {
        let snap = viewport.snapshot();
        (snap.start..=snap.end)
            .map(|index| viewport.blocks()[index].height + 1)
            .sum()
    }

    fn assert_invariants(viewport: &Viewport) {
        let snap = viewport.snapshot();
        assert!(snap.start <= snap.cursor, "{snap:?}");
        assert!(snap.cursor <= snap.end, "{snap:?}");
        assert!(snap.end < viewport.len(), "{snap:?}");
        if snap.start != snap.end {
            assert!(window_height(viewport) <= viewport.budget(), "{snap:?}");
        }
        assert_eq!(viewport.render().len(), viewport.budget());
    }

    #[test]
    fn reset_fills_greedily_from_top() {
        let viewport = make_viewport(&[3, 3, 3, 3], 9);
        assert_eq!(
            viewport.snapshot(),
            ViewSnapshot {
                cursor: 0,
                start: 0,
                end: 1
            }
        );
    }

    #[test]
    fn oversized_first_block_still_occupies_window() {
        let viewport = make_viewport(&[20, 1], 5);
        assert_eq!(viewport.snapshot().end, 0);
        let lines = viewport.render();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| line.selected));
        assert_eq!(lines[4].text, "b0l4");
    }

    #[test]
    fn moving_down_anchors_new_block_at_bottom() {
        let mut viewport = make_viewport(&[2, 2, 2, 2, 2], 7);
        assert_eq!(viewport.snapshot().end, 1);
        viewport.move_down();
        assert_eq!(viewport.snapshot().start, 0);
        viewport.move_down();
        assert_eq!(
            viewport.snapshot(),
            ViewSnapshot {
                cursor: 2,
                start: 1,
                end: 2
            }
        );
    }

    #[test]
    fn moving_up_fills_forward_from_new_top() {
        let mut viewport = make_viewport(&[2, 2, 2, 2, 2], 7);
        for _ in 0..4 {
            viewport.move_down();
        }
        assert_eq!(viewport.snapshot().start, 3);
        viewport.move_up();
        viewport.move_up();
        assert_eq!(
            viewport.snapshot(),
            ViewSnapshot {
                cursor: 2,
                start: 2,
                end: 3
            }
        );
    }

    #[test]
    fn moves_past_the_ends_are_noops() {
        let mut viewport = make_viewport(&[1, 1], 10);
        assert!(!viewport.move_up());
        assert!(viewport.move_down());
        let before = viewport.snapshot();
        assert!(!viewport.move_down());
        assert_eq!(viewport.snapshot(), before);
    }

    #[test]
    fn empty_viewport_is_parked_and_renders_blank() {
        let mut viewport = make_viewport(&[], 4);
        assert!(!viewport.move_down());
        assert!(!viewport.move_up());
        viewport.restore(ViewSnapshot {
            cursor: 3,
            start: 2,
            end: 5,
        });
        assert_eq!(viewport.snapshot(), ViewSnapshot::default());
        let lines = viewport.render();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| line.text.is_empty()));
    }

    #[test]
    fn restore_is_verbatim_then_clamped() {
        let mut viewport = make_viewport(&[1, 1, 1, 1, 1, 1], 100);
        let saved = ViewSnapshot {
            cursor: 4,
            start: 3,
            end: 5,
        };
        viewport.restore(saved);
        assert_eq!(viewport.snapshot(), saved);

        let mut shorter = make_viewport(&[1, 1, 1], 100);
        shorter.restore(saved);
        assert_eq!(
            shorter.snapshot(),
            ViewSnapshot {
                cursor: 2,
                start: 2,
                end: 2
            }
        );
    }

    #[test]
    fn restore_refits_a_window_that_no_longer_fits() {
        let saved = ViewSnapshot {
            cursor: 9,
            start: 0,
            end: 9,
        };
        let mut viewport = make_viewport(&[2; 10], 6);
        viewport.restore(saved);
        assert_invariants(&viewport);
        assert_eq!(
            viewport.snapshot(),
            ViewSnapshot {
                cursor: 9,
                start: 8,
                end: 9
            }
        );

        let mut taller = make_viewport(&[4; 10], 30);
        taller.restore(ViewSnapshot {
            cursor: 2,
            start: 0,
            end: 9,
        });
        assert_invariants(&taller);
        assert_eq!(taller.snapshot().start, 0);
        assert_eq!(taller.snapshot().end, 5);
        assert!(taller.render().iter().any(|line| line.selected));
    }

    #[test]
    fn render_cuts_last_block_and_pads() {
        let mut viewport = make_viewport(&[2, 3, 1], 6);
        let lines: Vec<&str> = viewport.render().iter().map(|line| line.text).collect();
        assert_eq!(lines, vec!["b0l0", "b0l1", "", "b1l0", "b1l1", "b1l2"]);
        viewport.move_down();
        viewport.move_down();
        assert_eq!(viewport.snapshot().start, 1);
        let lines = viewport.render();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].text, "b1l0");
        assert!(!lines[0].selected);
        assert_eq!(lines[4].text, "b2l0");
        assert!(lines[4].selected);
        assert!(lines[5].text.is_empty());
    }

    #[test]
    fn resize_keeps_cursor_visible() {
        let mut viewport = make_viewport(&[2, 2, 2, 2], 12);
        viewport.move_down();
        viewport.move_down();
        viewport.move_down();
        viewport.resize(3);
        assert_invariants(&viewport);
        assert_eq!(viewport.snapshot().end, 3);
        viewport.resize(20);
        assert_invariants(&viewport);
    }

    #[test]
    fn invariants_hold_for_all_short_move_sequences() {
        let layouts: [(&[usize], usize); 5] = [
            (&[1, 2, 3, 4, 5, 6], 8),
            (&[5, 1, 1, 9, 1, 2, 2], 6),
            (&[10, 10, 10], 4),
            (&[1; 12], 5),
            (&[3, 1, 4, 1, 5, 9, 2, 6], 11),
        ];
        for (heights, budget) in layouts {
            for pattern in 0u32..(1 << 12) {
                let mut viewport = make_viewport(heights, budget);
                assert_invariants(&viewport);
                for step in 0..12 {
                    if pattern & (1 << step) == 0 {
                        viewport.move_up();
                    } else {
                        viewport.move_down();
                    }
                    assert_invariants(&viewport);
                }
            }
        }
    }
}
