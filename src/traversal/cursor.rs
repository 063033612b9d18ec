use crate::report::ReportLayout;

/// Position of the traversal inside the report. Orders are 1-based.
///
/// Expanding a row inserts its children directly below it, so the absolute
/// position of any row is the sum of the orders above it plus the leaves
/// still rendered from the previous level-2 row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalCursor {
    pub level1_count: usize,
    pub level1_order: usize,
    pub level2_count: usize,
    pub level2_order: usize,
    pub level3_count: usize,
    pub level3_order: usize,
}

impl TraversalCursor {
    pub fn new(level1_count: usize) -> Self {
        Self {
            level1_count,
            ..Self::default()
        }
    }

    /// Enter the level-1 group at `order` after its header was expanded and
    /// the table holds `total_rows`.
    pub fn enter_group(&mut self, order: usize, total_rows: usize, layout: &ReportLayout) {
        self.level1_order = order;
        self.level2_count = level2_count(total_rows, self.level1_count, layout);
        self.level2_order = 1;
        self.level3_count = 0;
        self.level3_order = 0;
    }

    /// Record the leaves revealed by expanding the current level-2 row.
    pub fn enter_subgroup(&mut self, total_rows: usize, layout: &ReportLayout) {
        self.level3_count = level3_count(total_rows, self.level1_count, self.level2_count, layout);
        self.level3_order = 1;
    }

    pub fn level2_target(&self) -> usize {
        level2_target(self.level1_order, self.level2_order, self.level3_count)
    }

    pub fn level3_target(&self) -> usize {
        level3_target(self.level1_order, self.level2_order, self.level3_order)
    }
}

// ── Pure index arithmetic ──

/// Rows revealed under an expanded level-1 header. Saturates at zero when
/// the table is shorter than the offsets imply.
pub fn level2_count(total_rows: usize, level1_count: usize, layout: &ReportLayout) -> usize {
    total_rows
        .saturating_sub(level1_count)
        .saturating_sub(layout.level2_offset)
}

/// Leaves revealed under the expanded level-2 row of the current group.
pub fn level3_count(
    total_rows: usize,
    level1_count: usize,
    level2_count: usize,
    layout: &ReportLayout,
) -> usize {
    total_rows
        .saturating_sub(level1_count)
        .saturating_sub(layout.level3_offset)
        .saturating_sub(level2_count)
}

/// Absolute row of a level-2 row. `leaves_above` is the leaf count of the
/// previously expanded level-2 row, still rendered above this one.
pub fn level2_target(level1_order: usize, level2_order: usize, leaves_above: usize) -> usize {
    level1_order + level2_order + leaves_above
}

/// Absolute row of a leaf under the currently expanded level-2 row.
pub fn level3_target(level1_order: usize, level2_order: usize, level3_order: usize) -> usize {
    level1_order + level2_order + level3_order
}
