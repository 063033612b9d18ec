//! Simulated drill-down report for exercising the traversal without a browser.
//!
//! Rendering follows the accordion behaviour the offsets assume: one level-1
//! group open at a time, one level-2 row open within it, and a trailing
//! totals row. Clicking a level-2 row while another is open collapses the
//! old one only after the click lands, so the click itself is addressed
//! against the old layout.

use std::time::Duration;

use async_trait::async_trait;

use crate::document::{DetailView, Document};
use crate::error::NavError;
use crate::report::{DetailField, Locator};

#[derive(Debug, Clone)]
pub struct DetailFixture {
    pub ccn: String,
    pub provider_name: String,
    pub address: String,
    pub address_line2: String,
    pub participation_date: String,
    /// Number of open attempts that time out before one succeeds.
    pub fail_opens: u32,
}

impl DetailFixture {
    pub fn new(ccn: &str, provider_name: &str, address: &str, address_line2: &str) -> Self {
        Self {
            ccn: ccn.to_string(),
            provider_name: provider_name.to_string(),
            address: address.to_string(),
            address_line2: address_line2.to_string(),
            participation_date: "07/01/1986".to_string(),
            fail_opens: 0,
        }
    }

    pub fn failing(mut self, fail_opens: u32) -> Self {
        self.fail_opens = fail_opens;
        self
    }
}

pub struct FakeDetail {
    fixture: DetailFixture,
}

impl FakeDetail {
    pub fn new(fixture: DetailFixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl DetailView for FakeDetail {
    async fn read_text(&self, field: DetailField) -> Result<String, NavError> {
        let f = &self.fixture;
        let text = match field {
            DetailField::ProviderName => &f.provider_name,
            DetailField::Ccn => &f.ccn,
            DetailField::Address => &f.address,
            DetailField::CityStateZip => &f.address_line2,
            DetailField::ParticipationDate => &f.participation_date,
        };
        Ok(format!("  {}\n", text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Group(usize),
    Subgroup(usize, usize),
    Leaf(usize, usize, usize),
    Totals,
}

/// `groups[i][j][k]` is leaf k of level-2 row j of level-1 group i.
pub struct FakeReport {
    groups: Vec<Vec<Vec<DetailFixture>>>,
    open_group: Option<usize>,
    open_subgroup: Option<usize>,
    pub clicks: Vec<Locator>,
    pub opens: Vec<usize>,
    pub reloads: usize,
    pub settles: usize,
    pub open_details: usize,
    pub reload_times_out: bool,
    pub fail_next_settle: bool,
    /// Reloads fail with a non-transient error.
    pub reload_broken: bool,
    /// Every open fails with a non-transient error.
    pub broken: bool,
}

impl FakeReport {
    pub fn new(groups: Vec<Vec<Vec<DetailFixture>>>) -> Self {
        Self {
            groups,
            open_group: None,
            open_subgroup: None,
            clicks: Vec::new(),
            opens: Vec::new(),
            reloads: 0,
            settles: 0,
            open_details: 0,
            reload_times_out: false,
            fail_next_settle: false,
            reload_broken: false,
            broken: false,
        }
    }

    /// Shape-only fixture: `shape[i][j]` leaves under level-2 row j of group i.
    pub fn with_shape(shape: &[&[usize]]) -> Self {
        let groups = shape
            .iter()
            .enumerate()
            .map(|(i, subgroups)| {
                subgroups
                    .iter()
                    .enumerate()
                    .map(|(j, &leaves)| {
                        (0..leaves)
                            .map(|k| {
                                let ccn = format!("{:02}{:02}{:02}", i + 1, j + 1, k + 1);
                                let name = format!("Provider {}", ccn);
                                DetailFixture::new(&ccn, &name, "1 Main St", "Springfield, IL 62704")
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();
        Self::new(groups)
    }

    pub fn reset_log(&mut self) {
        self.clicks.clear();
        self.opens.clear();
        self.reloads = 0;
        self.settles = 0;
    }

    /// Absolute rows (1-based) of every row-link click, in order.
    pub fn row_link_clicks(&self) -> Vec<usize> {
        self.clicks
            .iter()
            .filter_map(|l| match l {
                Locator::RowLink(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub fn group_clicks(&self) -> Vec<usize> {
        self.clicks
            .iter()
            .filter_map(|l| match l {
                Locator::GroupToggle(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for (i, subgroups) in self.groups.iter().enumerate() {
            rows.push(Row::Group(i));
            if self.open_group != Some(i) {
                continue;
            }
            for (j, leaves) in subgroups.iter().enumerate() {
                rows.push(Row::Subgroup(i, j));
                if self.open_subgroup == Some(j) {
                    rows.extend((0..leaves.len()).map(|k| Row::Leaf(i, j, k)));
                }
            }
        }
        rows.push(Row::Totals);
        rows
    }

    fn row_at(&self, index: usize) -> Result<Row, NavError> {
        index
            .checked_sub(1)
            .and_then(|i| self.rows().get(i).copied())
            .ok_or_else(|| NavError::NotFound(Locator::RowLink(index).xpath()))
    }
}

#[async_trait]
impl Document for FakeReport {
    type Detail = FakeDetail;

    async fn count(&mut self, locator: Locator) -> Result<usize, NavError> {
        match locator {
            Locator::Rows => Ok(self.rows().len()),
            Locator::GroupHeaders => Ok(self.groups.len()),
            Locator::GroupToggle(n) => Ok(usize::from((1..=self.groups.len()).contains(&n))),
            Locator::RowLink(index) => Ok(usize::from(self.row_at(index).is_ok())),
        }
    }

    async fn click(&mut self, locator: Locator) -> Result<(), NavError> {
        self.clicks.push(locator);
        match locator {
            Locator::GroupToggle(n) if n >= 1 && n <= self.groups.len() => {
                self.open_group = Some(n - 1);
                self.open_subgroup = None;
                Ok(())
            }
            Locator::RowLink(index) => match self.row_at(index)? {
                Row::Group(i) => {
                    self.open_group = Some(i);
                    self.open_subgroup = None;
                    Ok(())
                }
                Row::Subgroup(_, j) => {
                    self.open_subgroup = Some(j);
                    Ok(())
                }
                Row::Leaf(..) | Row::Totals => Ok(()),
            },
            other => Err(NavError::NotFound(other.xpath())),
        }
    }

    async fn wait_until_settled(&mut self, timeout: Duration) -> Result<(), NavError> {
        self.settles += 1;
        if self.fail_next_settle {
            self.fail_next_settle = false;
            return Err(NavError::timeout("page to settle", timeout));
        }
        Ok(())
    }

    async fn open_detail_view(
        &mut self,
        locator: Locator,
        timeout: Duration,
    ) -> Result<FakeDetail, NavError> {
        let Locator::RowLink(index) = locator else {
            return Err(NavError::NotFound(locator.xpath()));
        };
        self.opens.push(index);
        if self.broken {
            return Err(NavError::Script("target crashed".into()));
        }
        let Row::Leaf(i, j, k) = self.row_at(index)? else {
            return Err(NavError::NotFound(locator.xpath()));
        };
        let fixture = &mut self.groups[i][j][k];
        if fixture.fail_opens > 0 {
            fixture.fail_opens -= 1;
            return Err(NavError::timeout("detail view", timeout));
        }
        let detail = FakeDetail::new(fixture.clone());
        self.open_details += 1;
        Ok(detail)
    }

    async fn close_detail_view(&mut self, _detail: FakeDetail) -> Result<(), NavError> {
        self.open_details -= 1;
        Ok(())
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), NavError> {
        self.reloads += 1;
        if self.reload_broken {
            return Err(NavError::Script("execution context destroyed".into()));
        }
        if self.reload_times_out {
            return Err(NavError::timeout("reload", timeout));
        }
        Ok(())
    }
}
