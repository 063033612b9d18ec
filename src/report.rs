//! Layout of the QCOR "active provider count" drill-down report.
//!
//! Everything here is specific to one rendering of one report. The offsets
//! were measured against that report and are not derivable from structure.

pub const QCOR_URL: &str = "https://qcor.cms.gov/main.jsp";

/// Classification stored with every record this report yields.
pub const PROVIDER_TYPE: &str = "Home Health Agency";

// ── Report table ──

const ROWS_XPATH: &str = "//html/body/div[2]/table[2]/tbody/tr";
const GROUP_HEADERS_XPATH: &str = r#"//html/body/div[2]/table[2]/tbody/tr[@class="tblAlt"]"#;

// ── Detail popup ──

const DETAIL_CELL_XPATH: &str = "//html/body/div[3]/table/tbody/tr[{}]/td";
const DETAIL_SECOND_CELL_XPATH: &str = "//html/body/div[3]/table/tbody/tr[{}]/td[2]";

// ── Setup controls ──

pub const SECTION_LINK_XPATH: &str =
    "//html/body/table/tbody/tr[4]/td[1]/table/tbody/tr[1]/td/table[3]/tbody/tr[6]/td/a";
pub const ACTIVE_COUNT_LINK_XPATH: &str =
    "//html/body/table/tbody/tr[4]/td[1]/table/tbody/tr[1]/td/table/tbody/tr[4]/td/a";
pub const YEAR_TYPE_SELECT_XPATH: &str = r#"//select[@id="year_type"]"#;
pub const BEGIN_YEAR_SELECT_XPATH: &str = r#"//select[@id="begin_year"]"#;
pub const END_YEAR_SELECT_XPATH: &str = r#"//select[@id="end_year"]"#;
pub const SUBMIT_XPATH: &str = "//html/body/div[2]/form[1]/table[2]/tbody/tr[2]/td/input";
pub const CALENDAR_YEAR: &str = "CY";

/// Something on the report page the traversal can count or click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Every rendered row of the report table.
    Rows,
    /// Level-1 group header rows only.
    GroupHeaders,
    /// Expand control of the n-th (1-based) level-1 header.
    GroupToggle(usize),
    /// Link inside the row at an absolute 1-based position.
    RowLink(usize),
}

impl Locator {
    pub fn xpath(&self) -> String {
        match self {
            Locator::Rows => ROWS_XPATH.to_string(),
            Locator::GroupHeaders => GROUP_HEADERS_XPATH.to_string(),
            Locator::GroupToggle(n) => format!("({})[{}]/th/a", GROUP_HEADERS_XPATH, n),
            Locator::RowLink(index) => format!("{}[{}]//a", ROWS_XPATH, index),
        }
    }
}

/// Fixed-position fields of a provider detail popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailField {
    ProviderName,
    Ccn,
    Address,
    CityStateZip,
    ParticipationDate,
}

impl DetailField {
    pub fn xpath(&self) -> String {
        let (template, row) = match self {
            DetailField::ProviderName => (DETAIL_CELL_XPATH, 1),
            DetailField::Ccn => (DETAIL_CELL_XPATH, 2),
            DetailField::Address => (DETAIL_CELL_XPATH, 4),
            DetailField::CityStateZip => (DETAIL_SECOND_CELL_XPATH, 5),
            DetailField::ParticipationDate => (DETAIL_CELL_XPATH, 7),
        };
        template.replace("{}", &row.to_string())
    }
}

/// Row-count offsets observed on the rendered report.
///
/// After expanding a level-1 header the table holds every level-1 header,
/// the revealed level-2 rows and `level2_offset` extra rows. Expanding a
/// level-2 row adds its leaves on top of that plus `level3_offset` - the
/// same extra rows counted again in the level-3 formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub level2_offset: usize,
    pub level3_offset: usize,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            level2_offset: 1,
            level3_offset: 1,
        }
    }
}
