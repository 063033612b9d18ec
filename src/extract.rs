use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::document::DetailView;
use crate::error::NavError;
use crate::report::{DetailField, PROVIDER_TYPE};

static CITY_STATE_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^,]+),\s*([A-Z]{2})\s+([0-9]{5})").unwrap());

/// One provider as read from its detail popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRecord {
    pub ccn: String,
    pub provider_name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub provider_type: String,
    pub participation_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityStateZip {
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// Split `"City, ST 12345"` out of an address line. Anything that doesn't
/// end in that shape yields `None`.
pub fn parse_city_state_zip(line: &str) -> Option<CityStateZip> {
    let caps = CITY_STATE_ZIP_RE.captures(line)?;
    Some(CityStateZip {
        city: caps[1].trim().to_string(),
        state: caps[2].to_string(),
        zip_code: caps[3].to_string(),
    })
}

impl ProviderRecord {
    pub fn from_fields(
        ccn: &str,
        provider_name: &str,
        address: &str,
        address_line2: &str,
        participation_date: &str,
    ) -> Self {
        let parsed = parse_city_state_zip(address_line2);
        let (city, state, zip_code) = match parsed {
            Some(p) => (Some(p.city), Some(p.state), Some(p.zip_code)),
            None => (None, None, None),
        };

        ProviderRecord {
            ccn: ccn.trim().to_string(),
            provider_name: provider_name.trim().to_string(),
            address: address.trim().to_string(),
            city,
            state,
            zip_code,
            provider_type: PROVIDER_TYPE.to_string(),
            participation_date: participation_date.trim().to_string(),
        }
    }
}

/// Read a record out of an open detail view.
pub async fn extract<V: DetailView + ?Sized>(view: &V) -> Result<ProviderRecord, NavError> {
    let ccn = view.read_text(DetailField::Ccn).await?;
    let provider_name = view.read_text(DetailField::ProviderName).await?;
    let address = view.read_text(DetailField::Address).await?;
    let address_line2 = view.read_text(DetailField::CityStateZip).await?;
    let participation_date = view.read_text(DetailField::ParticipationDate).await?;

    Ok(ProviderRecord::from_fields(
        &ccn,
        &provider_name,
        &address,
        &address_line2,
        &participation_date,
    ))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DetailFixture, FakeDetail};

    #[test]
    fn street_and_city_line() {
        let p = parse_city_state_zip("123 Main St, Springfield, IL 62704").unwrap();
        assert_eq!(p.city, "Springfield");
        assert_eq!(p.state, "IL");
        assert_eq!(p.zip_code, "62704");
    }

    #[test]
    fn city_line_only() {
        let p = parse_city_state_zip("Boston, MA 02118").unwrap();
        assert_eq!(p.city, "Boston");
        assert_eq!(p.state, "MA");
        assert_eq!(p.zip_code, "02118");
    }

    #[test]
    fn zip_plus_four_keeps_five_digits() {
        let p = parse_city_state_zip("Dallas, TX 75201-1234").unwrap();
        assert_eq!(p.zip_code, "75201");
    }

    #[test]
    fn non_conforming_lines() {
        for line in [
            "PO Box 9",
            "",
            ",",
            ", IL 62704",
            "Springfield IL 62704",
            "Springfield, Il 62704",
            "Springfield, IL 627",
            "\u{0}\u{ffff}, ,,",
        ] {
            assert!(parse_city_state_zip(line).is_none(), "{:?}", line);
        }
    }

    #[test]
    fn unmatched_address_leaves_location_unset() {
        let r = ProviderRecord::from_fields(" 017001 ", "Acme Home Care", "1 Way", "PO Box 9", "01/02/1990");
        assert_eq!(r.ccn, "017001");
        assert_eq!(r.city, None);
        assert_eq!(r.state, None);
        assert_eq!(r.zip_code, None);
        assert_eq!(r.provider_type, PROVIDER_TYPE);
        assert_eq!(r.participation_date, "01/02/1990");
    }

    #[tokio::test]
    async fn extract_reads_every_field() {
        let view = FakeDetail::new(DetailFixture::new("227001", "Harbor Health", "10 Dock St", "Boston, MA 02118"));
        let r = extract(&view).await.unwrap();
        assert_eq!(r.ccn, "227001");
        assert_eq!(r.provider_name, "Harbor Health");
        assert_eq!(r.address, "10 Dock St");
        assert_eq!(r.city.as_deref(), Some("Boston"));
        assert_eq!(r.state.as_deref(), Some("MA"));
        assert_eq!(r.zip_code.as_deref(), Some("02118"));
        assert_eq!(r.participation_date, "07/01/1986");
    }
}
