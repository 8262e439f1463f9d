// CIPC company search results table
use crate::model::{ParserError, RawListing};
use crate::parser::ListingParser;
use scraper::{Html, Selector};
use std::sync::LazyLock;

pub const SEARCH_URL: &str = "https://efiling.cipc.co.za/FindEnterprise.aspx";

/// Registry status of a company that is still trading.
const ACTIVE_STATUS: &str = "in business";

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").expect("valid row selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid cell selector"));

/// Rows are `name | registration number | status`; only active companies are kept.
pub struct CipcParser;

impl CipcParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CipcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser for CipcParser {
    fn parse(&self, html: &str) -> Result<Vec<RawListing>, ParserError> {
        let document = Html::parse_document(html);
        let mut listings = Vec::new();

        // Header rows use <th>, so they have no <td> cells and fall out here.
        for row in document.select(&ROW) {
            let cells: Vec<String> = row
                .select(&CELL)
                .map(|td| td.text().collect::<String>().trim().to_string())
                .collect();
            let [name, reg_no, status, ..] = cells.as_slice() else {
                continue;
            };
            if name.is_empty() || !status.eq_ignore_ascii_case(ACTIVE_STATUS) {
                continue;
            }

            listings.push(RawListing {
                name: Some(name.clone()),
                address: Some(format!("Reg No: {}", reg_no)).filter(|_| !reg_no.is_empty()),
                ..RawListing::default()
            });
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_active_companies() {
        let html = r#"<table>
            <tr><th>Name</th><th>Reg No</th><th>Status</th></tr>
            <tr><td>Joe's Plumbing (Pty) Ltd</td><td>2015/123456/07</td><td>In Business</td></tr>
            <tr><td>Old Drains CC</td><td>1999/000001/23</td><td>Deregistered</td></tr>
            <tr><td>Short Row</td></tr>
            <tr><td>  </td><td>2020/1/07</td><td>In Business</td></tr>
            </table>"#;

        let listings = CipcParser::new().parse(html).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name.as_deref(), Some("Joe's Plumbing (Pty) Ltd"));
        assert_eq!(listings[0].address.as_deref(), Some("Reg No: 2015/123456/07"));
        assert_eq!(listings[0].website_url, None);
    }

    #[test]
    fn page_without_table_is_empty() {
        assert!(CipcParser::new().parse("<p>No records found</p>").unwrap().is_empty());
    }
}
