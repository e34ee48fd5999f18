//! Name search and demangling.

use crate::error::ToolError;
use crate::hopper::handlers::{
    distinct_demangled, hex, procedure_summary, search_finished, segment_by_name, type_name,
    validate_max_results,
};
use crate::hopper::resolve::{resolve, segment_at};
use crate::hopper::session::Session;
use crate::hopper::types::{DemangledNameInfo, NameMatch, NameSearchResult};
use regex::Regex;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Bare,
    Demangled,
    Both,
}

impl NameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bare => "bare",
            Self::Demangled => "demangled",
            Self::Both => "both",
        }
    }

    fn bare(&self) -> bool {
        matches!(self, Self::Bare | Self::Both)
    }

    fn demangled(&self) -> bool {
        matches!(self, Self::Demangled | Self::Both)
    }
}

impl FromStr for NameKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bare" => Ok(Self::Bare),
            "demangled" => Ok(Self::Demangled),
            "both" => Ok(Self::Both),
            _ => Err(ToolError::InvalidParams(
                "search_type must be 'bare', 'demangled', or 'both'".to_string(),
            )),
        }
    }
}

pub fn handle_search_names(
    session: &Session,
    pattern: &str,
    segment_name: &str,
    search_type: &str,
    max_results: usize,
) -> Result<NameSearchResult, ToolError> {
    let re = Regex::new(pattern)?;
    let kind: NameKind = search_type.parse()?;
    let max_results = validate_max_results(max_results)?;

    let host = session.host();
    let doc = session.current()?;
    let seg = segment_by_name(host, doc, segment_name)?;

    let mut matches = Vec::new();
    for addr in host.named_addresses(seg) {
        if matches.len() >= max_results {
            break;
        }
        let bare = host.name_at(seg, addr).filter(|n| !n.is_empty());
        let demangled = distinct_demangled(host, seg, addr, bare.as_deref());

        let hit = (kind.bare() && bare.as_deref().is_some_and(|n| re.is_match(n)))
            || (kind.demangled() && demangled.as_deref().is_some_and(|n| re.is_match(n)));
        if !hit {
            continue;
        }

        matches.push(NameMatch {
            address: hex(addr),
            bare_name: bare,
            demangled_name: demangled,
            data_type: type_name(host, seg, addr),
            procedure: procedure_summary(host, seg, addr, true),
            comment: host.comment_at(seg, addr).filter(|c| !c.is_empty()),
        });
    }

    Ok(NameSearchResult {
        num_results: matches.len(),
        search_finished: search_finished(matches.len(), max_results),
        matches,
        max_results,
        search_type: kind.as_str().to_string(),
    })
}

pub fn handle_demangled_name(
    session: &Session,
    address_or_name: &str,
) -> Result<DemangledNameInfo, ToolError> {
    let host = session.host();
    let doc = session.current()?;
    let addr = resolve(host, doc, address_or_name)?;
    let seg = segment_at(host, doc, addr)?;

    let regular_name = host.name_at(seg, addr);
    let demangled_name = host.demangled_name_at(seg, addr);
    let has_demangled_name = demangled_name
        .as_deref()
        .is_some_and(|d| !d.is_empty() && Some(d) != regular_name.as_deref());

    Ok(DemangledNameInfo {
        address: hex(addr),
        demangled_name,
        regular_name,
        has_demangled_name,
        queried_input: address_or_name.to_string(),
    })
}
