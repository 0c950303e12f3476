//! Strategy chart codec.
//!
//! Playing strategies are stored in the engine's range form, where each hand
//! maps runs of dealer up-cards to one action (`"2-6": "S"`). Editors work on
//! the expanded form, one action per dealer card. Both directions scan the
//! same fixed dealer order, [`DealerCard::ORDER`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dealer up-card, ordered the way charts are read left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum DealerCard {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Ace,
}

impl DealerCard {
    pub const ORDER: [DealerCard; 10] = [
        DealerCard::Two,
        DealerCard::Three,
        DealerCard::Four,
        DealerCard::Five,
        DealerCard::Six,
        DealerCard::Seven,
        DealerCard::Eight,
        DealerCard::Nine,
        DealerCard::Ten,
        DealerCard::Ace,
    ];

    /// Symbol used by the expanded chart (`2`..`9`, `T`, `A`).
    pub fn display_symbol(self) -> &'static str {
        match self {
            DealerCard::Two => "2",
            DealerCard::Three => "3",
            DealerCard::Four => "4",
            DealerCard::Five => "5",
            DealerCard::Six => "6",
            DealerCard::Seven => "7",
            DealerCard::Eight => "8",
            DealerCard::Nine => "9",
            DealerCard::Ten => "T",
            DealerCard::Ace => "A",
        }
    }

    /// Symbol used by the engine's range tokens (`2`..`10`, `11`).
    pub fn engine_symbol(self) -> &'static str {
        match self {
            DealerCard::Ten => "10",
            DealerCard::Ace => "11",
            other => other.display_symbol(),
        }
    }

    pub fn from_display(sym: &str) -> Option<Self> {
        Self::ORDER
            .into_iter()
            .find(|c| c.display_symbol() == sym)
    }

    pub fn from_engine(sym: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|c| c.engine_symbol() == sym)
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DealerCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_symbol())
    }
}

impl TryFrom<String> for DealerCard {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        DealerCard::from_display(raw.trim())
            .ok_or_else(|| format!("unknown dealer card {raw:?} (expected 2-9, T or A)"))
    }
}

impl From<DealerCard> for &'static str {
    fn from(card: DealerCard) -> Self {
        card.display_symbol()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    HardTotals,
    SoftTotals,
    Pairs,
}

/// Action per dealer range token, for one hand.
pub type RangeRow = BTreeMap<String, String>;

/// Engine-native chart. Unknown top-level categories are dropped on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeChart {
    #[serde(default)]
    pub hard_totals: BTreeMap<String, RangeRow>,
    #[serde(default)]
    pub soft_totals: BTreeMap<String, RangeRow>,
    #[serde(default)]
    pub pairs: BTreeMap<String, RangeRow>,
}

impl RangeChart {
    pub fn category(&self, cat: Category) -> &BTreeMap<String, RangeRow> {
        match cat {
            Category::HardTotals => &self.hard_totals,
            Category::SoftTotals => &self.soft_totals,
            Category::Pairs => &self.pairs,
        }
    }

    fn category_mut(&mut self, cat: Category) -> &mut BTreeMap<String, RangeRow> {
        match cat {
            Category::HardTotals => &mut self.hard_totals,
            Category::SoftTotals => &mut self.soft_totals,
            Category::Pairs => &mut self.pairs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hard_totals.is_empty() && self.soft_totals.is_empty() && self.pairs.is_empty()
    }
}

/// Editor chart: display hand key (`16`, `A7`, `TT`) to one action per dealer card.
pub type ExpandedChart = BTreeMap<String, BTreeMap<DealerCard, String>>;

pub fn expand(chart: &RangeChart) -> Result<ExpandedChart> {
    let mut out = ExpandedChart::new();
    for cat in [Category::HardTotals, Category::SoftTotals, Category::Pairs] {
        for (hand, row) in chart.category(cat) {
            let key = display_hand_key(cat, hand)?;
            let cells = out.entry(key).or_default();
            for (token, action) in row {
                for card in resolve_token(token)? {
                    cells.insert(card, action.clone());
                }
            }
        }
    }
    Ok(out)
}

pub fn compact(chart: &ExpandedChart) -> RangeChart {
    let mut out = RangeChart::default();
    for (hand, cells) in chart {
        if cells.is_empty() {
            continue;
        }
        let (cat, local) = classify_hand_key(hand);
        out.category_mut(cat).insert(local, encode_row(cells));
    }
    out
}

/// Re-tokenise a range chart into maximal runs.
pub fn canonicalize(chart: &RangeChart) -> Result<RangeChart> {
    Ok(compact(&expand(chart)?))
}

/// Resolve a range token (`"7"`, `"2-6"`, `"10-11"`) to the dealer cards it covers.
pub fn resolve_token(token: &str) -> Result<Vec<DealerCard>> {
    let trimmed = token.trim();
    let (start, end) = match trimmed.split_once('-') {
        Some((a, b)) => (endpoint(token, a)?, endpoint(token, b)?),
        None => {
            let card = endpoint(token, trimmed)?;
            (card, card)
        }
    };
    if start > end {
        return Err(Error::malformed(
            token,
            format!("range runs backwards ({start} after {end})"),
        ));
    }
    Ok(DealerCard::ORDER[start.position()..=end.position()].to_vec())
}

fn endpoint(token: &str, sym: &str) -> Result<DealerCard> {
    DealerCard::from_engine(sym.trim())
        .ok_or_else(|| Error::malformed(token, format!("unknown dealer symbol {:?}", sym.trim())))
}

fn display_hand_key(cat: Category, hand: &str) -> Result<String> {
    let hand = hand.trim();
    Ok(match cat {
        Category::HardTotals => hand.to_string(),
        Category::SoftTotals => format!("A{hand}"),
        Category::Pairs => {
            let rank = pair_rank(hand).ok_or_else(|| {
                Error::malformed(hand, "pair key is not a card rank (2-9, T/10, A/11)")
            })?;
            format!("{rank}{rank}")
        }
    })
}

fn pair_rank(hand: &str) -> Option<&'static str> {
    DealerCard::from_display(hand)
        .or_else(|| DealerCard::from_engine(hand))
        .map(DealerCard::display_symbol)
}

/// Category and category-local key for a display hand key.
///
/// `"11"` stays a hard total: only keys made of a rank symbol twice are pairs.
pub fn classify_hand_key(hand: &str) -> (Category, String) {
    if hand.len() > 1 && hand != "AA" {
        if let Some(rest) = hand.strip_prefix('A') {
            return (Category::SoftTotals, rest.to_string());
        }
    }
    let mut chars = hand.chars();
    if let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) {
        let rank = a.to_string();
        if a == b && DealerCard::from_display(&rank).is_some() {
            return (Category::Pairs, rank);
        }
    }
    (Category::HardTotals, hand.to_string())
}

fn encode_row(cells: &BTreeMap<DealerCard, String>) -> RangeRow {
    let mut row = RangeRow::new();
    let mut run: Option<(DealerCard, DealerCard, &str)> = None;

    for card in DealerCard::ORDER {
        let action = cells.get(&card).map(String::as_str);
        match (run, action) {
            (Some((start, _, cur)), Some(next)) if cur == next => {
                run = Some((start, card, cur));
            }
            _ => {
                if let Some((start, end, cur)) = run.take() {
                    row.insert(range_token(start, end), cur.to_string());
                }
                run = action.map(|a| (card, card, a));
            }
        }
    }
    if let Some((start, end, cur)) = run {
        row.insert(range_token(start, end), cur.to_string());
    }
    row
}

fn range_token(start: DealerCard, end: DealerCard) -> String {
    if start == end {
        start.engine_symbol().to_string()
    } else {
        format!("{}-{}", start.engine_symbol(), end.engine_symbol())
    }
}
